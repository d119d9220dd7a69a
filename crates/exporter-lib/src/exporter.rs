//! Target registration and scrape dispatch
//!
//! At startup every configured array gets a client, an eager login and an
//! identity cache. Nothing here is fatal: an array that cannot be reached
//! still gets a registry and simply produces fewer samples.

use crate::cache::{BuildReport, IdentityCache};
use crate::client::{ArrayClient, RequestBudget};
use crate::error::{ConfigError, ScrapeError};
use crate::health::HealthRegistry;
use crate::models::Target;
use crate::observability::StructuredLogger;
use crate::registry::TargetRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, warn};

/// What happened while registering one array
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub ip: String,
    pub logged_in: bool,
    pub cache: BuildReport,
}

/// Log in to one array and build its identity cache
pub async fn start_target(client: ArrayClient) -> (TargetRegistry, StartupReport) {
    let logged_in = match client.login().await {
        Ok(_) => true,
        Err(e) => {
            warn!(ip = %client.ip(), error = %e, "Startup login failed, will retry on first request");
            false
        }
    };

    let (cache, report) = IdentityCache::build(&client).await;
    let startup = StartupReport {
        ip: client.ip().to_string(),
        logged_in,
        cache: report,
    };

    let registry = TargetRegistry::standard(Arc::new(client), Arc::new(cache));
    (registry, startup)
}

/// Reject targets that are incomplete or listed twice
pub fn validate_targets(targets: Vec<Target>) -> (Vec<Target>, Vec<(Target, ConfigError)>) {
    let mut accepted: Vec<Target> = Vec::new();
    let mut rejected = Vec::new();

    for target in targets {
        if let Err(e) = target.validate() {
            rejected.push((target, e));
        } else if accepted.iter().any(|t| t.ip == target.ip) {
            let e = ConfigError::DuplicateTarget {
                ip: target.ip.clone(),
            };
            rejected.push((target, e));
        } else {
            accepted.push(target);
        }
    }

    (accepted, rejected)
}

/// All registered arrays, keyed by address
#[derive(Default)]
pub struct Exporter {
    targets: HashMap<String, Arc<TargetRegistry>>,
}

impl Exporter {
    /// Register every valid target; all share one request budget
    pub async fn start(
        targets: Vec<Target>,
        budget: RequestBudget,
        health: &HealthRegistry,
        logger: &StructuredLogger,
    ) -> Self {
        let (accepted, rejected) = validate_targets(targets);
        for (target, reason) in &rejected {
            logger.log_target_rejected(&target.ip, &reason.to_string());
        }

        let mut clients = Vec::with_capacity(accepted.len());
        for target in accepted {
            let ip = target.ip.clone();
            match ArrayClient::new(target, budget.clone()) {
                Ok(client) => clients.push(client),
                Err(e) => logger.log_target_rejected(&ip, &e.to_string()),
            }
        }

        let exporter = Self::start_clients(clients, health, logger).await;
        health.set_ready(true).await;
        exporter
    }

    /// Register already-built clients concurrently
    pub async fn start_clients(
        clients: Vec<ArrayClient>,
        health: &HealthRegistry,
        logger: &StructuredLogger,
    ) -> Self {
        let mut set = JoinSet::new();
        for client in clients {
            set.spawn(start_target(client));
        }

        let mut exporter = Self::default();
        while let Some(joined) = set.join_next().await {
            let (registry, report) = match joined {
                Ok(started) => started,
                Err(e) => {
                    error!(error = %e, "Target startup task failed");
                    continue;
                }
            };

            let failed: Vec<&str> = report.cache.failed.iter().map(|k| k.as_str()).collect();
            logger.log_target_registered(
                &report.ip,
                report.logged_in,
                report.cache.loaded.len(),
                &failed,
            );
            health
                .record_target(&report.ip, report.logged_in, &report.cache)
                .await;
            exporter.insert(registry);
        }
        exporter
    }

    pub fn insert(&mut self, registry: TargetRegistry) {
        self.targets.insert(registry.ip().to_string(), Arc::new(registry));
    }

    pub fn target(&self, ip: &str) -> Option<&Arc<TargetRegistry>> {
        self.targets.get(ip)
    }

    /// Registered addresses, sorted
    pub fn ips(&self) -> Vec<&str> {
        let mut ips: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        ips.sort_unstable();
        ips
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Scrape one resource group of one array
    pub async fn scrape(&self, ip: &str, group: &str) -> Result<Vec<u8>, ScrapeError> {
        let registry = self
            .target(ip)
            .ok_or_else(|| ScrapeError::UnknownTarget(ip.to_string()))?;
        registry.scrape(group).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::models::ResourceKind;
    use mockito::{Matcher, Server};

    #[test]
    fn test_invalid_and_duplicate_targets_are_rejected() {
        let targets = vec![
            Target::new("10.0.0.1", "admin", "secret", "v3"),
            Target::new("10.0.0.2", "admin", "", "v3"),
            Target::new("10.0.0.1", "other", "secret", "v3"),
            Target::new("", "admin", "secret", "v3"),
        ];

        let (accepted, rejected) = validate_targets(targets);

        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected.len(), 3);
        assert!(matches!(
            rejected[0].1,
            ConfigError::MissingField { field: "password", .. }
        ));
        assert!(matches!(rejected[1].1, ConfigError::DuplicateTarget { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_login_still_registers() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/rest/login_session")
            .with_status(401)
            .with_body("bad credentials")
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex(r"^/api/rest/[a-z_]+$".to_string()))
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = ArrayClient::with_base_url(
            Target::new("10.0.0.9", "admin", "wrong", "v3"),
            RequestBudget::new(4),
            &format!("{}/api/rest/", server.url()),
        )
        .unwrap();
        let health = HealthRegistry::new();
        let logger = StructuredLogger::new("test");

        let exporter = Exporter::start_clients(vec![client], &health, &logger).await;

        assert_eq!(exporter.ips(), vec!["10.0.0.9"]);
        let registry = exporter.target("10.0.0.9").unwrap();
        assert_eq!(registry.cache().len(ResourceKind::Appliance), 0);

        let status = health.health().await.components["target:10.0.0.9"].status;
        assert_eq!(status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_scrape_unknown_target() {
        let exporter = Exporter::default();
        let err = exporter.scrape("10.9.9.9", "cluster").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownTarget(ip) if ip == "10.9.9.9"));
        assert!(exporter.is_empty());
    }
}
