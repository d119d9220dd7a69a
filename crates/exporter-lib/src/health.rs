//! Health tracking for the exporter and its arrays
//!
//! Every registered array is a component named `target:<ip>`. Its state is
//! derived from the startup login and identity cache build. Readiness turns
//! true once startup finished and at least one array is usable.

use crate::cache::BuildReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Reachable, but some metrics will be missing
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Health of an array after its startup sequence
    pub fn from_startup(logged_in: bool, cache: &BuildReport) -> Self {
        let failed: Vec<&str> = cache.failed.iter().map(|k| k.as_str()).collect();
        let all_failed = cache.loaded.is_empty() && !failed.is_empty();

        match (logged_in, failed.is_empty()) {
            (true, true) => Self::healthy(),
            (false, _) if all_failed => Self::unhealthy("login failed and no resource could be listed"),
            (false, _) => Self::degraded("startup login failed"),
            (true, false) => Self::degraded(format!("identity cache incomplete: {}", failed.join(","))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &BTreeMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const EXPORTER: &str = "exporter";
    pub const TARGET_PREFIX: &str = "target:";

    pub fn target(ip: &str) -> String {
        format!("{}{}", TARGET_PREFIX, ip)
    }
}

/// Shared component health map
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(BTreeMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record an array's startup outcome under `target:<ip>`
    pub async fn record_target(&self, ip: &str, logged_in: bool, cache: &BuildReport) {
        self.update(&components::target(ip), ComponentHealth::from_startup(logged_in, cache))
            .await;
    }

    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup finished, unless every array is unusable
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let map = self.components.read().await;

        let targets: Vec<&ComponentHealth> = map
            .iter()
            .filter(|(name, _)| name.starts_with(components::TARGET_PREFIX))
            .map(|(_, health)| health)
            .collect();
        let any_usable = targets.iter().any(|h| h.status.is_operational());

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Exporter not yet initialized".to_string()),
            }
        } else if !targets.is_empty() && !any_usable {
            ReadinessResponse {
                ready: false,
                reason: Some("No array is reachable".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
