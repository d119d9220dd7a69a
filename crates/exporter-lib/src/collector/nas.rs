use super::status::{field, field_label, OPERATIONAL_STATUS};
use super::{Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// NAS server operational status
pub struct NasCollector {
    client: Arc<ArrayClient>,
    status: Arc<MetricDescriptor>,
}

impl NasCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let status = MetricDescriptor::new(
            "powerstore_nas_server_operational_status",
            "NAS server operational status,Started is 1 other is 0",
            &["name"],
            client.ip(),
        );
        Self { client, status }
    }
}

#[async_trait]
impl Collector for NasCollector {
    fn name(&self) -> &'static str {
        "nas"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.status)]
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let servers = self.client.nas_servers().await?;

        for server in &servers {
            if let Some(status) = field(server, OPERATIONAL_STATUS.field) {
                let value = OPERATIONAL_STATUS.map_value(status);
                emitter.emit(self.status.sample(value, vec![field_label(server, "name")]));
            }
        }

        info!(
            ip = %self.client.ip(),
            servers = servers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "NAS collection finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{client_for, collect_samples, mock_list};
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn test_operational_status() {
        let mut server = Server::new_async().await;
        mock_list(
            &mut server,
            "nas_server",
            json!([
                {"name": "nas-1", "operational_status": "Started"},
                {"name": "nas-2", "operational_status": "Stopped"},
                {"name": "nas-3"}
            ]),
        )
        .await;

        let (result, samples) = collect_samples(&NasCollector::new(client_for(&server))).await;

        assert!(result.is_ok());
        let values: Vec<_> = samples.iter().map(|s| (s.label("name").unwrap(), s.value())).collect();
        assert_eq!(values, vec![("nas-1", 1.0), ("nas-2", 0.0)]);
    }
}
