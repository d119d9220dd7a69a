use super::descriptor::{field_descriptors, HelpTable};
use super::status::field_label;
use super::{emit_fields, Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const FIELDS: &[&str] = &["state", "size", "logical_used"];

const HELP: HelpTable = &[
    ("state", "1 is ready ,0 is other"),
    ("size", "the unit is B"),
    ("logical_used", "the unit is B"),
];

/// Volume state and space usage
pub struct VolumeCollector {
    client: Arc<ArrayClient>,
    metrics: Vec<(&'static str, Arc<MetricDescriptor>)>,
}

impl VolumeCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let metrics = field_descriptors(
            "powerstore_volume_",
            FIELDS,
            HELP,
            &["name", "appliance_id"],
            client.ip(),
        );
        Self { client, metrics }
    }
}

#[async_trait]
impl Collector for VolumeCollector {
    fn name(&self) -> &'static str {
        "volume"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.metrics.iter().map(|(_, d)| Arc::clone(d)).collect()
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let volumes = self.client.volumes().await?;
        let mut samples = 0;

        for volume in &volumes {
            let labels = [field_label(volume, "name"), field_label(volume, "appliance_id")];
            samples += emit_fields(emitter, &self.metrics, volume, &labels);
        }

        info!(
            ip = %self.client.ip(),
            volumes = volumes.len(),
            samples = samples,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Volume collection finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{client_for, collect_samples, mock_list, named};
    use mockito::Server;
    use serde_json::json;

    #[tokio::test]
    async fn test_volume_fields() {
        let mut server = Server::new_async().await;
        mock_list(
            &mut server,
            "volume_list_cma_view",
            json!([
                {"name": "vol-1", "appliance_id": "A1", "state": "Ready", "size": 1073741824, "logical_used": 4096},
                {"name": "vol-2", "appliance_id": "A1", "state": "Initializing", "logical_used": null}
            ]),
        )
        .await;

        let (result, samples) = collect_samples(&VolumeCollector::new(client_for(&server))).await;
        assert!(result.is_ok());

        let state = named(&samples, "powerstore_volume_state");
        assert_eq!(state.iter().map(|s| s.value()).collect::<Vec<_>>(), vec![1.0, 0.0]);
        assert_eq!(named(&samples, "powerstore_volume_size").len(), 1);
        assert_eq!(named(&samples, "powerstore_volume_logical_used").len(), 1);
        assert_eq!(state[1].label("name"), Some("vol-2"));
    }
}
