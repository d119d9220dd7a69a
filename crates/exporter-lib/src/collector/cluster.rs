use super::status::{field, field_label, CLUSTER_STATE};
use super::{Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const LABELS: [&str; 4] = ["master_appliance_id", "global_id", "management_address", "name"];

/// Cluster state, one series per cluster object
pub struct ClusterCollector {
    client: Arc<ArrayClient>,
    state: Arc<MetricDescriptor>,
}

impl ClusterCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let state = MetricDescriptor::new(
            "powerstore_cluster",
            "cluster state ,1 is Configured,0 other",
            &LABELS,
            client.ip(),
        );
        Self { client, state }
    }
}

#[async_trait]
impl Collector for ClusterCollector {
    fn name(&self) -> &'static str {
        "cluster"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.state)]
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let clusters = self.client.cluster().await?;

        for cluster in &clusters {
            let Some(state) = field(cluster, "state") else {
                continue;
            };
            let labels = LABELS.iter().map(|l| field_label(cluster, l)).collect();
            emitter.emit(self.state.sample(CLUSTER_STATE.map_value(state), labels));
        }

        info!(
            ip = %self.client.ip(),
            clusters = clusters.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cluster collection finished"
        );
        Ok(())
    }
}
