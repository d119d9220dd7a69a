use super::descriptor::{field_descriptors, HelpTable};
use super::status::field_label;
use super::{emit_fields, Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const FIELDS: &[&str] = &["logical_provisioned", "logical_used"];

const HELP: HelpTable = &[
    ("logical_provisioned", "logical provisioned,unit is B"),
    ("logical_used", "logical used,unit is B"),
];

/// Volume group space, one series per owning appliance
pub struct VolumeGroupCollector {
    client: Arc<ArrayClient>,
    metrics: Vec<(&'static str, Arc<MetricDescriptor>)>,
}

impl VolumeGroupCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let metrics = field_descriptors(
            "powerstore_volumegroup_",
            FIELDS,
            HELP,
            &["name", "appliance_id"],
            client.ip(),
        );
        Self { client, metrics }
    }
}

#[async_trait]
impl Collector for VolumeGroupCollector {
    fn name(&self) -> &'static str {
        "volume_group"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.metrics.iter().map(|(_, d)| Arc::clone(d)).collect()
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let groups = self.client.volume_groups().await?;
        let mut samples = 0;

        for group in &groups {
            let name = field_label(group, "name");
            let appliance_ids = group
                .get("appliance_ids")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for appliance_id in appliance_ids.iter().filter_map(Value::as_str) {
                let labels = [name.clone(), appliance_id.to_string()];
                samples += emit_fields(emitter, &self.metrics, group, &labels);
            }
        }

        info!(
            ip = %self.client.ip(),
            volume_groups = groups.len(),
            samples = samples,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Volume group collection finished"
        );
        Ok(())
    }
}
