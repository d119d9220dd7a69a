use super::descriptor::{field_descriptors, HelpTable};
use super::status::field_label;
use super::{emit_fields, Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const FIELDS: &[&str] = &["size_total", "size_used"];

const HELP: HelpTable = &[
    ("size_total", "filesystem total size"),
    ("size_used", "filesystem used size"),
];

/// File system capacity
pub struct FileSystemCollector {
    client: Arc<ArrayClient>,
    metrics: Vec<(&'static str, Arc<MetricDescriptor>)>,
}

impl FileSystemCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let metrics = field_descriptors(
            "powerstore_filesystem_",
            FIELDS,
            HELP,
            &["name", "appliance_id"],
            client.ip(),
        );
        Self { client, metrics }
    }
}

#[async_trait]
impl Collector for FileSystemCollector {
    fn name(&self) -> &'static str {
        "file_system"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.metrics.iter().map(|(_, d)| Arc::clone(d)).collect()
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let file_systems = self.client.file_systems().await?;
        let mut samples = 0;

        for fs in &file_systems {
            let labels = [field_label(fs, "name"), field_label(fs, "appliance_id")];
            samples += emit_fields(emitter, &self.metrics, fs, &labels);
        }

        info!(
            ip = %self.client.ip(),
            file_systems = file_systems.len(),
            samples = samples,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "File system collection finished"
        );
        Ok(())
    }
}
