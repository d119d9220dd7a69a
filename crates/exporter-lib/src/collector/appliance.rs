use super::status::{field, field_label};
use super::{Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Appliance service tags as an info-style series (value is always 0)
pub struct ApplianceCollector {
    client: Arc<ArrayClient>,
    service_tag: Arc<MetricDescriptor>,
}

impl ApplianceCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let service_tag = MetricDescriptor::new(
            "powerstore_appliance",
            "service tag information",
            &["service_tag", "appliance_id"],
            client.ip(),
        );
        Self { client, service_tag }
    }
}

#[async_trait]
impl Collector for ApplianceCollector {
    fn name(&self) -> &'static str {
        "appliance"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.service_tag)]
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let appliances = self.client.appliances().await?;

        for appliance in &appliances {
            if field(appliance, "service_tag").is_none() {
                continue;
            }
            let labels = vec![
                field_label(appliance, "service_tag"),
                field_label(appliance, "id"),
            ];
            emitter.emit(self.service_tag.sample(0.0, labels));
        }

        info!(
            ip = %self.client.ip(),
            appliances = appliances.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Appliance collection finished"
        );
        Ok(())
    }
}
