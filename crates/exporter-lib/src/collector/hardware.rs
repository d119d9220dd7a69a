use super::status::{field, field_f64, field_label, LIFECYCLE_STATE};
use super::{Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::{ClientError, Result};
use crate::models::HardwareType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const STATE_HELP: &str = "drives status,Healthy is 1";

/// Node, drive, fan, power supply and battery health, plus drive sizes
pub struct HardwareCollector {
    client: Arc<ArrayClient>,
    node_state: Arc<MetricDescriptor>,
    component_state: Vec<(HardwareType, Arc<MetricDescriptor>)>,
    drive_size: Arc<MetricDescriptor>,
}

impl HardwareCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let ip = client.ip().to_string();
        let node_state = MetricDescriptor::new(
            "powerstore_hardware_node_state",
            STATE_HELP,
            &["name", "serial_number", "state", "appliance_id"],
            &ip,
        );
        let component_state = HardwareType::COMPONENTS
            .into_iter()
            .map(|kind| {
                let desc = MetricDescriptor::new(
                    format!("powerstore_hardware_{}_state", kind),
                    STATE_HELP,
                    &["name", "appliance_id"],
                    &ip,
                );
                (kind, desc)
            })
            .collect();
        let drive_size = MetricDescriptor::new(
            "powerstore_hardware_drive_size",
            "disk size,unit is B",
            &["name", "appliance_id", "drive_type"],
            &ip,
        );

        Self {
            client,
            node_state,
            component_state,
            drive_size,
        }
    }

    fn emit_nodes(&self, emitter: &Emitter, nodes: &[Value]) {
        for node in nodes {
            let labels = vec![
                field_label(node, "name"),
                field_label(node, "serial_number"),
                field_label(node, LIFECYCLE_STATE.field),
                field_label(node, "appliance_id"),
            ];
            emitter.emit(self.node_state.sample(0.0, labels));
        }
    }

    fn emit_components(
        &self,
        emitter: &Emitter,
        kind: HardwareType,
        state: &Arc<MetricDescriptor>,
        items: &[Value],
    ) {
        for item in items {
            let name = field_label(item, "name");
            let appliance_id = field_label(item, "appliance_id");

            if let Some(lifecycle) = field(item, LIFECYCLE_STATE.field) {
                let value = LIFECYCLE_STATE.map_value(lifecycle);
                emitter.emit(state.sample(value, vec![name.clone(), appliance_id.clone()]));
            }

            let entry_type = item.get("type").and_then(Value::as_str).unwrap_or(kind.as_str());
            if entry_type != HardwareType::Drive.as_str() {
                continue;
            }
            let Some(details) = field(item, "extra_details") else {
                continue;
            };
            if let Some(size) = field_f64(details, "size") {
                let drive_type = field_label(details, "drive_type");
                emitter.emit(self.drive_size.sample(size, vec![name, appliance_id, drive_type]));
            }
        }
    }
}

#[async_trait]
impl Collector for HardwareCollector {
    fn name(&self) -> &'static str {
        "hardware"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        let mut all = vec![Arc::clone(&self.node_state)];
        all.extend(self.component_state.iter().map(|(_, d)| Arc::clone(d)));
        all.push(Arc::clone(&self.drive_size));
        all
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let mut errors: Vec<ClientError> = Vec::new();

        match self.client.hardware(HardwareType::Node).await {
            Ok(nodes) => self.emit_nodes(emitter, &nodes),
            Err(e) => {
                warn!(ip = %self.client.ip(), hardware_type = "Node", error = %e, "Hardware listing failed");
                errors.push(e);
            }
        }

        for (kind, state) in &self.component_state {
            match self.client.hardware(*kind).await {
                Ok(items) => self.emit_components(emitter, *kind, state, &items),
                Err(e) => {
                    warn!(ip = %self.client.ip(), hardware_type = %kind, error = %e, "Hardware listing failed");
                    errors.push(e);
                }
            }
        }

        info!(
            ip = %self.client.ip(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Hardware collection finished"
        );

        // Only report failure when no hardware type could be listed at all
        if errors.len() == self.component_state.len() + 1 {
            return Err(errors.remove(0));
        }
        Ok(())
    }
}
