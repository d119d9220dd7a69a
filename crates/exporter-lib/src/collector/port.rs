use super::status::{field, field_label, parse_speed, LINK_UP};
use super::{Collector, Emitter, MetricDescriptor};
use crate::client::ArrayClient;
use crate::error::Result;
use crate::models::PortKind;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

struct PortDescriptors {
    kind: PortKind,
    link_up: Arc<MetricDescriptor>,
    speed: Arc<MetricDescriptor>,
}

/// Link state and negotiated speed of front-end Ethernet and FC ports
pub struct PortCollector {
    client: Arc<ArrayClient>,
    ports: Vec<PortDescriptors>,
}

impl PortCollector {
    pub fn new(client: Arc<ArrayClient>) -> Self {
        let ports = PortKind::ALL
            .into_iter()
            .map(|kind| {
                let resource = kind.resource();
                let (id_label, speed_help) = match kind {
                    PortKind::Eth => (
                        "eth_port_id",
                        "Current Ethernet front-end port transmission speed, unit is Gbps",
                    ),
                    PortKind::Fc => (
                        "fc_port_id",
                        "Current FC front-end port transmission speed, unit is Gbps",
                    ),
                };
                let labels = ["appliance_id", id_label];
                PortDescriptors {
                    kind,
                    link_up: MetricDescriptor::new(
                        format!("powerstore_{}_is_link_up", resource),
                        "Indicates whether the port's link is up:true is 1,false is 0",
                        &labels,
                        client.ip(),
                    ),
                    speed: MetricDescriptor::new(
                        format!("powerstore_{}_current_speed", resource),
                        speed_help,
                        &labels,
                        client.ip(),
                    ),
                }
            })
            .collect();

        Self { client, ports }
    }
}

#[async_trait]
impl Collector for PortCollector {
    fn name(&self) -> &'static str {
        "port"
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.ports
            .iter()
            .flat_map(|p| [Arc::clone(&p.link_up), Arc::clone(&p.speed)])
            .collect()
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let mut first_error = None;
        let mut listed = 0;

        for port in &self.ports {
            let items = match self.client.ports(port.kind).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(ip = %self.client.ip(), resource = port.kind.resource(), error = %e, "Port listing failed");
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            listed += 1;

            for item in &items {
                let labels = vec![field_label(item, "appliance_id"), field_label(item, "name")];

                if let Some(up) = field(item, "is_link_up") {
                    emitter.emit(port.link_up.sample(LINK_UP.map_value(up), labels.clone()));
                }
                match parse_speed(item.get("current_speed")) {
                    Some(speed) => {
                        emitter.emit(port.speed.sample(speed, labels));
                    }
                    None => warn!(
                        ip = %self.client.ip(),
                        port = %field_label(item, "name"),
                        speed = ?item.get("current_speed"),
                        "Unparseable port speed"
                    ),
                }
            }
        }

        info!(
            ip = %self.client.ip(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Port collection finished"
        );

        match first_error {
            Some(e) if listed == 0 => Err(e),
            _ => Ok(()),
        }
    }
}
