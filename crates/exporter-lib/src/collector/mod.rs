//! Metric collectors for array resources
//!
//! Each collector owns the descriptors for one resource family and turns the
//! array's JSON into gauge samples. Inventory collectors read a listing
//! endpoint directly; performance collectors fan out one report request per
//! id held in the target's [`IdentityCache`](crate::cache::IdentityCache).

mod appliance;
mod cluster;
mod descriptor;
mod fanout;
mod file_system;
mod hardware;
mod nas;
mod performance;
mod port;
mod status;
mod volume;
mod volume_group;

#[cfg(test)]
pub(crate) mod testing;

pub use appliance::ApplianceCollector;
pub use cluster::ClusterCollector;
pub use descriptor::{
    field_descriptors, help_for, HelpTable, MetricDescriptor, MetricSample, TARGET_LABEL,
};
pub use fanout::{fan_out, FanOutSummary, TaskOutcome};
pub use file_system::FileSystemCollector;
pub use hardware::HardwareCollector;
pub use nas::NasCollector;
pub use performance::{families, LabelSource, MetricNaming, PerformanceCollector, PerformanceFamily};
pub use port::PortCollector;
pub use status::{field, field_f64, field_label, float_data, parse_speed, status_table, StatusTable};
pub use volume::VolumeCollector;
pub use volume_group::VolumeGroupCollector;

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use async_trait::async_trait;

/// Trait implemented by every resource family
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable name used in logs and internal metrics
    fn name(&self) -> &'static str;

    /// Every metric this collector can emit
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>>;

    /// Run one collection pass, sending samples through `emitter`.
    ///
    /// Per-resource failures are logged and skipped. An error return means the
    /// whole family could not be read this pass.
    async fn collect(&self, emitter: &Emitter) -> Result<()>;
}

/// Sending half of a scrape's sample channel
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<MetricSample>,
}

impl Emitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MetricSample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send a sample; returns false once the scrape has stopped listening
    pub fn emit(&self, sample: MetricSample) -> bool {
        self.tx.send(sample).is_ok()
    }
}

/// Emit one sample per `(field, descriptor)` whose field is present in `object`.
///
/// Status fields are mapped through their table, everything else is read as a
/// number. Returns the number of samples sent.
pub(crate) fn emit_fields(
    emitter: &Emitter,
    descriptors: &[(&'static str, Arc<MetricDescriptor>)],
    object: &Value,
    label_values: &[String],
) -> usize {
    let mut emitted = 0;
    for (field_name, descriptor) in descriptors {
        let Some(value) = field(object, field_name).and_then(|v| float_data(field_name, v)) else {
            continue;
        };
        if emitter.emit(descriptor.sample(value, label_values.to_vec())) {
            emitted += 1;
        }
    }
    emitted
}
