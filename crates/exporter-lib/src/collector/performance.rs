//! Report-driven collectors
//!
//! Performance, capacity and drive-wear series all follow the same recipe:
//! take every id of one resource kind from the identity cache, generate a
//! report for it, keep the most recent bucket and emit one gauge per field.
//! The differences between families are captured declaratively in a
//! [`PerformanceFamily`] table.

use super::descriptor::{help_for, HelpTable};
use super::fanout::{fan_out, TaskOutcome};
use super::status::{field_f64, field_label};
use super::{Collector, Emitter, MetricDescriptor};
use crate::cache::{IdentityCache, IdentityEntry};
use crate::client::{ArrayClient, ReportEntity};
use crate::error::Result;
use crate::models::ResourceKind;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Where a label value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// The resource id the report was generated for
    EntityId,
    /// The cached display name of the resource
    EntityName,
    /// A field of the selected bucket
    BucketField(&'static str),
    /// One sample per cached appliance id of the resource
    EachApplianceId,
}

/// How metric names are derived from field names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricNaming {
    /// `<prefix><field>`
    Prefix(&'static str),
    /// A single fixed name; only valid for one-field families
    Fixed(&'static str),
}

/// Declarative description of one report-driven metric family
#[derive(Debug, Clone, Copy)]
pub struct PerformanceFamily {
    pub collector: &'static str,
    pub resource: ResourceKind,
    pub entity: ReportEntity,
    pub naming: MetricNaming,
    pub fields: &'static [&'static str],
    pub help: HelpTable,
    pub labels: &'static [(&'static str, LabelSource)],
}

impl PerformanceFamily {
    fn metric_name(&self, field: &str) -> String {
        match self.naming {
            MetricNaming::Prefix(prefix) => format!("{}{}", prefix, field),
            MetricNaming::Fixed(name) => name.to_string(),
        }
    }

    fn label_names(&self) -> Vec<&'static str> {
        self.labels.iter().map(|(name, _)| *name).collect()
    }

    /// Label value sets for one resource and bucket.
    ///
    /// Usually a single set; `EachApplianceId` expands to one set per
    /// appliance, and to none when the resource lists no appliance.
    fn label_sets(&self, entry: &IdentityEntry, bucket: &Value) -> Vec<Vec<String>> {
        let mut sets = vec![Vec::with_capacity(self.labels.len())];
        for (_, source) in self.labels {
            match source {
                LabelSource::EntityId => sets.iter_mut().for_each(|s| s.push(entry.id.clone())),
                LabelSource::EntityName => sets.iter_mut().for_each(|s| s.push(entry.name.clone())),
                LabelSource::BucketField(key) => {
                    let value = field_label(bucket, key);
                    sets.iter_mut().for_each(|s| s.push(value.clone()));
                }
                LabelSource::EachApplianceId => {
                    sets = sets
                        .into_iter()
                        .flat_map(|set| {
                            entry.appliance_ids.iter().map(move |appliance| {
                                let mut expanded = set.clone();
                                expanded.push(appliance.clone());
                                expanded
                            })
                        })
                        .collect();
                }
            }
        }
        sets
    }
}

const COMMON_FIELDS: [&str; 9] = [
    "avg_read_latency",
    "avg_latency",
    "avg_write_latency",
    "avg_read_iops",
    "avg_read_bandwidth",
    "avg_total_iops",
    "avg_total_bandwidth",
    "avg_write_iops",
    "avg_write_bandwidth",
];

const APPLIANCE_FIELDS: &[&str] = &[
    COMMON_FIELDS[0],
    COMMON_FIELDS[1],
    COMMON_FIELDS[2],
    COMMON_FIELDS[3],
    COMMON_FIELDS[4],
    COMMON_FIELDS[5],
    COMMON_FIELDS[6],
    COMMON_FIELDS[7],
    COMMON_FIELDS[8],
    "avg_io_workload_cpu_utilization",
];

const APPLIANCE_HELP: HelpTable = &[
    ("avg_read_latency", "avg latency of read , unit is ms"),
    ("avg_latency", "avg latency , unit is ms"),
    ("avg_write_latency", "avg latency of write , unit is ms"),
    ("avg_read_iops", "iops of read , unit is iops"),
    ("avg_read_bandwidth", "throughput of read , unit is bps"),
    ("avg_total_iops", "iops total , unit is iops"),
    ("avg_total_bandwidth", "total throughput , unit is bps"),
    ("avg_write_iops", "iops of write , unit is iops"),
    ("avg_write_bandwidth", "throughput of write , unit is bps"),
    ("avg_io_workload_cpu_utilization", "usage of CPU for IO workload "),
];

const VOLUME_HELP: HelpTable = &[
    ("avg_read_latency", "avg latency time of read,unit is ms"),
    ("avg_latency", "avg latency time,unit is ms"),
    ("avg_write_latency", "avg latency time of write,unit is ms"),
    ("avg_read_iops", "iops of read,unit is iops"),
    ("avg_read_bandwidth", "bandwidth of read,unit is bps"),
    ("avg_total_iops", "total iops,unit is iops"),
    ("avg_total_bandwidth", "total bandwidth,unit is bps"),
    ("avg_write_iops", "iops of write,unit is iops"),
    ("avg_write_bandwidth", "bandwidth of write,unit is bps"),
];

const ETH_PORT_FIELDS: &[&str] = &[
    "avg_bytes_rx_ps",
    "avg_bytes_tx_ps",
    "avg_pkt_rx_crc_error_ps",
    "avg_pkt_rx_no_buffer_error_ps",
    "avg_pkt_rx_ps",
    "avg_pkt_tx_error_ps",
    "avg_pkt_tx_ps",
];

const ETH_PORT_HELP: HelpTable = &[
    ("avg_bytes_rx_ps", "receive bytes in a second"),
    ("avg_bytes_tx_ps", "send bytes in a second"),
    ("avg_pkt_rx_crc_error_ps", "packet receive crc error in a second"),
    ("avg_pkt_rx_no_buffer_error_ps", "packet receive no buffer error in a second"),
    ("avg_pkt_rx_ps", "packet receive in a second"),
    ("avg_pkt_tx_error_ps", "packet send error in a second"),
    ("avg_pkt_tx_ps", "packet get in a second"),
];

const FC_PORT_FIELDS: &[&str] = &[
    "avg_read_latency",
    "avg_latency",
    "avg_write_latency",
    "avg_total_iops",
    "avg_total_bandwidth",
    "avg_dumped_frames_ps",
    "avg_loss_of_signal_count_ps",
    "avg_invalid_crc_count_ps",
    "avg_loss_of_sync_count_ps",
    "avg_invalid_tx_word_count_ps",
    "avg_prim_seq_prot_err_count_ps",
    "avg_link_failure_count_ps",
];

const FC_PORT_HELP: HelpTable = &[
    ("avg_read_latency", "avg latency time of read,unit is ms"),
    ("avg_latency", "avg latency time,unit is ms"),
    ("avg_write_latency", "avg latency time of write,unit is ms"),
    ("avg_total_iops", "Total IOPS,unit is bps"),
    ("avg_total_bandwidth", "Total Bandwidth,unit is bps"),
    ("avg_dumped_frames_ps", "count of dumped frames in a second"),
    ("avg_loss_of_signal_count_ps", "count of loss of signal in a second"),
    ("avg_invalid_crc_count_ps", "count of invalid crc in a second"),
    ("avg_loss_of_sync_count_ps", "count of loss of sync in a second"),
    ("avg_invalid_tx_word_count_ps", "count of invalid send word in a second"),
    ("avg_prim_seq_prot_err_count_ps", "count of prim seq prot err in a second"),
    ("avg_link_failure_count_ps", "count of link failure in a second"),
];

const FILE_SYSTEM_FIELDS: &[&str] = &[
    COMMON_FIELDS[0],
    COMMON_FIELDS[1],
    COMMON_FIELDS[2],
    COMMON_FIELDS[3],
    COMMON_FIELDS[4],
    COMMON_FIELDS[5],
    COMMON_FIELDS[6],
    COMMON_FIELDS[7],
    COMMON_FIELDS[8],
    "avg_size",
    "avg_read_size",
    "avg_write_size",
    "avg_block_write_iops",
    "avg_mirror_write_iops",
    "avg_block_write_bandwidth",
    "avg_mirror_write_bandwidth",
    "avg_block_write_latency",
    "avg_mirror_overhead_latency",
];

const NAS_FIELDS: &[&str] = &[
    COMMON_FIELDS[0],
    COMMON_FIELDS[1],
    COMMON_FIELDS[2],
    COMMON_FIELDS[3],
    COMMON_FIELDS[4],
    COMMON_FIELDS[5],
    COMMON_FIELDS[6],
    COMMON_FIELDS[7],
    COMMON_FIELDS[8],
    "avg_size",
    "avg_write_size",
    "avg_read_size",
];

/// Shared by file system and NAS server reports
const FILE_HELP: HelpTable = &[
    ("avg_read_latency", "Average read latency in microseconds,unit is ms"),
    ("avg_latency", "Average read and write latency in microseconds,unit is ms"),
    ("avg_write_latency", "Average write latency in microseconds,unit is ms"),
    ("avg_read_iops", "Total read operations per second,unit is iops"),
    ("avg_read_bandwidth", "Read rate in bytes per second,unit is bps"),
    ("avg_total_iops", "Total read and write operations per second,unit is iops"),
    ("avg_total_bandwidth", "Total data transfer rate in bytes per second,unit is bps"),
    ("avg_write_iops", "Total write operations per second,unit is iops"),
    ("avg_write_bandwidth", "Write rate in bytes per second,unit is bps"),
    ("avg_block_write_iops", "Total block write operations per second,unit is iops"),
    ("avg_mirror_write_iops", "Total mirror write operations per second,unit is iops"),
    ("avg_block_write_bandwidth", "Block write rate in byte/sec,unit is bps"),
    ("avg_mirror_write_bandwidth", "Mirror write rate in byte/sec,unit is bps"),
    ("avg_block_write_latency", "Average block write latency in microsecond,unit is ms"),
    (
        "avg_mirror_overhead_latency",
        "Average additional latency incurred on the source in order to do the remote mirror writes in microseconds,unit is ms",
    ),
    ("avg_size", "Average size of read and write operations in bytes.unit is bytes"),
    ("avg_write_size", "Average write size in bytes.unit is bytes"),
    ("avg_read_size", "Average read size in bytes.unit is bytes"),
];

const CAPACITY_FIELDS: &[&str] = &[
    "last_logical_provisioned",
    "last_logical_used",
    "last_physical_total",
    "last_physical_used",
    "max_logical_provisioned",
    "max_logical_used",
    "max_physical_total",
    "max_physical_used",
    "last_data_physical_used",
    "max_data_physical_used",
    "last_efficiency_ratio",
    "last_data_reduction",
    "last_snapshot_savings",
    "last_thin_savings",
    "max_efficiency_ratio",
    "max_data_reduction",
    "max_snapshot_savings",
    "max_thin_savings",
    "last_shared_logical_used",
    "max_shared_logical_used",
];

const CAPACITY_HELP: HelpTable = &[
    ("last_logical_provisioned", "Last logical total space during the period,unit is B"),
    ("last_logical_used", "Last logical used space during the period,unit is B"),
    ("last_physical_total", "Last physical total space during the period,unit is B"),
    ("last_physical_used", "Last physical used space during the period,unit is B"),
    ("max_logical_provisioned", "Maximum logical total space during the period,unit is B"),
    ("max_logical_used", "Maximum logical used space during the period,unit is B"),
    ("max_physical_total", "Maximum physical total space during the period,unit is B"),
    ("max_physical_used", "Maximum physical used space during the period,unit is B"),
    ("last_data_physical_used", "Last physical used space for data during the period,unit is B"),
    ("max_data_physical_used", "Maximum physical used space for data during the period,unit is B"),
    ("last_efficiency_ratio", "Last efficiency ratio during the period."),
    ("last_data_reduction", "Last data reduction space during the period.unit is B"),
    ("last_snapshot_savings", "Last snapshot savings space during the period."),
    ("last_thin_savings", "Last thin savings ratio during the period."),
    ("max_efficiency_ratio", "Maximum efficiency ratio during the period."),
    ("max_data_reduction", "Maximum data reduction space during the period,unit is B"),
    ("max_snapshot_savings", "Maximum snapshot savings space during the period."),
    ("max_thin_savings", "Maximum thin savings ratio during the period."),
    ("last_shared_logical_used", "Last shared logical used during the period,unit is B"),
    ("max_shared_logical_used", "Max shared logical used during the period,unit is B"),
];

/// Built-in family tables
pub mod families {
    use super::*;

    pub const APPLIANCE: PerformanceFamily = PerformanceFamily {
        collector: "perf_appliance",
        resource: ResourceKind::Appliance,
        entity: ReportEntity::AppliancePerformance,
        naming: MetricNaming::Prefix("powerstore_perf_"),
        fields: APPLIANCE_FIELDS,
        help: APPLIANCE_HELP,
        labels: &[("appliance_id", LabelSource::EntityId)],
    };

    pub const VOLUME: PerformanceFamily = PerformanceFamily {
        collector: "perf_volume",
        resource: ResourceKind::Volume,
        entity: ReportEntity::VolumePerformance,
        naming: MetricNaming::Prefix("powerstore_metricVolume_"),
        fields: &COMMON_FIELDS,
        help: VOLUME_HELP,
        labels: &[
            ("volume_id", LabelSource::EntityName),
            ("appliance_id", LabelSource::BucketField("appliance_id")),
        ],
    };

    pub const VOLUME_GROUP: PerformanceFamily = PerformanceFamily {
        collector: "perf_volume_group",
        resource: ResourceKind::VolumeGroup,
        entity: ReportEntity::VolumeGroupPerformance,
        naming: MetricNaming::Prefix("powerstore_metricVg_"),
        fields: &COMMON_FIELDS,
        help: VOLUME_HELP,
        labels: &[
            ("volume_group_id", LabelSource::EntityName),
            ("appliance_id", LabelSource::EachApplianceId),
        ],
    };

    pub const ETH_PORT: PerformanceFamily = PerformanceFamily {
        collector: "perf_eth_port",
        resource: ResourceKind::EthPort,
        entity: ReportEntity::EthPortPerformance,
        naming: MetricNaming::Prefix("powerstore_metricEthPort_"),
        fields: ETH_PORT_FIELDS,
        help: ETH_PORT_HELP,
        labels: &[
            ("eth_port_id", LabelSource::EntityName),
            ("appliance_id", LabelSource::BucketField("appliance_id")),
        ],
    };

    pub const FC_PORT: PerformanceFamily = PerformanceFamily {
        collector: "perf_fc_port",
        resource: ResourceKind::FcPort,
        entity: ReportEntity::FcPortPerformance,
        naming: MetricNaming::Prefix("powerstore_metricFcPort_"),
        fields: FC_PORT_FIELDS,
        help: FC_PORT_HELP,
        labels: &[
            ("fc_port_id", LabelSource::EntityName),
            ("appliance_id", LabelSource::BucketField("appliance_id")),
        ],
    };

    pub const FILE_SYSTEM: PerformanceFamily = PerformanceFamily {
        collector: "perf_file_system",
        resource: ResourceKind::FileSystem,
        entity: ReportEntity::FileSystemPerformance,
        naming: MetricNaming::Prefix("powerstore_metricFilesystem_"),
        fields: FILE_SYSTEM_FIELDS,
        help: FILE_HELP,
        labels: &[
            ("name", LabelSource::EntityName),
            ("appliance_id", LabelSource::BucketField("appliance_id")),
        ],
    };

    pub const NAS: PerformanceFamily = PerformanceFamily {
        collector: "perf_nas",
        resource: ResourceKind::NasServer,
        entity: ReportEntity::NasServerPerformance,
        naming: MetricNaming::Prefix("powerstore_metricNas_"),
        fields: NAS_FIELDS,
        help: FILE_HELP,
        labels: &[("nas_id", LabelSource::EntityName)],
    };

    pub const DRIVE_WEAR: PerformanceFamily = PerformanceFamily {
        collector: "drive_wear",
        resource: ResourceKind::Drive,
        entity: ReportEntity::DriveWear,
        naming: MetricNaming::Fixed("powerstore_wear_metrics_by_drive"),
        fields: &["percent_endurance_remaining"],
        help: &[(
            "percent_endurance_remaining",
            "this is the percent of endurance remaining about drives",
        )],
        labels: &[
            ("name", LabelSource::EntityName),
            ("appliance_id", LabelSource::BucketField("appliance_id")),
        ],
    };

    pub const CAPACITY: PerformanceFamily = PerformanceFamily {
        collector: "capacity",
        resource: ResourceKind::Appliance,
        entity: ReportEntity::ApplianceSpace,
        naming: MetricNaming::Prefix("powerstore_cap_"),
        fields: CAPACITY_FIELDS,
        help: CAPACITY_HELP,
        labels: &[("appliance_id", LabelSource::BucketField("appliance_id"))],
    };
}

struct FamilyState {
    family: PerformanceFamily,
    metrics: Vec<(&'static str, Arc<MetricDescriptor>)>,
}

/// Collector for one [`PerformanceFamily`]
pub struct PerformanceCollector {
    client: Arc<ArrayClient>,
    cache: Arc<IdentityCache>,
    state: Arc<FamilyState>,
}

impl PerformanceCollector {
    pub fn new(client: Arc<ArrayClient>, cache: Arc<IdentityCache>, family: PerformanceFamily) -> Self {
        let label_names = family.label_names();
        let metrics = family
            .fields
            .iter()
            .map(|field| {
                let desc = MetricDescriptor::new(
                    family.metric_name(field),
                    help_for(family.help, field),
                    &label_names,
                    client.ip(),
                );
                (*field, desc)
            })
            .collect();

        Self {
            client,
            cache,
            state: Arc::new(FamilyState { family, metrics }),
        }
    }

    pub fn family(&self) -> &PerformanceFamily {
        &self.state.family
    }
}

/// Fetch one report and emit the newest bucket
async fn collect_entry(
    client: Arc<ArrayClient>,
    state: Arc<FamilyState>,
    entry: IdentityEntry,
    emitter: Emitter,
) -> Result<TaskOutcome> {
    let buckets = client.generate_report(state.family.entity, &entry.id).await?;
    let Some(bucket) = buckets.last() else {
        return Ok(TaskOutcome::NoData);
    };

    let label_sets = state.family.label_sets(&entry, bucket);
    let mut emitted = 0;
    for (field, descriptor) in &state.metrics {
        let Some(value) = field_f64(bucket, field) else {
            continue;
        };
        for labels in &label_sets {
            if emitter.emit(descriptor.sample(value, labels.clone())) {
                emitted += 1;
            }
        }
    }
    Ok(TaskOutcome::Emitted(emitted))
}

#[async_trait]
impl Collector for PerformanceCollector {
    fn name(&self) -> &'static str {
        self.state.family.collector
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.state.metrics.iter().map(|(_, d)| Arc::clone(d)).collect()
    }

    async fn collect(&self, emitter: &Emitter) -> Result<()> {
        let started = Instant::now();
        let family = &self.state.family;

        if self.cache.len(family.resource) == 0 {
            debug!(
                ip = %self.client.ip(),
                collector = family.collector,
                resource = %family.resource,
                "No cached resources to collect"
            );
            return Ok(());
        }

        let jobs = self.cache.entries(family.resource).map(|entry| {
            let job = collect_entry(
                Arc::clone(&self.client),
                Arc::clone(&self.state),
                entry.clone(),
                emitter.clone(),
            );
            (entry.id.clone(), job)
        });
        let summary = fan_out(family.collector, jobs).await?;

        info!(
            ip = %self.client.ip(),
            collector = family.collector,
            resources = summary.tasks,
            samples = summary.emitted,
            no_data = summary.no_data,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report collection finished"
        );
        Ok(())
    }
}
