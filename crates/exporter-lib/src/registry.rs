//! Resource groups and scrape exposition
//!
//! A scrape of `/metrics/<ip>/<group>` runs every collector of that group
//! concurrently, gathers their samples from a shared channel and renders them
//! through a fresh prometheus [`Registry`] in the text exposition format.

use crate::cache::IdentityCache;
use crate::client::ArrayClient;
use crate::collector::{
    families, ApplianceCollector, ClusterCollector, Collector, Emitter, FileSystemCollector,
    HardwareCollector, MetricSample, NasCollector, PerformanceCollector, PerformanceFamily,
    PortCollector, VolumeCollector, VolumeGroupCollector, TARGET_LABEL,
};
use crate::error::ScrapeError;
use crate::observability::ExporterMetrics;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Content type of the text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Path segment selecting which collectors a scrape runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceGroup {
    Cluster,
    Port,
    File,
    Hardware,
    Volume,
    Appliance,
    Nas,
    VolumeGroup,
    Capacity,
}

impl ResourceGroup {
    pub const ALL: [ResourceGroup; 9] = [
        ResourceGroup::Cluster,
        ResourceGroup::Port,
        ResourceGroup::File,
        ResourceGroup::Hardware,
        ResourceGroup::Volume,
        ResourceGroup::Appliance,
        ResourceGroup::Nas,
        ResourceGroup::VolumeGroup,
        ResourceGroup::Capacity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceGroup::Cluster => "cluster",
            ResourceGroup::Port => "port",
            ResourceGroup::File => "file",
            ResourceGroup::Hardware => "hardware",
            ResourceGroup::Volume => "volume",
            ResourceGroup::Appliance => "appliance",
            ResourceGroup::Nas => "nas",
            ResourceGroup::VolumeGroup => "volumeGroup",
            ResourceGroup::Capacity => "capacity",
        }
    }
}

impl fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceGroup {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ScrapeError::UnknownGroup(s.to_string()))
    }
}

/// The collectors behind one resource group of one array
pub struct CollectorGroup {
    group: ResourceGroup,
    collectors: Vec<Arc<dyn Collector>>,
    metrics: ExporterMetrics,
}

impl CollectorGroup {
    pub fn new(group: ResourceGroup, collectors: Vec<Arc<dyn Collector>>) -> Self {
        Self {
            group,
            collectors,
            metrics: ExporterMetrics::new(),
        }
    }

    pub fn group(&self) -> ResourceGroup {
        self.group
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Run every collector concurrently and return all emitted samples.
    ///
    /// A failing collector is logged and counted; the samples of the others
    /// are still returned.
    pub async fn gather(&self) -> Vec<MetricSample> {
        let started = Instant::now();
        let (emitter, mut rx) = Emitter::channel();
        let mut set = JoinSet::new();

        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let emitter = emitter.clone();
            set.spawn(async move {
                let result = collector.collect(&emitter).await;
                (collector.name(), result)
            });
        }
        drop(emitter);

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(e))) => {
                    warn!(group = %self.group, collector = name, error = %e, "Collector pass failed");
                    self.metrics.inc_collector_errors(name);
                }
                Err(e) => {
                    error!(group = %self.group, error = %e, "Collector task did not complete");
                }
            }
        }

        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }

        let elapsed = started.elapsed();
        self.metrics
            .observe_scrape(self.group.as_str(), elapsed.as_secs_f64(), samples.len());
        debug!(
            group = %self.group,
            samples = samples.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape gathered"
        );
        samples
    }

    /// Gather and render in the text exposition format
    pub async fn scrape(&self) -> Result<Vec<u8>, ScrapeError> {
        let samples = self.gather().await;
        Ok(encode_samples(&samples)?)
    }
}

/// Render samples through a throwaway registry.
///
/// Samples sharing a name become one gauge family. A repeated label set keeps
/// the last value. Samples whose label layout disagrees with the first sample
/// of their family are dropped, and so is a whole family the registry refuses.
pub fn encode_samples(samples: &[MetricSample]) -> prometheus::Result<Vec<u8>> {
    let registry = Registry::new();
    // `None` marks a family that could not be registered
    let mut families: HashMap<&str, Option<GaugeVec>> = HashMap::new();

    for sample in samples {
        if !families.contains_key(sample.name()) {
            let gauge = match register_family(&registry, sample) {
                Ok(gauge) => Some(gauge),
                Err(e) => {
                    warn!(metric = sample.name(), error = %e, "Dropping metric family");
                    None
                }
            };
            families.insert(sample.name(), gauge);
        }
        let Some(gauge) = &families[sample.name()] else {
            continue;
        };

        let values: Vec<&str> = sample.label_values().iter().map(String::as_str).collect();
        match gauge.get_metric_with_label_values(&values) {
            Ok(g) => g.set(sample.value()),
            Err(e) => warn!(metric = sample.name(), error = %e, "Dropping sample with mismatched labels"),
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

fn register_family(registry: &Registry, sample: &MetricSample) -> prometheus::Result<GaugeVec> {
    let opts = Opts::new(sample.name(), sample.help()).const_label(TARGET_LABEL, sample.target_ip());
    let gauge = GaugeVec::new(opts, sample.descriptor().label_names())?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn shared<C: Collector + 'static>(collector: C) -> Arc<dyn Collector> {
    Arc::new(collector)
}

/// Every resource group of one array
pub struct TargetRegistry {
    client: Arc<ArrayClient>,
    cache: Arc<IdentityCache>,
    groups: HashMap<ResourceGroup, CollectorGroup>,
}

impl TargetRegistry {
    /// Standard wiring of collectors to resource groups
    pub fn standard(client: Arc<ArrayClient>, cache: Arc<IdentityCache>) -> Self {
        let perf = |family: PerformanceFamily| {
            shared(PerformanceCollector::new(Arc::clone(&client), Arc::clone(&cache), family))
        };

        let wiring: Vec<(ResourceGroup, Vec<Arc<dyn Collector>>)> = vec![
            (
                ResourceGroup::Cluster,
                vec![shared(ClusterCollector::new(Arc::clone(&client)))],
            ),
            (
                ResourceGroup::Port,
                vec![
                    shared(PortCollector::new(Arc::clone(&client))),
                    perf(families::FC_PORT),
                    perf(families::ETH_PORT),
                ],
            ),
            (
                ResourceGroup::File,
                vec![
                    shared(FileSystemCollector::new(Arc::clone(&client))),
                    perf(families::FILE_SYSTEM),
                ],
            ),
            (
                ResourceGroup::Hardware,
                vec![
                    shared(HardwareCollector::new(Arc::clone(&client))),
                    perf(families::DRIVE_WEAR),
                ],
            ),
            (
                ResourceGroup::Volume,
                vec![
                    shared(VolumeCollector::new(Arc::clone(&client))),
                    perf(families::VOLUME),
                ],
            ),
            (
                ResourceGroup::Appliance,
                vec![
                    shared(ApplianceCollector::new(Arc::clone(&client))),
                    perf(families::APPLIANCE),
                ],
            ),
            (
                ResourceGroup::Nas,
                vec![shared(NasCollector::new(Arc::clone(&client))), perf(families::NAS)],
            ),
            (
                ResourceGroup::VolumeGroup,
                vec![
                    shared(VolumeGroupCollector::new(Arc::clone(&client))),
                    perf(families::VOLUME_GROUP),
                ],
            ),
            (ResourceGroup::Capacity, vec![perf(families::CAPACITY)]),
        ];

        let groups = wiring
            .into_iter()
            .map(|(group, collectors)| (group, CollectorGroup::new(group, collectors)))
            .collect();

        Self {
            client,
            cache,
            groups,
        }
    }

    pub fn ip(&self) -> &str {
        self.client.ip()
    }

    pub fn client(&self) -> &Arc<ArrayClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn group(&self, group: ResourceGroup) -> Option<&CollectorGroup> {
        self.groups.get(&group)
    }

    /// Scrape the group named by a URL path segment
    pub async fn scrape(&self, group: &str) -> Result<Vec<u8>, ScrapeError> {
        let group: ResourceGroup = group.parse()?;
        match self.groups.get(&group) {
            Some(collectors) => collectors.scrape().await,
            None => Err(ScrapeError::UnknownGroup(group.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::{client_for, empty_cache};
    use crate::collector::MetricDescriptor;
    use crate::error::Result;
    use async_trait::async_trait;
    use mockito::Server;

    struct FixedCollector {
        name: &'static str,
        samples: Vec<MetricSample>,
        fail: bool,
    }

    #[async_trait]
    impl Collector for FixedCollector {
        fn name(&self) -> &'static str {
            self.name
        }

        fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
            self.samples.iter().map(|s| Arc::clone(s.descriptor())).collect()
        }

        async fn collect(&self, emitter: &Emitter) -> Result<()> {
            for sample in &self.samples {
                emitter.emit(sample.clone());
            }
            if self.fail {
                return Err(crate::error::ClientError::BudgetClosed);
            }
            Ok(())
        }
    }

    #[test]
    fn test_group_names_round_trip() {
        for group in ResourceGroup::ALL {
            assert_eq!(group.as_str().parse::<ResourceGroup>().unwrap(), group);
        }
        assert!(matches!(
            "volumegroup".parse::<ResourceGroup>(),
            Err(ScrapeError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_encoding_carries_target_label() {
        let desc = MetricDescriptor::new(
            "powerstore_volume_size",
            "the unit is B",
            &["name", "appliance_id"],
            "10.0.0.1",
        );
        let samples = vec![
            desc.sample(1.0, vec!["vol-1".into(), "A1".into()]),
            desc.sample(2.0, vec!["vol-2".into(), "A1".into()]),
            desc.sample(3.0, vec!["vol-1".into(), "A1".into()]),
        ];

        let text = String::from_utf8(encode_samples(&samples).unwrap()).unwrap();

        assert!(text.contains("# HELP powerstore_volume_size the unit is B"));
        assert!(text.contains("# TYPE powerstore_volume_size gauge"));
        assert!(text.contains(r#"powerstore_volume_size{IP="10.0.0.1",appliance_id="A1",name="vol-1"} 3"#));
        assert!(text.contains(r#"name="vol-2"} 2"#));
    }

    #[test]
    fn test_mismatched_labels_are_dropped() {
        let two = MetricDescriptor::new("m", "h", &["a", "b"], "ip");
        let one = MetricDescriptor::new("m", "h", &["a"], "ip");
        let samples = vec![
            two.sample(1.0, vec!["x".into(), "y".into()]),
            one.sample(2.0, vec!["z".into()]),
        ];

        let text = String::from_utf8(encode_samples(&samples).unwrap()).unwrap();

        assert!(text.contains(r#"m{IP="ip",a="x",b="y"} 1"#));
        assert!(!text.contains(r#"a="z""#));
    }

    #[test]
    fn test_rejected_family_keeps_the_others() {
        let invalid = MetricDescriptor::new("powerstore-bad name", "h", &["a"], "ip");
        let valid = MetricDescriptor::new("powerstore_good", "h", &["a"], "ip");
        let samples = vec![
            invalid.sample(1.0, vec!["x".into()]),
            valid.sample(2.0, vec!["y".into()]),
            invalid.sample(3.0, vec!["z".into()]),
        ];

        let text = String::from_utf8(encode_samples(&samples).unwrap()).unwrap();

        assert!(text.contains(r#"powerstore_good{IP="ip",a="y"} 2"#));
        assert!(!text.contains("bad"));
    }

    #[tokio::test]
    async fn test_failing_collector_keeps_siblings() {
        let desc = MetricDescriptor::new("powerstore_cluster", "state", &["name"], "10.0.0.1");
        let ok = FixedCollector {
            name: "ok",
            samples: vec![desc.sample(1.0, vec!["c1".into()])],
            fail: false,
        };
        let broken = FixedCollector {
            name: "broken",
            samples: Vec::new(),
            fail: true,
        };
        let group = CollectorGroup::new(ResourceGroup::Cluster, vec![shared(ok), shared(broken)]);

        let samples = group.gather().await;

        assert_eq!(samples.len(), 1);
        assert_eq!(group.collector_names(), vec!["ok", "broken"]);
    }

    #[tokio::test]
    async fn test_standard_wiring() {
        let server = Server::new_async().await;
        let registry = TargetRegistry::standard(client_for(&server), Arc::new(empty_cache()));

        let names = |g| registry.group(g).unwrap().collector_names();
        assert_eq!(names(ResourceGroup::Port), vec!["port", "perf_fc_port", "perf_eth_port"]);
        assert_eq!(names(ResourceGroup::Hardware), vec!["hardware", "drive_wear"]);
        assert_eq!(names(ResourceGroup::Capacity), vec!["capacity"]);
        assert_eq!(names(ResourceGroup::VolumeGroup), vec!["volume_group", "perf_volume_group"]);
        assert!(ResourceGroup::ALL.iter().all(|g| registry.group(*g).is_some()));
        assert_eq!(registry.ip(), "10.0.0.1");
    }

    #[tokio::test]
    async fn test_unknown_group_is_rejected() {
        let server = Server::new_async().await;
        let registry = TargetRegistry::standard(client_for(&server), Arc::new(empty_cache()));

        let err = registry.scrape("disks").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UnknownGroup(name) if name == "disks"));
    }
}
