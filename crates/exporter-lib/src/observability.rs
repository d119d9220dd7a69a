//! Observability infrastructure for the exporter itself
//!
//! Provides:
//! - Prometheus metrics about the exporter's own work (scrapes, upstream calls,
//!   re-logins), served on `/performance`
//! - Structured event logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for scrape durations (in seconds)
const SCRAPE_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    scrape_duration_seconds: HistogramVec,
    scrapes_total: IntCounterVec,
    samples_emitted_total: IntCounterVec,
    upstream_requests_total: IntCounterVec,
    upstream_in_flight: IntGauge,
    relogins_total: IntCounterVec,
    collector_errors_total: IntCounterVec,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram_vec!(
                "powerstore_exporter_scrape_duration_seconds",
                "Time spent serving one scrape of a resource group",
                &["group"],
                SCRAPE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            scrapes_total: register_int_counter_vec!(
                "powerstore_exporter_scrapes_total",
                "Number of scrapes served per resource group",
                &["group"]
            )
            .expect("Failed to register scrapes_total"),

            samples_emitted_total: register_int_counter_vec!(
                "powerstore_exporter_samples_emitted_total",
                "Number of array samples emitted per resource group",
                &["group"]
            )
            .expect("Failed to register samples_emitted_total"),

            upstream_requests_total: register_int_counter_vec!(
                "powerstore_exporter_upstream_requests_total",
                "Requests sent to array management APIs, by array and response status",
                &["ip", "status"]
            )
            .expect("Failed to register upstream_requests_total"),

            upstream_in_flight: register_int_gauge!(
                "powerstore_exporter_upstream_in_flight",
                "Upstream requests currently holding a request budget permit"
            )
            .expect("Failed to register upstream_in_flight"),

            relogins_total: register_int_counter_vec!(
                "powerstore_exporter_relogins_total",
                "Session refreshes after an array rejected the token, per array",
                &["ip"]
            )
            .expect("Failed to register relogins_total"),

            collector_errors_total: register_int_counter_vec!(
                "powerstore_exporter_collector_errors_total",
                "Collector passes that ended with an error",
                &["collector"]
            )
            .expect("Failed to register collector_errors_total"),
        }
    }
}

/// Exporter metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    /// Record one served scrape
    pub fn observe_scrape(&self, group: &str, duration_secs: f64, samples: usize) {
        let inner = self.inner();
        inner
            .scrape_duration_seconds
            .with_label_values(&[group])
            .observe(duration_secs);
        inner.scrapes_total.with_label_values(&[group]).inc();
        inner
            .samples_emitted_total
            .with_label_values(&[group])
            .inc_by(samples as u64);
    }

    /// Count an upstream response (or `error` for transport failures)
    pub fn inc_upstream_request(&self, ip: &str, status: &str) {
        self.inner()
            .upstream_requests_total
            .with_label_values(&[ip, status])
            .inc();
    }

    pub fn set_upstream_in_flight(&self, in_flight: i64) {
        self.inner().upstream_in_flight.set(in_flight);
    }

    pub fn inc_relogins(&self, ip: &str) {
        self.inner().relogins_total.with_label_values(&[ip]).inc();
    }

    pub fn inc_collector_errors(&self, collector: &str) {
        self.inner()
            .collector_errors_total
            .with_label_values(&[collector])
            .inc();
    }
}

/// Structured logger for exporter lifecycle events
///
/// Keeps the field names of lifecycle logs consistent so they can be
/// filtered in a log pipeline.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, port: u16, targets: usize) {
        info!(
            event = "exporter_started",
            instance = %self.instance,
            version = %version,
            port = port,
            targets = targets,
            "PowerStore exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "PowerStore exporter shutting down"
        );
    }

    /// Log the outcome of registering one array
    pub fn log_target_registered(
        &self,
        ip: &str,
        logged_in: bool,
        cached_kinds: usize,
        failed_kinds: &[&str],
    ) {
        if logged_in && failed_kinds.is_empty() {
            info!(
                event = "target_registered",
                instance = %self.instance,
                ip = %ip,
                cached_kinds = cached_kinds,
                "Array registered"
            );
        } else {
            warn!(
                event = "target_registered",
                instance = %self.instance,
                ip = %ip,
                logged_in = logged_in,
                cached_kinds = cached_kinds,
                failed_kinds = ?failed_kinds,
                "Array registered with degraded identity cache"
            );
        }
    }

    /// Log a replacement session for an array whose token expired
    pub fn log_relogin(&self, ip: &str, generation: u64) {
        info!(
            event = "session_refreshed",
            instance = %self.instance,
            ip = %ip,
            generation = generation,
            "Re-authenticated against array"
        );
    }

    /// Log a target that could not be registered at all
    pub fn log_target_rejected(&self, ip: &str, reason: &str) {
        warn!(
            event = "target_rejected",
            instance = %self.instance,
            ip = %ip,
            reason = %reason,
            "Skipping array with invalid configuration"
        );
    }
}
