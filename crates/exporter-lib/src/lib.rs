//! Library for exporting PowerStore array metrics to Prometheus
//!
//! This crate provides the core functionality for:
//! - Authenticated, budgeted access to array management APIs
//! - Per-array identity caches built at startup
//! - Collectors turning array JSON into gauge samples
//! - Resource-group scrapes rendered in the Prometheus text format
//! - Health checks and self-observability

pub mod cache;
pub mod client;
pub mod collector;
pub mod error;
pub mod exporter;
pub mod health;
pub mod models;
pub mod observability;
pub mod registry;

pub use cache::{BuildReport, IdentityCache, IdentityEntry};
pub use client::{ArrayClient, RequestBudget, DEFAULT_REQUEST_LIMIT};
pub use error::{ClientError, ConfigError, ScrapeError};
pub use exporter::{start_target, validate_targets, Exporter, StartupReport};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use registry::{ResourceGroup, TargetRegistry, EXPOSITION_CONTENT_TYPE};
