//! Named read operations against the array's REST collections

use super::ArrayClient;
use crate::error::{ClientError, Result};
use crate::models::{HardwareType, PortKind, ResourceKind};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Path of the time-series report endpoint
pub const REPORT_PATH: &str = "metrics/generate";

/// Bucket size requested from the report endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportInterval {
    FiveMins,
    OneHour,
    OneDay,
}

impl ReportInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportInterval::FiveMins => "Five_Mins",
            ReportInterval::OneHour => "One_Hour",
            ReportInterval::OneDay => "One_Day",
        }
    }
}

/// Metric series that can be generated for a single resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportEntity {
    AppliancePerformance,
    ApplianceSpace,
    VolumePerformance,
    VolumeGroupPerformance,
    EthPortPerformance,
    FcPortPerformance,
    FileSystemPerformance,
    NasServerPerformance,
    DriveWear,
}

impl ReportEntity {
    pub fn entity(&self) -> &'static str {
        match self {
            ReportEntity::AppliancePerformance => "performance_metrics_by_appliance",
            ReportEntity::ApplianceSpace => "space_metrics_by_appliance",
            ReportEntity::VolumePerformance => "performance_metrics_by_volume",
            ReportEntity::VolumeGroupPerformance => "performance_metrics_by_vg",
            ReportEntity::EthPortPerformance => "performance_metrics_by_fe_eth_port",
            ReportEntity::FcPortPerformance => "performance_metrics_by_fe_fc_port",
            ReportEntity::FileSystemPerformance => "performance_metrics_by_file_system",
            ReportEntity::NasServerPerformance => "performance_metrics_by_nas_server",
            ReportEntity::DriveWear => "wear_metrics_by_drive",
        }
    }

    /// Capacity is sampled hourly; everything else uses five-minute buckets
    pub fn interval(&self) -> ReportInterval {
        match self {
            ReportEntity::ApplianceSpace => ReportInterval::OneHour,
            _ => ReportInterval::FiveMins,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    entity: &'a str,
    entity_id: &'a str,
    interval: &'a str,
}

impl ArrayClient {
    /// Build `<resource>?select=<fields>&limit=<N>[&type=eq.<T>]`
    pub(crate) fn list_path(&self, resource: &str, select: &str, type_filter: Option<&str>) -> String {
        let mut path = format!(
            "{}?select={}&limit={}",
            resource,
            select,
            self.target().page_limit()
        );
        if let Some(kind) = type_filter {
            path.push_str("&type=eq.");
            path.push_str(kind);
        }
        path
    }

    /// GET a list endpoint and require a JSON array back
    pub async fn list(&self, resource: &str, select: &str, type_filter: Option<&str>) -> Result<Vec<Value>> {
        let path = self.list_path(resource, select, type_filter);
        let value = self.request(Method::GET, &path, None).await?;
        into_array(value, &path)
    }

    fn volume_resource(&self) -> &'static str {
        if self.target().uses_cma_views() {
            "volume_list_cma_view"
        } else {
            "volume"
        }
    }

    pub async fn cluster(&self) -> Result<Vec<Value>> {
        self.list("cluster", "*", None).await
    }

    pub async fn appliances(&self) -> Result<Vec<Value>> {
        self.list("appliance", "*", None).await
    }

    pub async fn ports(&self, kind: PortKind) -> Result<Vec<Value>> {
        self.list(kind.resource(), "*", None).await
    }

    pub async fn hardware(&self, kind: HardwareType) -> Result<Vec<Value>> {
        self.list("hardware", "*", Some(kind.as_str())).await
    }

    /// Volume listing; the endpoint depends on the configured API version
    pub async fn volumes(&self) -> Result<Vec<Value>> {
        self.list(self.volume_resource(), "*", None).await
    }

    pub async fn volume_groups(&self) -> Result<Vec<Value>> {
        self.list("volume_group_list_cma_view", "*", None).await
    }

    pub async fn file_systems(&self) -> Result<Vec<Value>> {
        self.list("file_system", "*", None).await
    }

    pub async fn nas_servers(&self) -> Result<Vec<Value>> {
        self.list("nas_server", "*", None).await
    }

    /// `id,name` listing used to populate the identity cache
    pub async fn identities(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        match kind {
            ResourceKind::Appliance => self.list("appliance", "id,name", None).await,
            ResourceKind::Volume => self.list(self.volume_resource(), "id,name", None).await,
            ResourceKind::VolumeGroup => {
                self.list("volume_group_list_cma_view", "id,name,appliance_ids", None)
                    .await
            }
            ResourceKind::EthPort => self.list("eth_port", "id,name", None).await,
            ResourceKind::FcPort => self.list("fc_port", "id,name", None).await,
            ResourceKind::Drive => {
                self.list("hardware", "id,name", Some(HardwareType::Drive.as_str()))
                    .await
            }
            ResourceKind::NasServer => self.list("nas_server", "id,name", None).await,
            ResourceKind::FileSystem => self.list("file_system", "id,name", None).await,
        }
    }

    /// Generate a metric report for one resource.
    ///
    /// Returns the time-ordered buckets; an empty vector means the array has
    /// no data for this resource yet.
    pub async fn generate_report(&self, entity: ReportEntity, id: &str) -> Result<Vec<Value>> {
        let body = serde_json::to_value(ReportRequest {
            entity: entity.entity(),
            entity_id: id,
            interval: entity.interval().as_str(),
        })?;
        let value = self.request(Method::POST, REPORT_PATH, Some(&body)).await?;
        into_array(value, REPORT_PATH)
    }
}

fn into_array(value: Value, path: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ClientError::UnexpectedShape {
            path: path.to_string(),
            expected: "a JSON array",
        }),
    }
}
