//! Core data models shared by the client, cache and collectors

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page size used for list calls when a target does not configure one
pub const DEFAULT_API_LIMIT: u32 = 5000;

/// One monitored storage array, as described in the exporter configuration.
///
/// Targets are immutable once the exporter has started; every target gets its
/// own session and identity cache for the lifetime of the process.
#[derive(Clone, Serialize, Deserialize)]
pub struct Target {
    /// Management address of the array (host or host:port)
    #[serde(default)]
    pub ip: String,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    /// REST API version tag; `v3` switches volume listing to the CMA view
    #[serde(rename = "apiVersion", alias = "apiversion", alias = "api_version", default)]
    pub api_version: String,

    /// Upper bound for the `limit` parameter of list calls (0 means default)
    #[serde(rename = "apiLimit", alias = "apilimit", alias = "api_limit", default)]
    pub api_limit: u32,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("ip", &self.ip)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("api_limit", &self.api_limit)
            .finish()
    }
}

impl Target {
    pub fn new(
        ip: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            user: user.into(),
            password: password.into(),
            api_version: api_version.into(),
            api_limit: DEFAULT_API_LIMIT,
        }
    }

    /// Set the list page size
    pub fn with_api_limit(mut self, limit: u32) -> Self {
        self.api_limit = limit;
        self
    }

    /// Effective page size for list calls.
    ///
    /// This truncates rather than paginates: an array holding more objects
    /// than the limit only reports the first page.
    pub fn page_limit(&self) -> u32 {
        if self.api_limit == 0 {
            DEFAULT_API_LIMIT
        } else {
            self.api_limit
        }
    }

    /// Whether volume listings should use the `_list_cma_view` endpoints
    pub fn uses_cma_views(&self) -> bool {
        self.api_version.trim().eq_ignore_ascii_case("v3")
    }

    /// Check that every field needed to talk to the array is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("ip", &self.ip),
            ("user", &self.user),
            ("password", &self.password),
            ("apiVersion", &self.api_version),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    ip: self.ip.clone(),
                    field,
                });
            }
        }

        Ok(())
    }
}

/// Resource types tracked by the identity cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Appliance,
    Volume,
    VolumeGroup,
    EthPort,
    FcPort,
    Drive,
    NasServer,
    FileSystem,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Appliance,
        ResourceKind::Volume,
        ResourceKind::VolumeGroup,
        ResourceKind::EthPort,
        ResourceKind::FcPort,
        ResourceKind::Drive,
        ResourceKind::NasServer,
        ResourceKind::FileSystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Appliance => "appliance",
            ResourceKind::Volume => "volume",
            ResourceKind::VolumeGroup => "volume_group",
            ResourceKind::EthPort => "eth_port",
            ResourceKind::FcPort => "fc_port",
            ResourceKind::Drive => "drive",
            ResourceKind::NasServer => "nas_server",
            ResourceKind::FileSystem => "file_system",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Front-end port families exposed by the array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Eth,
    Fc,
}

impl PortKind {
    pub const ALL: [PortKind; 2] = [PortKind::Eth, PortKind::Fc];

    /// REST collection holding ports of this kind
    pub fn resource(&self) -> &'static str {
        match self {
            PortKind::Eth => "eth_port",
            PortKind::Fc => "fc_port",
        }
    }
}

/// Values accepted by the `type` filter of the hardware collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareType {
    Node,
    Drive,
    Fan,
    PowerSupply,
    Battery,
}

impl HardwareType {
    /// Component types reported with a lifecycle state series
    pub const COMPONENTS: [HardwareType; 4] = [
        HardwareType::Drive,
        HardwareType::Fan,
        HardwareType::PowerSupply,
        HardwareType::Battery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareType::Node => "Node",
            HardwareType::Drive => "Drive",
            HardwareType::Fan => "Fan",
            HardwareType::PowerSupply => "Power_Supply",
            HardwareType::Battery => "Battery",
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit_defaults_when_unset() {
        let target = Target::new("10.0.0.1", "admin", "secret", "v3").with_api_limit(0);
        assert_eq!(target.page_limit(), DEFAULT_API_LIMIT);

        let target = target.with_api_limit(10);
        assert_eq!(target.page_limit(), 10);
    }

    #[test]
    fn test_cma_views_only_for_v3() {
        assert!(Target::new("a", "u", "p", "v3").uses_cma_views());
        assert!(Target::new("a", "u", "p", "V3").uses_cma_views());
        assert!(!Target::new("a", "u", "p", "v2").uses_cma_views());
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let target = Target::new("10.0.0.1", "admin", "", "v3");
        match target.validate() {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "password"),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(Target::new("10.0.0.1", "admin", "secret", "v3").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let target = Target::new("10.0.0.1", "admin", "hunter2", "v3");
        let rendered = format!("{:?}", target);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_target_deserializes_camel_and_lowercase_keys() {
        let camel: Target = serde_json::from_str(
            r#"{"ip":"1.2.3.4","user":"u","password":"p","apiVersion":"v3","apiLimit":10}"#,
        )
        .unwrap();
        let lower: Target = serde_json::from_str(
            r#"{"ip":"1.2.3.4","user":"u","password":"p","apiversion":"v3","apilimit":10}"#,
        )
        .unwrap();

        assert_eq!(camel.api_version, "v3");
        assert_eq!(lower.api_limit, 10);
    }

    #[test]
    fn test_hardware_type_filter_values() {
        assert_eq!(HardwareType::PowerSupply.as_str(), "Power_Supply");
        assert_eq!(HardwareType::COMPONENTS.len(), 4);
        assert!(!HardwareType::COMPONENTS.contains(&HardwareType::Node));
    }
}
