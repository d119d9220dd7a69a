//! Exporter configuration

use anyhow::{Context, Result};
use exporter_lib::{Target, DEFAULT_REQUEST_LIMIT};
use serde::Deserialize;
use std::path::Path;

/// Full configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExporterConfig {
    #[serde(default)]
    pub exporter: ServerConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Arrays to monitor
    #[serde(rename = "storageList", alias = "storagelist", alias = "storage_list", default)]
    pub storage_list: Vec<Target>,
}

/// HTTP server and upstream request budget
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of in-flight requests against the arrays
    #[serde(rename = "reqLimit", alias = "reqlimit", alias = "req_limit", default = "default_req_limit")]
    pub req_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            req_limit: default_req_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[serde(alias = "text")]
    Logfmt,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "type", default)]
    pub format: LogFormat,

    /// Log file; console output is kept either way
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            path: None,
            level: default_level(),
        }
    }
}

fn default_port() -> u16 {
    9010
}

fn default_req_limit() -> usize {
    DEFAULT_REQUEST_LIMIT
}

fn default_level() -> String {
    "info".to_string()
}

/// Lowercase a configured level; anything unrecognised becomes `info`
fn normalize_level(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    match level.as_str() {
        "debug" | "info" | "warn" | "error" => level,
        _ => default_level(),
    }
}

impl ExporterConfig {
    /// Load the YAML file at `path`, with `EXPORTER_*` environment overrides
    /// (`EXPORTER_EXPORTER__PORT=9100`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix("EXPORTER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut parsed: Self = config
            .try_deserialize()
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        parsed.normalize();
        Ok(parsed)
    }

    fn normalize(&mut self) {
        if self.exporter.req_limit == 0 {
            self.exporter.req_limit = default_req_limit();
        }
        self.log.level = normalize_level(&self.log.level);
        if self.log.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            self.log.path = None;
        }
    }
}
