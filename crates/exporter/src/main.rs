//! PowerStore exporter
//!
//! Logs in to every configured array, builds its identity cache and serves
//! `/metrics/<ip>/<group>` scrapes for Prometheus.

use anyhow::Result;
use clap::Parser;
use exporter_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    Exporter, RequestBudget,
};
use powerstore_exporter::{api, config::ExporterConfig, logging};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "powerstore-exporter", version, about = "Prometheus exporter for PowerStore arrays")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "EXPORTER_CONFIG", default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ExporterConfig::load(&args.config)?;
    let _log_guard = logging::init(&config.log)?;

    info!(config = %args.config.display(), targets = config.storage_list.len(), "Configuration loaded");

    let health_registry = HealthRegistry::new();
    health_registry.register(components::EXPORTER).await;

    let logger = StructuredLogger::new(format!("0.0.0.0:{}", config.exporter.port));
    logger.log_startup(EXPORTER_VERSION, config.exporter.port, config.storage_list.len());

    let budget = RequestBudget::new(config.exporter.req_limit);
    let exporter = Exporter::start(config.storage_list, budget, &health_registry, &logger).await;
    info!(targets = ?exporter.ips(), "Exporter ready");

    let app_state = Arc::new(api::AppState::new(Arc::new(exporter), health_registry));
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    api::serve(config.exporter.port, app_state, shutdown).await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
