//! Log sink setup

use crate::config::{LogConfig, LogFormat};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// Console output is always on. When `log.path` is set, the same events are
/// also written to that file through a non-blocking writer; keep the returned
/// guard alive until shutdown so buffered lines get flushed. A log file that
/// cannot be opened is reported on the console and otherwise ignored.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    let mut file_error = None;
    let (file_writer, guard) = match config.path.as_deref() {
        Some(path) => match file_writer(Path::new(path)) {
            Ok((writer, guard)) => (Some(writer), Some(guard)),
            Err(e) => {
                file_error = Some((path, e));
                (None, None)
            }
        },
        None => (None, None),
    };

    match config.format {
        LogFormat::Json => {
            let file_layer = file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .with(file_layer)
                .try_init()?;
        }
        LogFormat::Logfmt => {
            let file_layer = file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(file_layer)
                .try_init()?;
        }
    }

    if let Some((path, e)) = file_error {
        warn!(path = %path, error = %format!("{:#}", e), "Open log file failed, logging to console only");
    }

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}
