//! HTTP front end, configuration and logging for the PowerStore exporter

pub mod api;
pub mod config;
pub mod logging;
