//! Hot Shot Props service library
//!
//! Wires the stat store, fetcher, feature builder and projection engine into
//! one pipeline, with configuration loading, logging, a refresh scheduler
//! and graceful shutdown handling for the `hotshot` binary.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod signals;

pub use config::{LoggingConfig, SchedulerConfig, ServiceConfig};
pub use logging::initialize_logging;
pub use pipeline::{is_fatal, BuildSummary, Pipeline, RefreshReport};
pub use scheduler::run_scheduled;
pub use signals::shutdown_signal;

/// Load configuration from an optional file and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<ServiceConfig> {
    config::load_config(path).context("Failed to load service configuration")
}
