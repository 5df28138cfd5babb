//! Service configuration management
//!
//! Defaults, then an optional TOML file, then `HOTSHOT_*` environment
//! variables, then validation.

use anyhow::{anyhow, Context, Result};
use feature_builder::FeatureConfig;
use projection_engine::RegistryConfig;
use serde::{Deserialize, Serialize};
use stat_fetcher::FetcherConfig;
use stat_store::StoreConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Raw and feature table locations
    pub store: StoreConfig,

    /// Remote API and ingestion settings
    pub fetcher: FetcherConfig,

    /// Feature derivation settings
    pub features: FeatureConfig,

    /// Model artifact settings
    pub registry: RegistryConfig,

    /// Refresh cycle scheduling
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Refresh cycle scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minutes between refresh cycles
    pub refresh_interval_mins: u64,

    /// Run a cycle immediately instead of waiting one interval
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { refresh_interval_mins: 360, run_on_start: true }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_mins * 60)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl ServiceConfig {
    /// Parse a TOML document; absent sections keep their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration file")
    }

    /// Load a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        Self::from_toml(&text)
    }

    /// Apply `HOTSHOT_*` overrides obtained through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("HOTSHOT_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("HOTSHOT_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(data_dir) = lookup("HOTSHOT_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        if let Some(models_dir) = lookup("HOTSHOT_MODELS_DIR") {
            self.registry.models_dir = PathBuf::from(models_dir);
        }

        if let Some(base_url) = lookup("HOTSHOT_API_BASE_URL") {
            self.fetcher.base_url = base_url;
        }

        if let Some(value) = lookup("HOTSHOT_MAX_CONCURRENCY") {
            self.fetcher.max_concurrency = parse_var("HOTSHOT_MAX_CONCURRENCY", &value)?;
        }

        if let Some(value) = lookup("HOTSHOT_SEASONS") {
            self.fetcher.seasons = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_var("HOTSHOT_SEASONS", s))
                .collect::<Result<_>>()?;
        }

        if let Some(value) = lookup("HOTSHOT_WINDOW") {
            self.features.window = parse_var("HOTSHOT_WINDOW", &value)?;
        }

        if let Some(value) = lookup("HOTSHOT_REFRESH_INTERVAL_MINS") {
            self.scheduler.refresh_interval_mins = parse_var("HOTSHOT_REFRESH_INTERVAL_MINS", &value)?;
        }

        Ok(())
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.store.validate().map_err(|e| anyhow!("store: {e}"))?;
        self.fetcher.validate().map_err(|e| anyhow!("fetcher: {e}"))?;
        self.features.validate().map_err(|e| anyhow!("features: {e}"))?;
        self.registry.validate().map_err(|e| anyhow!("registry: {e}"))?;

        if self.scheduler.refresh_interval_mins == 0 {
            return Err(anyhow!("scheduler: refresh_interval_mins must be greater than 0"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(anyhow!("Invalid log format: {}", self.logging.format)),
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| anyhow!("Invalid value for {name}: {value:?}"))
}

/// Load configuration from an optional file and the process environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            ServiceConfig::from_file(path)?
        }
        None => ServiceConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.interval(), Duration::from_secs(360 * 60));
        assert_eq!(config.features.window, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            [store]
            data_dir = "/var/lib/hotshot"

            [fetcher]
            max_concurrency = 4
            seasons = [2024, 2025]

            [fetcher.retry]
            max_retries = 5

            [registry]
            algorithms = ["rf", "xgb"]
            "#,
        )
        .unwrap();

        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/hotshot"));
        assert_eq!(config.store.raw_file, "raw_logs.csv");
        assert_eq!(config.fetcher.max_concurrency, 4);
        assert_eq!(config.fetcher.seasons, vec![2024, 2025]);
        assert_eq!(config.fetcher.retry.max_retries, 5);
        assert_eq!(config.fetcher.retry.initial_delay_secs, 1);
        assert_eq!(config.registry.algorithms, vec!["rf", "xgb"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HOTSHOT_DATA_DIR", "/tmp/hotshot"),
            ("HOTSHOT_LOG_FORMAT", "json"),
            ("HOTSHOT_SEASONS", "2023, 2024"),
            ("HOTSHOT_WINDOW", "10"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/hotshot"));
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.fetcher.seasons, vec![2023, 2024]);
        assert_eq!(config.features.window, 10);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = ServiceConfig::default();
        let result = config.apply_env(|key| (key == "HOTSHOT_WINDOW").then(|| "five".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_catches_bad_sections() {
        let mut config = ServiceConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.features.window = 0;
        assert!(config.validate().is_err());
    }
}
