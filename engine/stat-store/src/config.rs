//! Configuration for the stat store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the raw and feature stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base directory for store files
    pub data_dir: PathBuf,

    /// File name of the raw game-log table
    pub raw_file: String,

    /// File name of the derived feature table
    pub features_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            raw_file: "raw_logs.csv".to_string(),
            features_file: "model_dataset.csv".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Get the raw table path
    pub fn raw_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw_file)
    }

    /// Get the feature table path
    pub fn features_path(&self) -> PathBuf {
        self.data_dir.join(&self.features_file)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.raw_file.trim().is_empty() {
            return Err("raw_file must not be empty".to_string());
        }

        if self.features_file.trim().is_empty() {
            return Err("features_file must not be empty".to_string());
        }

        if self.raw_file == self.features_file {
            return Err("raw_file and features_file must differ".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_join_data_dir() {
        let config = StoreConfig::new("/tmp/hotshot");
        assert_eq!(config.raw_path(), PathBuf::from("/tmp/hotshot/raw_logs.csv"));
        assert_eq!(config.features_path(), PathBuf::from("/tmp/hotshot/model_dataset.csv"));
    }

    #[test]
    fn test_validate_rejects_shared_file() {
        let config = StoreConfig {
            features_file: "raw_logs.csv".to_string(),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(StoreConfig::default().validate().is_ok());
    }
}
