use serde::{Deserialize, Serialize};
use stat_store::BaseStat;
use std::path::{Path, PathBuf};

/// Configuration for the model registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding `{algorithm}_{statistic}.json` artifacts
    pub models_dir: PathBuf,

    /// Statistics to load models for
    pub statistics: Vec<BaseStat>,

    /// Algorithm families, in the order their results are reported
    pub algorithms: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            statistics: BaseStat::ALL.to_vec(),
            algorithms: vec!["rf".to_string(), "xgb".to_string(), "lgbm".to_string()],
        }
    }
}

impl RegistryConfig {
    pub fn new(models_dir: impl AsRef<Path>) -> Self {
        Self { models_dir: models_dir.as_ref().to_path_buf(), ..Default::default() }
    }

    /// Artifact file for one algorithm and statistic
    pub fn artifact_path(&self, algorithm: &str, statistic: BaseStat) -> PathBuf {
        self.models_dir.join(format!("{}_{}.json", algorithm, statistic.name()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.algorithms.is_empty() {
            return Err("at least one algorithm is required".to_string());
        }

        for (i, algorithm) in self.algorithms.iter().enumerate() {
            if algorithm.trim().is_empty() {
                return Err("algorithm names cannot be empty".to_string());
            }
            if self.algorithms[..i].contains(algorithm) {
                return Err(format!("algorithm {algorithm} listed twice"));
            }
        }

        for (i, stat) in self.statistics.iter().enumerate() {
            if self.statistics[..i].contains(stat) {
                return Err(format!("statistic {stat} listed twice"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithms, vec!["rf", "xgb", "lgbm"]);
        assert_eq!(
            config.artifact_path("xgb", BaseStat::ThreeptFg),
            PathBuf::from("./models/xgb_threept_fg.json")
        );
    }

    #[test]
    fn test_duplicate_algorithm_rejected() {
        let config = RegistryConfig {
            algorithms: vec!["rf".to_string(), "rf".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
