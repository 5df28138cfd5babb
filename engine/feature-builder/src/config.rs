//! Configuration for the feature builder

use serde::{Deserialize, Serialize};
use stat_store::BaseStat;

/// Default trailing window size
pub const DEFAULT_WINDOW: usize = 5;

/// Configuration for feature derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Trailing window size, counted in games and inclusive of the current one
    pub window: usize,

    /// Stats that get rolling and season-average columns
    pub tracked_stats: Vec<BaseStat>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { window: DEFAULT_WINDOW, tracked_stats: BaseStat::ALL.to_vec() }
    }
}

impl FeatureConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window == 0 {
            return Err("window must be at least 1".to_string());
        }

        for (i, stat) in self.tracked_stats.iter().enumerate() {
            if self.tracked_stats[..i].contains(stat) {
                return Err(format!("stat {stat} is tracked twice"));
            }
        }

        Ok(())
    }
}
