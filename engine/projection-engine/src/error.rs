//! Error types for model loading and projection

use stat_store::BaseStat;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading models or projecting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("{algorithm} failed to predict {statistic}: {reason}")]
    Prediction { algorithm: String, statistic: BaseStat, reason: String },

    #[error("No feature history for {0}")]
    EntityNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProjectionError {
    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelLoad { path: path.into(), reason: reason.into() }
    }

    pub fn prediction(algorithm: &str, statistic: BaseStat, reason: impl Into<String>) -> Self {
        Self::Prediction { algorithm: algorithm.to_string(), statistic, reason: reason.into() }
    }
}

/// Result type alias for projection
pub type Result<T> = std::result::Result<T, ProjectionError>;
