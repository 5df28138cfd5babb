//! Error types for game-log ingestion

use stat_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching from the remote source
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limited by source (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transient source error: {0}")]
    Transient(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Request rejected: {0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FetchError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the request may succeed if simply tried again after a delay
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Result type alias for ingestion
pub type Result<T> = std::result::Result<T, FetchError>;
