use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the game-log fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Base URL of the stats API
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Page size requested from the source
    pub per_page: u32,

    /// Players fetched concurrently
    pub max_concurrency: usize,

    /// Timeout applied to every request
    pub request_timeout_secs: u64,

    /// Pause between consecutive pages of one player
    pub page_delay_ms: u64,

    /// Pause after a rate-limit response that carries no hint
    pub default_rate_limit_secs: u64,

    /// Longest pause honoured from a rate-limit hint
    pub max_rate_limit_secs: u64,

    /// Rate-limit pauses tolerated for a single request before giving up
    pub max_rate_limit_waits: u32,

    /// Pages followed for one listing before the source is treated as broken
    pub max_pages: u32,

    /// Skip players without a current team
    pub active_only: bool,

    /// Restrict game logs to these seasons (empty means all)
    pub seasons: Vec<i32>,

    /// Retry configuration for transient failures
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,

    /// Initial retry delay in seconds
    pub initial_delay_secs: u64,

    /// Maximum retry delay in seconds
    pub max_delay_secs: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay_secs: 1, max_delay_secs: 30, backoff_multiplier: 2.0 }
    }
}

impl RetryConfig {
    /// Delay that follows `delay` under exponential backoff
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let next = (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay_secs as f64);
        Duration::from_secs_f64(next.max(0.0))
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.balldontlie.io/v1".to_string(),
            api_key_env: "BALLDONTLIE_API_KEY".to_string(),
            per_page: 100,
            max_concurrency: 2,
            request_timeout_secs: 15,
            page_delay_ms: 500,
            default_rate_limit_secs: 60,
            max_rate_limit_secs: 300,
            max_rate_limit_waits: 5,
            max_pages: 1000,
            active_only: true,
            seasons: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl FetcherConfig {
    /// Get the API key from the environment
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| FetchError::config(format!("API key not found in ${}", self.api_key_env)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn default_rate_limit(&self) -> Duration {
        Duration::from_secs(self.default_rate_limit_secs)
    }

    /// Pause to observe after a rate-limit response
    pub fn rate_limit_pause(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| self.default_rate_limit())
            .min(Duration::from_secs(self.max_rate_limit_secs))
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("base_url cannot be empty".to_string());
        }

        if self.per_page == 0 || self.per_page > 100 {
            return Err("per_page must be between 1 and 100".to_string());
        }

        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }

        if self.max_rate_limit_secs == 0 {
            return Err("max_rate_limit_secs must be greater than 0".to_string());
        }

        if self.max_pages == 0 {
            return Err("max_pages must be at least 1".to_string());
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }

        if self.retry.max_delay_secs < self.retry.initial_delay_secs {
            return Err("max_delay_secs must not be below initial_delay_secs".to_string());
        }

        Ok(())
    }
}
