//! Game-log ingestion
//!
//! Pulls player game logs from a paginated stats API and merges them into the
//! raw store. Each run asks only for games newer than a player's last-seen
//! date, honours the source's rate limiting, and isolates failures to the
//! player being fetched.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod quota;
pub mod source;

pub use config::{FetcherConfig, RetryConfig};
pub use error::{FetchError, Result};
pub use fetcher::{FailedPlayer, FetchReport, Fetcher};
pub use models::{parse_minutes, ApiGame, ApiPlayer, ApiStatLine, ApiTeam, Page, PageMeta, PlayerRef};
pub use quota::{QuotaGate, API_BUCKET, MAX_BLOCK};
pub use source::{parse_retry_after, GameLogSource, HttpGameLogSource, StatsQuery};

#[cfg(any(test, feature = "testing"))]
pub use source::MemorySource;
