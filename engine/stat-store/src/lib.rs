//! # Stat Store
//!
//! Storage for the Hot Shot Props projection pipeline.
//!
//! ## Architecture
//!
//! - **RawStore**: durable, append-only table of per-game records keyed by
//!   (player, game date). Duplicates are discarded on merge, never overwritten.
//! - **FeatureStore**: derived table regenerated wholesale by the feature
//!   builder and swapped in atomically.
//!
//! Both stores hand out `Arc` snapshots so batch jobs and request handlers read
//! a consistent table while ingestion keeps merging.
//!
//! ## Usage
//!
//! ```rust
//! use stat_store::{RawStore, StoreConfig};
//! use tempfile::TempDir;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let store = RawStore::open(&StoreConfig::new(temp_dir.path()))?;
//!     assert!(store.snapshot().is_empty());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod features;
mod io;
pub mod raw;
pub mod types;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use features::{FeatureStore, FeatureTable};
pub use io::{format_value, DATE_FORMAT};
pub use raw::{MergeSummary, RawStore, RawTable};
pub use types::{
    season_for_date, BaseStat, Combination, FeatureRow, PlayerId, RawRecord, RecordKey, StatLine,
    COMBINATIONS,
};

pub use chrono::NaiveDate;
