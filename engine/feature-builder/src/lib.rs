//! Feature derivation for the projection pipeline
//!
//! Turns the raw game-log table into the feature table the models consume:
//! trailing-window means and variances, rest days, season-to-date averages
//! and combination sums. Builds are deterministic; the same raw table always
//! produces the same feature table.
//!
//! ```rust
//! use feature_builder::{FeatureBuilder, FeatureConfig};
//! use stat_store::RawTable;
//!
//! let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
//! let output = builder.build(&RawTable::new());
//! assert!(output.table.is_empty());
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod rolling;

pub use builder::{
    rolling_mean_column, rolling_var_column, season_avg_column, BuildOutput, FeatureBuilder,
    SkippedPlayer, REST_DAYS_COLUMN,
};
pub use config::{FeatureConfig, DEFAULT_WINDOW};
pub use error::{FeatureError, Result};
