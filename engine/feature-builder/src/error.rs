//! Error types for feature derivation

use stat_store::{BaseStat, NaiveDate, PlayerId};
use thiserror::Error;

/// Errors that can occur while deriving features
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Player {player_id} has a non-finite {stat} value on {game_date}")]
    NonFiniteValue { player_id: PlayerId, game_date: NaiveDate, stat: BaseStat },

    #[error("Player {player_id} history is out of order at {game_date}")]
    OutOfOrder { player_id: PlayerId, game_date: NaiveDate },
}

/// Result type alias for feature derivation
pub type Result<T> = std::result::Result<T, FeatureError>;
