//! Feature derivation over the raw table
//!
//! Every feature at a player's event is a function of that event and the
//! player's earlier events only. Players are derived independently and in
//! parallel; results are collected in player order so the output is stable.

use crate::config::FeatureConfig;
use crate::error::{FeatureError, Result};
use crate::rolling::{mean, sample_variance, trailing_window};
use rayon::prelude::*;
use stat_store::{BaseStat, FeatureRow, FeatureTable, PlayerId, RawRecord, RawTable, COMBINATIONS};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Rest-day column name
pub const REST_DAYS_COLUMN: &str = "rest_days";

/// Rolling-mean column for a stat, e.g. `points_rolling5`
pub fn rolling_mean_column(stat: BaseStat, window: usize) -> String {
    format!("{}_rolling{}", stat.name(), window)
}

/// Rolling-variance column for a stat, e.g. `points_rolling5_var`
pub fn rolling_var_column(stat: BaseStat, window: usize) -> String {
    format!("{}_rolling{}_var", stat.name(), window)
}

/// Season-average column for a stat, e.g. `points_season_avg`
pub fn season_avg_column(stat: BaseStat) -> String {
    format!("{}_season_avg", stat.name())
}

/// A player whose history could not be turned into features
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPlayer {
    pub player_id: PlayerId,
    pub error: FeatureError,
}

/// Result of one build
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub table: FeatureTable,
    pub skipped: Vec<SkippedPlayer>,
}

/// Derives the feature table from raw game logs
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    /// Create a builder, rejecting invalid configuration
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate().map_err(FeatureError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Numeric columns of the produced table, in output order
    pub fn columns(&self) -> Vec<String> {
        let window = self.config.window;
        let mut columns: Vec<String> = BaseStat::ALL.iter().map(|s| s.name().to_string()).collect();

        for stat in &self.config.tracked_stats {
            columns.push(rolling_mean_column(*stat, window));
            columns.push(rolling_var_column(*stat, window));
        }
        columns.push(REST_DAYS_COLUMN.to_string());
        for stat in &self.config.tracked_stats {
            columns.push(season_avg_column(*stat));
        }
        columns.extend(COMBINATIONS.iter().map(|c| c.name.to_string()));

        columns
    }

    /// Derive features for every player in the raw table.
    ///
    /// A player whose history is unusable is logged and left out; the
    /// remaining players are unaffected.
    pub fn build(&self, raw: &RawTable) -> BuildOutput {
        let player_ids = raw.player_ids();
        info!("Building features for {} players (window {})", player_ids.len(), self.config.window);

        let results: Vec<(PlayerId, Result<Vec<FeatureRow>>)> = player_ids
            .par_iter()
            .map(|player_id| {
                let history: Vec<&RawRecord> = raw.history(*player_id).collect();
                (*player_id, self.build_player(&history))
            })
            .collect();

        let mut rows = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();
        for (player_id, result) in results {
            match result {
                Ok(player_rows) => {
                    debug!("Player {} produced {} feature rows", player_id, player_rows.len());
                    rows.extend(player_rows);
                }
                Err(error) => {
                    warn!("Skipping player {}: {}", player_id, error);
                    skipped.push(SkippedPlayer { player_id, error });
                }
            }
        }

        let table = FeatureTable::new(self.columns(), rows);
        info!("Built {} feature rows, skipped {} players", table.len(), skipped.len());
        BuildOutput { table, skipped }
    }

    /// Derive one player's rows from their chronologically ordered history
    pub fn build_player(&self, history: &[&RawRecord]) -> Result<Vec<FeatureRow>> {
        for pair in history.windows(2) {
            if pair[1].game_date <= pair[0].game_date {
                return Err(FeatureError::OutOfOrder {
                    player_id: pair[1].player_id,
                    game_date: pair[1].game_date,
                });
            }
        }
        for record in history {
            for stat in BaseStat::ALL {
                if !record.stats.get(stat).is_finite() {
                    return Err(FeatureError::NonFiniteValue {
                        player_id: record.player_id,
                        game_date: record.game_date,
                        stat,
                    });
                }
            }
        }

        let window = self.config.window;
        let series: Vec<(BaseStat, Vec<f64>)> = self
            .config
            .tracked_stats
            .iter()
            .map(|stat| (*stat, history.iter().map(|r| r.stats.get(*stat)).collect()))
            .collect();

        // season -> (per tracked stat running sum, games so far)
        let mut seasons: BTreeMap<i32, (Vec<f64>, usize)> = BTreeMap::new();
        let mut rows = Vec::with_capacity(history.len());

        for (index, record) in history.iter().enumerate() {
            let mut features = BTreeMap::new();

            for stat in BaseStat::ALL {
                features.insert(stat.name().to_string(), record.stats.get(stat));
            }

            for (stat, values) in &series {
                let trailing = trailing_window(values, index, window);
                features.insert(rolling_mean_column(*stat, window), mean(trailing));
                features.insert(rolling_var_column(*stat, window), sample_variance(trailing));
            }

            let rest_days = match index {
                0 => 0,
                _ => (record.game_date - history[index - 1].game_date).num_days(),
            };
            features.insert(REST_DAYS_COLUMN.to_string(), rest_days as f64);

            let (sums, games) = seasons
                .entry(record.season)
                .or_insert_with(|| (vec![0.0; series.len()], 0));
            *games += 1;
            for ((stat, values), sum) in series.iter().zip(sums.iter_mut()) {
                *sum += values[index];
                features.insert(season_avg_column(*stat), *sum / *games as f64);
            }

            for combination in &COMBINATIONS {
                features.insert(combination.name.to_string(), combination.sum(&record.stats));
            }

            rows.push(FeatureRow {
                player_id: record.player_id,
                player_name: record.player_name.clone(),
                game_date: record.game_date,
                season: record.season,
                features,
            });
        }

        Ok(rows)
    }
}
