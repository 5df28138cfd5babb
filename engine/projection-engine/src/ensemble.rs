//! Ensemble projections
//!
//! For each statistic, every available algorithm predicts from the player's
//! latest feature row (aligned to that algorithm's schema) and the results
//! are averaged with equal weight. Failures are contained at the smallest
//! granularity: an algorithm that fails contributes nothing, a statistic with
//! no successful algorithm is unavailable, and a combination with an
//! unavailable component is flagged as degraded.

use crate::error::{ProjectionError, Result};
use crate::registry::{ModelRegistry, RegistryHandle};
use crate::schema::align_features;
use serde::Serialize;
use stat_store::{BaseStat, FeatureRow, FeatureStore, NaiveDate, PlayerId, COMBINATIONS};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one algorithm produced for one statistic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmOutcome {
    pub algorithm: String,
    /// The prediction, or why there is none
    pub result: std::result::Result<f64, String>,
}

/// Ensemble projection for one statistic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatProjection {
    pub statistic: BaseStat,
    /// Mean of the successful algorithms; `None` when no algorithm produced a value
    pub value: Option<f64>,
    pub outcomes: Vec<AlgorithmOutcome>,
}

impl StatProjection {
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

/// Combination of projected base stats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboProjection {
    pub name: &'static str,
    pub value: f64,
    /// Set when a component was unavailable and counted as zero
    pub degraded: bool,
    pub missing: Vec<BaseStat>,
}

/// Full projection for one player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub player_id: PlayerId,
    pub player_name: String,
    /// Date of the feature row the projection was made from
    pub as_of: NaiveDate,
    pub stats: BTreeMap<BaseStat, StatProjection>,
    pub combos: Vec<ComboProjection>,
}

impl PredictionResult {
    /// Projected value of a statistic, if available
    pub fn value(&self, statistic: BaseStat) -> Option<f64> {
        self.stats.get(&statistic).and_then(|p| p.value)
    }

    pub fn combo(&self, name: &str) -> Option<&ComboProjection> {
        self.combos.iter().find(|c| c.name == name)
    }
}

/// Project every statistic from one feature row
pub fn project_row(row: &FeatureRow, registry: &ModelRegistry) -> PredictionResult {
    let mut stats = BTreeMap::new();

    for statistic in BaseStat::ALL {
        let mut outcomes = Vec::new();

        for artifact in registry.artifacts_for(statistic) {
            let aligned = align_features(row, artifact.feature_names());
            if !aligned.missing.is_empty() {
                warn!(
                    "{} for {} expects features missing from the row, filled with 0: {:?}",
                    artifact.algorithm(),
                    statistic,
                    aligned.missing
                );
            }

            let result = artifact.predict(&aligned.values).map_err(|e| {
                warn!("Player {}: {}", row.player_id, e);
                match e {
                    ProjectionError::Prediction { reason, .. } => reason,
                    other => other.to_string(),
                }
            });
            outcomes.push(AlgorithmOutcome { algorithm: artifact.algorithm().to_string(), result });
        }

        let values: Vec<f64> = outcomes.iter().filter_map(|o| o.result.as_ref().ok().copied()).collect();
        let value = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
        debug!("Player {} {}: {:?} from {} of {} algorithms", row.player_id, statistic, value, values.len(), outcomes.len());

        stats.insert(statistic, StatProjection { statistic, value, outcomes });
    }

    let combos = COMBINATIONS
        .iter()
        .map(|combination| {
            let mut value = 0.0;
            let mut missing = Vec::new();
            for component in combination.components {
                match stats.get(component).and_then(|p: &StatProjection| p.value) {
                    Some(v) => value += v,
                    None => missing.push(*component),
                }
            }
            ComboProjection { name: combination.name, value, degraded: !missing.is_empty(), missing }
        })
        .collect();

    PredictionResult {
        player_id: row.player_id,
        player_name: row.player_name.clone(),
        as_of: row.game_date,
        stats,
        combos,
    }
}

/// Serves projections from the current feature table and model registry.
///
/// Read-only; each call works from one snapshot of each, so concurrent
/// callers and reloads never observe a half-updated state.
pub struct EnsemblePredictor {
    features: Arc<FeatureStore>,
    registry: Arc<RegistryHandle>,
}

impl EnsemblePredictor {
    pub fn new(features: Arc<FeatureStore>, registry: Arc<RegistryHandle>) -> Self {
        Self { features, registry }
    }

    /// Project a player from their most recent feature row
    pub fn predict(&self, player_id: PlayerId) -> Result<PredictionResult> {
        let table = self.features.snapshot();
        let row = table
            .latest_for(player_id)
            .ok_or_else(|| ProjectionError::EntityNotFound(format!("player {player_id}")))?;

        Ok(project_row(row, &self.registry.snapshot()))
    }

    /// Project a player looked up by name (case-insensitive)
    pub fn predict_by_name(&self, name: &str) -> Result<PredictionResult> {
        let player_id = self
            .features
            .snapshot()
            .find_player(name)
            .ok_or_else(|| ProjectionError::EntityNotFound(name.to_string()))?;
        self.predict(player_id)
    }
}
