//! The ingest, feature and model refresh cycle

use anyhow::{Context, Result};
use feature_builder::{FeatureBuilder, SkippedPlayer};
use projection_engine::{EnsemblePredictor, ModelRegistry, PredictionResult, RegistryHandle};
use stat_fetcher::{FetchReport, Fetcher, GameLogSource, QuotaGate};
use stat_store::{FeatureRow, FeatureStore, PlayerId, RawStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServiceConfig;

/// Outcome of a feature rebuild
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub rows: usize,
    pub players: usize,
    pub skipped: Vec<SkippedPlayer>,
}

/// Outcome of one full refresh cycle
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub fetch: FetchReport,
    pub build: BuildSummary,
    pub models_loaded: usize,
}

/// Whether an error means the stores are unusable and the run must stop
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<StoreError>().is_some())
}

/// Owns the stores, the feature builder and the model registry
pub struct Pipeline {
    config: ServiceConfig,
    raw: Arc<RawStore>,
    features: Arc<FeatureStore>,
    builder: FeatureBuilder,
    registry: Arc<RegistryHandle>,
    gate: QuotaGate,
}

impl Pipeline {
    /// Open the stores and load the models. A corrupt raw store is fatal.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        let raw = RawStore::open(&config.store).context("Failed to open raw store")?;
        let features = FeatureStore::open(&config.store).context("Failed to open feature store")?;
        let builder = FeatureBuilder::new(config.features.clone())
            .context("Invalid feature configuration")?;
        let registry =
            RegistryHandle::load(config.registry.clone()).context("Failed to load model registry")?;

        let pipeline = Self {
            config,
            raw: Arc::new(raw),
            features: Arc::new(features),
            builder,
            registry: Arc::new(registry),
            gate: QuotaGate::new(),
        };

        // The feature table is derived, so a missing or discarded one is rebuilt
        let raw_records = pipeline.raw.snapshot().len();
        if raw_records > 0 && pipeline.features.snapshot().is_empty() {
            info!("Feature table is empty, rebuilding from {} raw records", raw_records);
            pipeline.build_features()?;
        }

        Ok(pipeline)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn raw_store(&self) -> &Arc<RawStore> {
        &self.raw
    }

    pub fn feature_store(&self) -> &Arc<FeatureStore> {
        &self.features
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    /// Fetch new game logs from `source` into the raw store
    pub async fn ingest(&self, source: Arc<dyn GameLogSource>) -> Result<FetchReport> {
        let fetcher = Fetcher::new(self.config.fetcher.clone(), source, Arc::clone(&self.raw))
            .context("Failed to create fetcher")?
            .with_gate(self.gate.clone());

        fetcher.run().await.context("Ingestion failed")
    }

    /// Rebuild the feature table from a snapshot of the raw table
    pub fn build_features(&self) -> Result<BuildSummary> {
        let raw = self.raw.snapshot();
        let output = self.builder.build(&raw);

        let summary = BuildSummary {
            rows: output.table.len(),
            players: output.table.rows().iter().map(|row| row.player_id).collect::<BTreeSet<_>>().len(),
            skipped: output.skipped,
        };
        self.features.replace(output.table).context("Failed to persist feature table")?;

        Ok(summary)
    }

    /// Reload model artifacts and swap them in
    pub fn reload_models(&self) -> Arc<ModelRegistry> {
        self.registry.reload()
    }

    /// One full cycle: ingest, rebuild features, reload models
    pub async fn refresh(&self, source: Arc<dyn GameLogSource>) -> Result<RefreshReport> {
        info!("Starting refresh cycle");

        let fetch = self.ingest(source).await?;
        let build = self.build_features()?;
        let registry = self.reload_models();

        if !build.skipped.is_empty() {
            warn!("{} players skipped during feature build", build.skipped.len());
        }

        let report = RefreshReport { fetch, build, models_loaded: registry.artifact_count() };
        info!(
            "Refresh complete: {} new records, {} feature rows, {} models",
            report.fetch.merged.inserted, report.build.rows, report.models_loaded
        );
        Ok(report)
    }

    pub fn predictor(&self) -> EnsemblePredictor {
        EnsemblePredictor::new(Arc::clone(&self.features), Arc::clone(&self.registry))
    }

    /// Resolve a player given by numeric id or by name
    pub fn resolve_player(&self, query: &str) -> Option<PlayerId> {
        let table = self.features.snapshot();
        match query.trim().parse::<PlayerId>() {
            Ok(id) if table.latest_for(id).is_some() => Some(id),
            _ => table.find_player(query),
        }
    }

    /// Project a player given by numeric id or by name
    pub fn project(&self, query: &str) -> Result<PredictionResult> {
        let predictor = self.predictor();
        let result = match self.resolve_player(query) {
            Some(id) => predictor.predict(id),
            None => predictor.predict_by_name(query),
        };
        result.with_context(|| format!("No projection for {query:?}"))
    }

    /// Names of every player with features
    pub fn players(&self) -> Vec<String> {
        self.features.snapshot().player_names()
    }

    /// A player's most recent feature rows, oldest first
    pub fn recent_games(&self, query: &str, count: usize) -> Option<Vec<FeatureRow>> {
        let id = self.resolve_player(query)?;
        Some(self.features.snapshot().recent_for(id, count).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection_engine::ProjectionError;
    use serde_json::json;
    use stat_fetcher::{ApiGame, ApiPlayer, ApiStatLine, ApiTeam, MemorySource};
    use stat_store::BaseStat;
    use std::fs;
    use tempfile::TempDir;

    fn line(date: &str, pts: f64, reb: f64) -> ApiStatLine {
        ApiStatLine {
            pts: Some(pts),
            reb: Some(reb),
            ast: Some(5.0),
            fg3m: Some(2.0),
            stl: Some(1.0),
            blk: None,
            min: Some(json!("32:10")),
            game: ApiGame { date: date.to_string(), season: Some(2025) },
        }
    }

    fn source() -> Arc<MemorySource> {
        let player = ApiPlayer {
            id: 15,
            first_name: "Jalen".to_string(),
            last_name: "Brunson".to_string(),
            team: Some(ApiTeam { full_name: Some("New York Knicks".to_string()), abbreviation: None }),
        };
        Arc::new(MemorySource::new(2).with_player(
            player,
            vec![
                line("2025-10-22", 20.0, 4.0),
                line("2025-10-24", 30.0, 2.0),
                line("2025-10-27", 25.0, 6.0),
            ],
        ))
    }

    fn config(dir: &TempDir) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.store.data_dir = dir.path().join("data");
        config.registry.models_dir = dir.path().join("models");
        config.fetcher.page_delay_ms = 0;
        config
    }

    fn write_points_model(dir: &TempDir) {
        let models = dir.path().join("models");
        fs::create_dir_all(&models).unwrap();
        let body = json!({
            "statistic": "points", "algorithm": "rf",
            "feature_names": ["points_rolling5", "not_a_feature"],
            "model": {"kind": "linear", "intercept": 1.0, "coefficients": [1.0, 100.0]}
        });
        fs::write(models.join("rf_points.json"), body.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_refresh_then_project() {
        let dir = TempDir::new().unwrap();
        write_points_model(&dir);
        let pipeline = Pipeline::open(config(&dir)).unwrap();

        let report = pipeline.refresh(source()).await.unwrap();
        assert_eq!(report.fetch.merged.inserted, 3);
        assert_eq!(report.build.rows, 3);
        assert_eq!(report.models_loaded, 1);

        let result = pipeline.project("jalen brunson").unwrap();
        // Rolling mean of 20, 30, 25 plus the intercept; the unknown feature is 0
        assert_eq!(result.value(BaseStat::Points), Some(26.0));
        assert_eq!(result.value(BaseStat::Rebounds), None);
        assert!(result.combo("points_rebounds").unwrap().degraded);

        assert_eq!(pipeline.project("15").unwrap(), result);
        assert_eq!(pipeline.players(), vec!["Jalen Brunson"]);
        assert_eq!(pipeline.recent_games("Jalen Brunson", 2).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_refresh_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::open(config(&dir)).unwrap();

        pipeline.refresh(source()).await.unwrap();
        let features_path = dir.path().join("data").join("model_dataset.csv");
        let first = fs::read(&features_path).unwrap();

        let report = pipeline.refresh(source()).await.unwrap();
        assert_eq!(report.fetch.merged.inserted, 0);
        assert_eq!(fs::read(&features_path).unwrap(), first);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        Pipeline::open(config(&dir)).unwrap().refresh(source()).await.unwrap();

        let reopened = Pipeline::open(config(&dir)).unwrap();
        assert_eq!(reopened.raw_store().snapshot().len(), 3);
        assert_eq!(reopened.players(), vec!["Jalen Brunson"]);
    }

    #[tokio::test]
    async fn test_corrupt_feature_table_is_rebuilt_on_open() {
        let dir = TempDir::new().unwrap();
        Pipeline::open(config(&dir)).unwrap().refresh(source()).await.unwrap();

        let features_path = dir.path().join("data").join("model_dataset.csv");
        let built = fs::read(&features_path).unwrap();
        fs::write(&features_path, "garbage\nx\n").unwrap();

        let reopened = Pipeline::open(config(&dir)).unwrap();
        assert_eq!(reopened.players(), vec!["Jalen Brunson"]);
        assert_eq!(fs::read(&features_path).unwrap(), built);
    }

    #[test]
    fn test_unknown_player() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::open(config(&dir)).unwrap();

        let err = pipeline.project("Nobody").unwrap_err();
        assert!(err.chain().any(|c| matches!(
            c.downcast_ref::<ProjectionError>(),
            Some(ProjectionError::EntityNotFound(_))
        )));
        assert!(pipeline.recent_games("Nobody", 10).is_none());
    }

    #[test]
    fn test_corrupt_store_is_fatal() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(
            data.join("raw_logs.csv"),
            "game_date,player_id,player_name,season,points\nnot-a-date,1,A,2025,10\n",
        )
        .unwrap();

        let err = Pipeline::open(config(&dir)).err().unwrap();
        assert!(is_fatal(&err));
    }
}
