//! Model registry
//!
//! The registry holds every artifact that loaded successfully, grouped by
//! statistic. Artifacts load independently: a missing or broken file only
//! removes that one (algorithm, statistic) pair. Reloads build a complete new
//! registry and replace the old one in a single swap, so readers always see
//! either the old set or the new set.

use crate::artifact::ModelArtifact;
use crate::config::RegistryConfig;
use crate::error::{ProjectionError, Result};
use parking_lot::RwLock;
use stat_store::BaseStat;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An artifact that could not be loaded
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub algorithm: String,
    pub statistic: BaseStat,
    pub path: PathBuf,
    pub reason: String,
}

/// Immutable set of loaded models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<BaseStat, Vec<ModelArtifact>>,
    failures: Vec<LoadFailure>,
}

impl ModelRegistry {
    /// Registry with no models
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every configured (algorithm, statistic) artifact
    pub fn load(config: &RegistryConfig) -> Self {
        let mut registry = Self::default();

        for statistic in &config.statistics {
            for algorithm in &config.algorithms {
                let path = config.artifact_path(algorithm, *statistic);
                match ModelArtifact::load(&path, algorithm, *statistic) {
                    Ok(artifact) => {
                        debug!("Loaded {} for {} from {:?}", algorithm, statistic, path);
                        registry.insert(artifact);
                    }
                    Err(e) => {
                        warn!("Model {} for {} unavailable: {}", algorithm, statistic, e);
                        let reason = match e {
                            ProjectionError::ModelLoad { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        registry.failures.push(LoadFailure {
                            algorithm: algorithm.clone(),
                            statistic: *statistic,
                            path,
                            reason,
                        });
                    }
                }
            }
        }

        info!(
            "Model registry loaded {} artifacts for {} statistics ({} unavailable)",
            registry.artifact_count(),
            registry.models.len(),
            registry.failures.len()
        );
        registry
    }

    /// Build a registry from already constructed artifacts
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = ModelArtifact>) -> Self {
        let mut registry = Self::default();
        for artifact in artifacts {
            registry.insert(artifact);
        }
        registry
    }

    fn insert(&mut self, artifact: ModelArtifact) {
        self.models.entry(artifact.statistic()).or_default().push(artifact);
    }

    /// Artifacts available for a statistic (possibly none)
    pub fn artifacts_for(&self, statistic: BaseStat) -> &[ModelArtifact] {
        self.models.get(&statistic).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of the algorithms available for a statistic
    pub fn algorithms_for(&self, statistic: BaseStat) -> Vec<&str> {
        self.artifacts_for(statistic).iter().map(ModelArtifact::algorithm).collect()
    }

    /// Statistics with at least one available algorithm
    pub fn statistics(&self) -> Vec<BaseStat> {
        self.models.keys().copied().collect()
    }

    pub fn artifact_count(&self) -> usize {
        self.models.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }
}

/// Shared handle to the current registry
pub struct RegistryHandle {
    config: RegistryConfig,
    current: RwLock<Arc<ModelRegistry>>,
}

impl RegistryHandle {
    /// Load the registry described by the configuration
    pub fn load(config: RegistryConfig) -> Result<Self> {
        config.validate().map_err(ProjectionError::Config)?;
        let registry = ModelRegistry::load(&config);
        Ok(Self { config, current: RwLock::new(Arc::new(registry)) })
    }

    /// Wrap a prebuilt registry
    pub fn with_registry(config: RegistryConfig, registry: ModelRegistry) -> Self {
        Self { config, current: RwLock::new(Arc::new(registry)) }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current registry. Holding the snapshot keeps it alive across a reload.
    pub fn snapshot(&self) -> Arc<ModelRegistry> {
        Arc::clone(&self.current.read())
    }

    /// Reload from disk and swap the new registry in
    pub fn reload(&self) -> Arc<ModelRegistry> {
        let fresh = Arc::new(ModelRegistry::load(&self.config));
        self.swap(Arc::clone(&fresh));
        fresh
    }

    /// Replace the current registry
    pub fn swap(&self, registry: Arc<ModelRegistry>) {
        *self.current.write() = registry;
    }
}
