//! Projection engine
//!
//! Loads per-statistic model artifacts into a [`ModelRegistry`] and serves
//! ensemble projections for a player's most recent feature row through the
//! [`EnsemblePredictor`].

pub mod artifact;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod registry;
pub mod schema;

pub use artifact::{
    Aggregation, ArtifactFile, LinearModel, ModelArtifact, ModelSpec, Predictor, Tree, TreeEnsemble,
    TreeNode,
};
pub use config::RegistryConfig;
pub use ensemble::{
    project_row, AlgorithmOutcome, ComboProjection, EnsemblePredictor, PredictionResult,
    StatProjection,
};
pub use error::{ProjectionError, Result};
pub use registry::{LoadFailure, ModelRegistry, RegistryHandle};
pub use schema::{align_features, AlignedInput};
