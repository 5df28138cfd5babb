//! Trained model artifacts
//!
//! An artifact is a JSON file named `{algorithm}_{statistic}.json` holding the
//! ordered feature schema the model was trained on and the model itself,
//! either a linear model or a tree ensemble.

use crate::error::{ProjectionError, Result};
use serde::{Deserialize, Serialize};
use stat_store::BaseStat;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Anything that maps an aligned feature vector to a prediction
pub trait Predictor: Send + Sync + fmt::Debug {
    fn predict(&self, features: &[f64]) -> std::result::Result<f64, String>;
}

/// `intercept + sum(coefficients[i] * x[i])`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Predictor for LinearModel {
    fn predict(&self, features: &[f64]) -> std::result::Result<f64, String> {
        if features.len() != self.coefficients.len() {
            return Err(format!(
                "expected {} features, got {}",
                self.coefficients.len(),
                features.len()
            ));
        }
        let dot: f64 = self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum();
        Ok(self.intercept + dot)
    }
}

/// How tree outputs are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Averaged, as in a random forest
    #[default]
    Mean,
    /// Summed, as in gradient boosting
    Sum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { leaf: f64 },
}

/// A binary decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk from the root. Values below the threshold go left.
    fn evaluate(&self, features: &[f64]) -> std::result::Result<f64, String> {
        let mut index = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { leaf }) => return Ok(*leaf),
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    let value = features
                        .get(*feature)
                        .ok_or_else(|| format!("feature index {feature} out of range"))?;
                    index = if *value < *threshold { *left } else { *right };
                }
                None => return Err(format!("node index {index} out of range")),
            }
        }
        Err("tree does not terminate".to_string())
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { leaf } if !leaf.is_finite() => {
                    return Err(format!("node {i} has a non-finite leaf"));
                }
                TreeNode::Split { feature, threshold, left, right } => {
                    if *feature >= n_features {
                        return Err(format!("node {i} references feature {feature} of {n_features}"));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("node {i} references a node out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl Predictor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> std::result::Result<f64, String> {
        if self.trees.is_empty() {
            return Err("ensemble has no trees".to_string());
        }
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(features)?;
        }
        let combined = match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum => total,
        };
        Ok(self.base_score + combined)
    }
}

/// Serialized model body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl ModelSpec {
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        match self {
            ModelSpec::Linear(model) => {
                if model.coefficients.len() != n_features {
                    return Err(format!(
                        "{} coefficients for {} features",
                        model.coefficients.len(),
                        n_features
                    ));
                }
                if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("non-finite coefficient".to_string());
                }
                Ok(())
            }
            ModelSpec::TreeEnsemble(ensemble) => {
                if ensemble.trees.is_empty() {
                    return Err("ensemble has no trees".to_string());
                }
                if !ensemble.base_score.is_finite() {
                    return Err("non-finite base score".to_string());
                }
                ensemble.trees.iter().try_for_each(|tree| tree.validate(n_features))
            }
        }
    }

    fn into_predictor(self) -> Arc<dyn Predictor> {
        match self {
            ModelSpec::Linear(model) => Arc::new(model),
            ModelSpec::TreeEnsemble(ensemble) => Arc::new(ensemble),
        }
    }
}

/// On-disk artifact layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub statistic: String,
    pub algorithm: String,
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

/// A loaded model for one (algorithm, statistic) pair
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    statistic: BaseStat,
    algorithm: String,
    feature_names: Vec<String>,
    predictor: Arc<dyn Predictor>,
}

impl ModelArtifact {
    pub fn new(
        statistic: BaseStat,
        algorithm: impl Into<String>,
        feature_names: Vec<String>,
        predictor: Arc<dyn Predictor>,
    ) -> Self {
        Self { statistic, algorithm: algorithm.into(), feature_names, predictor }
    }

    /// Load and validate an artifact that must belong to `algorithm` and `statistic`
    pub fn load(path: &Path, algorithm: &str, statistic: BaseStat) -> Result<Self> {
        let fail = |reason: String| ProjectionError::model_load(path, reason);

        let text = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let file: ArtifactFile = serde_json::from_str(&text).map_err(|e| fail(e.to_string()))?;

        if file.statistic != statistic.name() {
            return Err(fail(format!("statistic {:?} does not match {}", file.statistic, statistic)));
        }
        if file.algorithm != algorithm {
            return Err(fail(format!("algorithm {:?} does not match {}", file.algorithm, algorithm)));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = file.feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(fail(format!("feature {dup} listed twice")));
        }

        file.model.validate(file.feature_names.len()).map_err(fail)?;

        Ok(Self::new(statistic, algorithm, file.feature_names, file.model.into_predictor()))
    }

    pub fn statistic(&self) -> BaseStat {
        self.statistic
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Feature schema the model expects, in input order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Predict from an input already aligned to [`Self::feature_names`].
    /// A non-finite output is a failure.
    pub fn predict(&self, aligned: &[f64]) -> Result<f64> {
        let value = self
            .predictor
            .predict(aligned)
            .map_err(|reason| ProjectionError::prediction(&self.algorithm, self.statistic, reason))?;

        if !value.is_finite() {
            return Err(ProjectionError::prediction(
                &self.algorithm,
                self.statistic,
                format!("non-finite prediction {value}"),
            ));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn forest() -> serde_json::Value {
        json!({
            "statistic": "points", "algorithm": "rf",
            "feature_names": ["points_rolling5", "minutes"],
            "model": {"kind": "tree_ensemble", "aggregation": "mean", "trees": [
                {"nodes": [{"feature": 0, "threshold": 20.0, "left": 1, "right": 2}, {"leaf": 15.0}, {"leaf": 25.0}]},
                {"nodes": [{"feature": 1, "threshold": 30.0, "left": 1, "right": 2}, {"leaf": 10.0}, {"leaf": 30.0}]}
            ]}
        })
    }

    #[test]
    fn test_linear_prediction() {
        let model = LinearModel { intercept: 1.0, coefficients: vec![0.5, 2.0] };
        assert_eq!(model.predict(&[10.0, 3.0]).unwrap(), 12.0);
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_tree_ensemble_mean_and_sum() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "rf_points.json", forest());
        let artifact = ModelArtifact::load(&path, "rf", BaseStat::Points).unwrap();

        // 24 >= 20 goes right (25); 28 < 30 goes left (10)
        assert_eq!(artifact.predict(&[24.0, 28.0]).unwrap(), 17.5);
        assert_eq!(artifact.feature_names(), &["points_rolling5", "minutes"]);

        let boosted = TreeEnsemble {
            aggregation: Aggregation::Sum,
            base_score: 1.0,
            trees: vec![Tree { nodes: vec![TreeNode::Leaf { leaf: 2.0 }] }; 3],
        };
        assert_eq!(boosted.predict(&[]).unwrap(), 7.0);
    }

    #[test]
    fn test_mismatched_name_is_load_failure() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "xgb_points.json", forest());
        let err = ModelArtifact::load(&path, "xgb", BaseStat::Points).unwrap_err();
        assert!(matches!(err, ProjectionError::ModelLoad { .. }));
    }

    #[test]
    fn test_malformed_artifacts_fail_to_load() {
        let dir = TempDir::new().unwrap();

        let coefficients = write(&dir, "rf_points.json", json!({
            "statistic": "points", "algorithm": "rf", "feature_names": ["a", "b"],
            "model": {"kind": "linear", "intercept": 0.0, "coefficients": [1.0]}
        }));
        assert!(ModelArtifact::load(&coefficients, "rf", BaseStat::Points).is_err());

        let bad_node = write(&dir, "rf_rebounds.json", json!({
            "statistic": "rebounds", "algorithm": "rf", "feature_names": ["a"],
            "model": {"kind": "tree_ensemble", "trees": [
                {"nodes": [{"feature": 0, "threshold": 1.0, "left": 1, "right": 9}, {"leaf": 1.0}]}
            ]}
        }));
        assert!(ModelArtifact::load(&bad_node, "rf", BaseStat::Rebounds).is_err());

        let bad_feature = write(&dir, "rf_assists.json", json!({
            "statistic": "assists", "algorithm": "rf", "feature_names": ["a"],
            "model": {"kind": "tree_ensemble", "trees": [
                {"nodes": [{"feature": 3, "threshold": 1.0, "left": 1, "right": 1}, {"leaf": 1.0}]}
            ]}
        }));
        assert!(ModelArtifact::load(&bad_feature, "rf", BaseStat::Assists).is_err());

        let garbage = dir.path().join("rf_steals.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(ModelArtifact::load(&garbage, "rf", BaseStat::Steals).is_err());

        let missing = dir.path().join("rf_blocks.json");
        assert!(ModelArtifact::load(&missing, "rf", BaseStat::Blocks).is_err());
    }

    #[test]
    fn test_cyclic_tree_does_not_hang() {
        let tree = Tree {
            nodes: vec![
                TreeNode::Split { feature: 0, threshold: 1.0, left: 1, right: 1 },
                TreeNode::Split { feature: 0, threshold: 1.0, left: 0, right: 0 },
            ],
        };
        assert!(tree.evaluate(&[0.0]).is_err());
    }

    #[test]
    fn test_non_finite_prediction_is_failure() {
        let model = LinearModel { intercept: 0.0, coefficients: vec![f64::MAX] };
        let artifact =
            ModelArtifact::new(BaseStat::Points, "rf", vec!["points".to_string()], Arc::new(model));
        let err = artifact.predict(&[10.0]).unwrap_err();
        assert!(matches!(err, ProjectionError::Prediction { .. }));
    }
}
