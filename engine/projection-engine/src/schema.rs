//! Aligning feature rows to a model's expected schema

use stat_store::FeatureRow;
use std::collections::HashSet;

/// A feature row reshaped to one model's input order
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedInput {
    /// Values in schema order
    pub values: Vec<f64>,
    /// Schema features the row did not have (filled with 0)
    pub missing: Vec<String>,
    /// Row features the schema does not use
    pub dropped: usize,
}

/// Align a row to `schema`: features the schema expects but the row lacks
/// become 0, features the schema does not name are dropped.
pub fn align_features(row: &FeatureRow, schema: &[String]) -> AlignedInput {
    let mut missing = Vec::new();
    let values = schema
        .iter()
        .map(|name| match row.get(name) {
            Some(value) => value,
            None => {
                missing.push(name.clone());
                0.0
            }
        })
        .collect();

    let expected: HashSet<&str> = schema.iter().map(String::as_str).collect();
    let dropped = row.features.keys().filter(|name| !expected.contains(name.as_str())).count();

    AlignedInput { values, missing, dropped }
}
