use ndarray::Array2;
use tracing::debug;

use crate::config::IdentityColumns;
use crate::error::{InferenceError, SchemaError, ScreeningError};
use crate::models::{Dataset, FeatureMatrix};

pub const QUESTION_COUNT: usize = 27;

/// Q1..Q27, in the order the classifier was fitted on.
pub fn question_columns() -> Vec<String> {
    (1..=QUESTION_COUNT).map(|i| format!("Q{i}")).collect()
}

/// Checks that every required column is present, by exact name.
pub fn validate(
    dataset: &Dataset,
    identity: &IdentityColumns,
    features: &[String],
) -> Result<(), SchemaError> {
    let error = SchemaError {
        missing_identity: missing_from(dataset, identity.names()),
        missing_features: missing_from(dataset, features.iter().map(String::as_str)),
    };

    if error.is_empty() {
        Ok(())
    } else {
        Err(error)
    }
}

fn missing_from<'a>(dataset: &Dataset, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !dataset.has_column(name))
        .map(str::to_string)
        .collect()
}

/// Selects the feature columns by name, in the given order. Every other
/// column (identity, legacy score columns, labels) is left behind.
pub fn extract_features(
    dataset: &Dataset,
    features: &[String],
) -> Result<FeatureMatrix, ScreeningError> {
    let mut indices = Vec::with_capacity(features.len());
    let mut absent = Vec::new();
    for name in features {
        match dataset.column_index(name) {
            Some(index) => indices.push(index),
            None => absent.push(name.clone()),
        }
    }
    if !absent.is_empty() {
        return Err(SchemaError {
            missing_identity: Vec::new(),
            missing_features: absent,
        }
        .into());
    }

    let mut values = Array2::<f64>::zeros((dataset.len(), features.len()));
    for row in 0..dataset.len() {
        for (position, &column) in indices.iter().enumerate() {
            let text = dataset.cell(row, column);
            values[[row, position]] = parse_score(text).ok_or_else(|| InferenceError::NonNumeric {
                row: row + 1,
                column: features[position].clone(),
                value: text.to_string(),
            })?;
        }
    }

    let ignored = dataset
        .headers
        .iter()
        .filter(|header| !features.contains(*header))
        .count();
    debug!(rows = dataset.len(), ignored_columns = ignored, "extracted feature matrix");

    Ok(FeatureMatrix {
        columns: features.to_vec(),
        values,
    })
}

fn parse_score(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
