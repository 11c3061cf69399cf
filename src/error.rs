//! Error types for the screening pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::risk::LabelConvention;

/// Any failure that terminates a screening request.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ScreeningError {
    /// Message shown to the person who uploaded the file.
    pub fn user_message(&self) -> String {
        match self {
            ScreeningError::Schema(err) => format!("the file is missing columns: {err}"),
            ScreeningError::Inference(err) => format!("the model could not score the file: {err}"),
            ScreeningError::Parse(err) => format!("the file could not be read: {err}"),
        }
    }
}

/// Required columns absent from an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_missing(.missing_identity, .missing_features))]
pub struct SchemaError {
    pub missing_identity: Vec<String>,
    pub missing_features: Vec<String>,
}

impl SchemaError {
    pub fn is_empty(&self) -> bool {
        self.missing_identity.is_empty() && self.missing_features.is_empty()
    }
}

fn describe_missing(identity: &[String], features: &[String]) -> String {
    let mut parts = Vec::new();
    if !identity.is_empty() {
        parts.push(format!("identity columns [{}]", identity.join(", ")));
    }
    if !features.is_empty() {
        parts.push(format!("question columns [{}]", features.join(", ")));
    }
    if parts.is_empty() {
        "no required columns missing".to_string()
    } else {
        format!("missing {}", parts.join("; "))
    }
}

/// Failures feeding data through the frozen scaler and classifier.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("feature matrix has {actual} columns but the model was fitted on {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("feature column {position} is {actual:?} but the model expects {expected:?}")]
    ColumnMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("row {row}, column {column}: {value:?} is not a number")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("classifier returned {raw}, which is not a {convention} label")]
    UnknownLabel { raw: i64, convention: LabelConvention },

    #[error("{predictions} predictions for {rows} rows")]
    LengthMismatch { rows: usize, predictions: usize },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
}

/// The uploaded (or artifact) file could not be read.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed spreadsheet: {0}")]
    Workbook(String),

    #[error("{0} has no header row")]
    MissingHeader(PathBuf),

    #[error("unsupported file type {0:?}; expected csv, xlsx, xlsm, xls or ods")]
    UnsupportedFormat(String),

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_each_missing_column() {
        let err = SchemaError {
            missing_identity: vec!["Gender".to_string()],
            missing_features: vec!["Q3".to_string(), "Q15".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("identity columns [Gender]"));
        assert!(message.contains("question columns [Q3, Q15]"));
        assert!(!err.is_empty());
    }

    #[test]
    fn user_message_wraps_underlying_error() {
        let err = ScreeningError::from(InferenceError::ShapeMismatch {
            expected: 27,
            actual: 26,
        });
        assert_eq!(
            err.user_message(),
            "the model could not score the file: feature matrix has 26 columns but the model was fitted on 27"
        );
    }
}
