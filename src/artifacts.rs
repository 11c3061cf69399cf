//! Frozen, pre-fit model artifacts.
//!
//! The scaler and classifier are fitted elsewhere and exported as plain
//! parameter dumps (`mean_`/`scale_` of a standard scaler, and the support
//! vectors, `dual_coef_`, `intercept_` and `classes_` of a binary SVC).
//! Nothing here mutates them after load, so one loaded copy can be shared
//! across threads behind an `Arc`.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{InferenceError, ParseError};
use crate::risk::LabelConvention;
use crate::schema::question_columns;

/// Fitted feature transform.
pub trait Scaler: Send + Sync {
    /// Number of columns the transform was fitted on.
    fn n_features(&self) -> usize;

    fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>, InferenceError>;
}

/// Fitted binary classifier producing raw label values.
pub trait Classifier: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<i64>, InferenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.mean.len() != self.scale.len() {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(position) = self
            .scale
            .iter()
            .position(|scale| *scale == 0.0 || !scale.is_finite())
        {
            return Err(InferenceError::InvalidArtifact(format!(
                "scaler scale for column {} is {}",
                position + 1,
                self.scale[position]
            )));
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>, InferenceError> {
        if features.ncols() != self.n_features() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((features - &mean) / &scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: i32 },
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    fn apply(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf { gamma } => {
                let distance: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * distance).exp()
            }
            Kernel::Poly {
                gamma,
                coef0,
                degree,
            } => (gamma * a.dot(&b) + coef0).powi(degree),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
        }
    }
}

/// Kernel SVC with two classes. A positive decision value selects
/// `classes[1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    pub classes: [i64; 2],
}

impl SvmClassifier {
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.support_vectors.is_empty() {
            return Err(InferenceError::InvalidArtifact(
                "classifier has no support vectors".to_string(),
            ));
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(InferenceError::InvalidArtifact(format!(
                "{} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            )));
        }
        let width = self.support_vectors[0].len();
        if self.support_vectors.iter().any(|sv| sv.len() != width) {
            return Err(InferenceError::InvalidArtifact(
                "support vectors have differing lengths".to_string(),
            ));
        }
        Ok(())
    }

    pub fn decision_function(&self, features: &Array2<f64>) -> Result<Vec<f64>, InferenceError> {
        if features.ncols() != self.n_features() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.n_features(),
                actual: features.ncols(),
            });
        }
        let support = self.support_matrix();
        Ok(features
            .axis_iter(Axis(0))
            .map(|row| {
                support
                    .axis_iter(Axis(0))
                    .zip(&self.dual_coef)
                    .map(|(sv, coef)| coef * self.kernel.apply(sv, row))
                    .sum::<f64>()
                    + self.intercept
            })
            .collect())
    }

    fn support_matrix(&self) -> Array2<f64> {
        let rows = self.support_vectors.len();
        let cols = self.n_features();
        let flat = self.support_vectors.iter().flatten().copied().collect::<Vec<_>>();
        Array2::from_shape_vec((rows, cols), flat).unwrap_or_else(|_| Array2::zeros((0, cols)))
    }
}

impl Classifier for SvmClassifier {
    fn n_features(&self) -> usize {
        self.support_vectors.first().map(Vec::len).unwrap_or(0)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<i64>, InferenceError> {
        Ok(self
            .decision_function(features)?
            .into_iter()
            .map(|value| self.classes[usize::from(value > 0.0)])
            .collect())
    }
}

/// Everything exported from one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    #[serde(default = "question_columns")]
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub label_convention: LabelConvention,
    pub scaler: StandardScaler,
    pub classifier: SvmClassifier,
}

impl ModelArtifacts {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifacts: ModelArtifacts =
            serde_json::from_str(&raw).map_err(|source| ParseError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            features = artifacts.feature_columns.len(),
            support_vectors = artifacts.classifier.support_vectors.len(),
            convention = %artifacts.label_convention,
            "loaded model artifacts"
        );
        Ok(artifacts)
    }

    /// Checks that the scaler, the classifier and the column list agree.
    pub fn validate(&self) -> Result<(), InferenceError> {
        self.scaler.validate()?;
        self.classifier.validate()?;

        let columns = self.feature_columns.len();
        if self.scaler.n_features() != columns {
            return Err(InferenceError::InvalidArtifact(format!(
                "{} feature columns but the scaler was fitted on {}",
                columns,
                self.scaler.n_features()
            )));
        }
        if self.classifier.n_features() != columns {
            return Err(InferenceError::InvalidArtifact(format!(
                "{} feature columns but the classifier was fitted on {}",
                columns,
                self.classifier.n_features()
            )));
        }

        let expected = self.label_convention.table().map(|(raw, _)| raw);
        let mut classes = self.classifier.classes;
        classes.sort_unstable();
        if classes != expected {
            return Err(InferenceError::InvalidArtifact(format!(
                "classifier classes {:?} do not match the {} label convention",
                self.classifier.classes, self.label_convention
            )));
        }
        Ok(())
    }
}
