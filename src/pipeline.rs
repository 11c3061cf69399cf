use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::artifacts::{Classifier, ModelArtifacts, Scaler};
use crate::config::ScreeningConfig;
use crate::dataset;
use crate::error::{InferenceError, ScreeningError};
use crate::models::{Dataset, FeatureMatrix, ScreeningOutcome};
use crate::report;
use crate::risk::{self, LabelConvention, RiskLabel};
use crate::schema;

/// Scale-then-predict over handles that are never mutated after load.
#[derive(Clone)]
pub struct InferencePipeline {
    feature_columns: Vec<String>,
    convention: LabelConvention,
    scaler: Arc<dyn Scaler>,
    classifier: Arc<dyn Classifier>,
}

impl InferencePipeline {
    pub fn new(
        feature_columns: Vec<String>,
        convention: LabelConvention,
        scaler: Arc<dyn Scaler>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            feature_columns,
            convention,
            scaler,
            classifier,
        }
    }

    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self, InferenceError> {
        artifacts.validate()?;
        Ok(Self::new(
            artifacts.feature_columns,
            artifacts.label_convention,
            Arc::new(artifacts.scaler),
            Arc::new(artifacts.classifier),
        ))
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<RiskLabel>, InferenceError> {
        if matrix.ncols() != self.feature_columns.len() || matrix.columns.len() != matrix.ncols() {
            return Err(InferenceError::ShapeMismatch {
                expected: self.feature_columns.len(),
                actual: matrix.ncols(),
            });
        }
        if let Some((position, (expected, actual))) = self
            .feature_columns
            .iter()
            .zip(&matrix.columns)
            .enumerate()
            .find(|(_, (expected, actual))| expected != actual)
        {
            return Err(InferenceError::ColumnMismatch {
                position: position + 1,
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }

        let scaled = self.scaler.transform(&matrix.values)?;
        let raw = self.classifier.predict(&scaled)?;
        if raw.len() != matrix.nrows() {
            return Err(InferenceError::LengthMismatch {
                rows: matrix.nrows(),
                predictions: raw.len(),
            });
        }

        raw.into_iter()
            .map(|value| self.convention.decode(value))
            .collect()
    }
}

/// Runs one upload through validation, extraction, inference, annotation
/// and aggregation. Either the whole outcome is produced or an error is.
pub struct Screener {
    config: ScreeningConfig,
    pipeline: InferencePipeline,
}

impl Screener {
    pub fn new(config: ScreeningConfig, pipeline: InferencePipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn screen_file(&self, path: &Path) -> Result<ScreeningOutcome, ScreeningError> {
        let dataset = dataset::load(path)?;
        self.screen(&dataset)
    }

    pub fn screen(&self, dataset: &Dataset) -> Result<ScreeningOutcome, ScreeningError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("screening", %run_id, rows = dataset.len());
        let _guard = span.enter();
        if dataset.is_empty() {
            warn!("upload has a header row but no students");
        }

        let features = self.pipeline.feature_columns();
        schema::validate(dataset, &self.config.identity_columns, features)?;
        let matrix = schema::extract_features(dataset, features)?;
        debug!(shape = ?matrix.values.dim(), "features aligned by name");

        let labels = self.pipeline.predict(&matrix)?;
        let (annotated, records) = risk::annotate(
            dataset,
            &labels,
            &self.config.identity_columns,
            &self.config.status_labels,
        )?;
        let report = report::aggregate(&labels, &self.config.status_labels);

        info!(
            at_risk = report.count(RiskLabel::AtRisk),
            not_at_risk = report.count(RiskLabel::NotAtRisk),
            "screening complete"
        );

        Ok(ScreeningOutcome {
            run_id,
            generated_at: Utc::now(),
            annotated,
            records,
            report,
        })
    }
}
