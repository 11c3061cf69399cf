use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use uuid::Uuid;

use crate::risk::RiskLabel;

/// An uploaded table, kept as text so the export matches what was uploaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell text, empty when the row is shorter than the header.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Numeric input for the frozen pipeline, with the names of its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenedRecord {
    pub name: String,
    pub class: String,
    pub gender: String,
    pub label: RiskLabel,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub label: RiskLabel,
    pub status: String,
    pub count: usize,
    pub proportion: f64,
}

/// Per-category totals of one batch. Both categories are always listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub total: usize,
    pub counts: Vec<StatusCount>,
}

impl AggregateReport {
    pub fn count(&self, label: RiskLabel) -> usize {
        self.counts
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

/// Everything produced by one successful screening request.
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub annotated: Dataset,
    pub records: Vec<ScreenedRecord>,
    pub report: AggregateReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Rows are actual labels, columns predicted, both ordered not-at-risk then at-risk.
    pub fn as_grid(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub not_at_risk: ClassMetrics,
    pub at_risk: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}
