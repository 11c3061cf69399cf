use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::IdentityColumns;
use crate::error::InferenceError;
use crate::models::{Dataset, ScreenedRecord};

pub const STATUS_COLUMN: &str = "Status";

/// Canonical classifier outcome, independent of how a model encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLabel {
    NotAtRisk,
    AtRisk,
}

impl RiskLabel {
    /// Reporting order: not-at-risk first, matching the confusion matrix axes.
    pub const ALL: [RiskLabel; 2] = [RiskLabel::NotAtRisk, RiskLabel::AtRisk];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::NotAtRisk => "not-at-risk",
            RiskLabel::AtRisk => "at-risk",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw label encoding used by an exported classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelConvention {
    /// -1 = not at risk, 1 = at risk.
    #[default]
    Signed,
    /// 0 = not at risk, 1 = at risk.
    Binary,
}

impl LabelConvention {
    /// Raw value for each canonical label.
    pub fn table(self) -> [(i64, RiskLabel); 2] {
        match self {
            LabelConvention::Signed => [(-1, RiskLabel::NotAtRisk), (1, RiskLabel::AtRisk)],
            LabelConvention::Binary => [(0, RiskLabel::NotAtRisk), (1, RiskLabel::AtRisk)],
        }
    }

    pub fn decode(self, raw: i64) -> Result<RiskLabel, InferenceError> {
        self.table()
            .into_iter()
            .find(|(value, _)| *value == raw)
            .map(|(_, label)| label)
            .ok_or(InferenceError::UnknownLabel {
                raw,
                convention: self,
            })
    }
}

impl FromStr for LabelConvention {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "signed" => Ok(LabelConvention::Signed),
            "binary" => Ok(LabelConvention::Binary),
            other => Err(format!("unknown label convention {other:?} (expected signed or binary)")),
        }
    }
}

impl fmt::Display for LabelConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelConvention::Signed => f.write_str("{-1, 1}"),
            LabelConvention::Binary => f.write_str("{0, 1}"),
        }
    }
}

/// Display text written to the `Status` column for each label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLabels {
    pub at_risk: String,
    pub not_at_risk: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            at_risk: "At risk of bullying victimization".to_string(),
            not_at_risk: "Not at risk".to_string(),
        }
    }
}

impl StatusLabels {
    pub fn display(&self, label: RiskLabel) -> &str {
        match label {
            RiskLabel::AtRisk => &self.at_risk,
            RiskLabel::NotAtRisk => &self.not_at_risk,
        }
    }
}

/// Appends (or overwrites) the status column and collects per-row results.
pub fn annotate(
    dataset: &Dataset,
    labels: &[RiskLabel],
    identity: &IdentityColumns,
    status_labels: &StatusLabels,
) -> Result<(Dataset, Vec<ScreenedRecord>), InferenceError> {
    if labels.len() != dataset.len() {
        return Err(InferenceError::LengthMismatch {
            rows: dataset.len(),
            predictions: labels.len(),
        });
    }

    let mut annotated = dataset.clone();
    let status_index = match annotated.column_index(STATUS_COLUMN) {
        Some(index) => index,
        None => {
            annotated.headers.push(STATUS_COLUMN.to_string());
            annotated.headers.len() - 1
        }
    };

    let name_index = dataset.column_index(&identity.name);
    let class_index = dataset.column_index(&identity.class);
    let gender_index = dataset.column_index(&identity.gender);
    let field = |row: usize, index: Option<usize>| {
        index
            .map(|column| dataset.cell(row, column).to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::with_capacity(labels.len());
    for (row, (cells, label)) in annotated.rows.iter_mut().zip(labels).enumerate() {
        let status = status_labels.display(*label).to_string();
        if cells.len() <= status_index {
            cells.resize(status_index + 1, String::new());
        }
        cells[status_index] = status.clone();

        records.push(ScreenedRecord {
            name: field(row, name_index),
            class: field(row, class_index),
            gender: field(row, gender_index),
            label: *label,
            status,
        });
    }

    Ok((annotated, records))
}
