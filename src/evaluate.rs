//! Held-out test-set evaluation of the frozen classifier.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ParseError, ScreeningError};
use crate::models::{ClassMetrics, ClassificationReport, ConfusionMatrix};
use crate::risk::{LabelConvention, RiskLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledPrediction {
    pub actual: RiskLabel,
    pub predicted: RiskLabel,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    actual: i64,
    predicted: i64,
}

/// Reads `actual,predicted` raw label pairs.
pub fn load_labels(
    path: &Path,
    convention: LabelConvention,
) -> Result<Vec<LabeledPrediction>, ScreeningError> {
    let file = std::fs::File::open(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_labels(file, convention)
}

pub fn read_labels<R: Read>(
    input: R,
    convention: LabelConvention,
) -> Result<Vec<LabeledPrediction>, ScreeningError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut pairs = Vec::new();
    for result in reader.deserialize::<LabelRow>() {
        let row = result.map_err(ParseError::from)?;
        pairs.push(LabeledPrediction {
            actual: convention.decode(row.actual)?,
            predicted: convention.decode(row.predicted)?,
        });
    }
    Ok(pairs)
}

pub fn confusion_matrix(pairs: &[LabeledPrediction]) -> ConfusionMatrix {
    let mut matrix = ConfusionMatrix::default();
    for pair in pairs {
        match (pair.actual, pair.predicted) {
            (RiskLabel::NotAtRisk, RiskLabel::NotAtRisk) => matrix.true_negative += 1,
            (RiskLabel::NotAtRisk, RiskLabel::AtRisk) => matrix.false_positive += 1,
            (RiskLabel::AtRisk, RiskLabel::NotAtRisk) => matrix.false_negative += 1,
            (RiskLabel::AtRisk, RiskLabel::AtRisk) => matrix.true_positive += 1,
        }
    }
    matrix
}

/// Per-class precision/recall/F1 with macro and support-weighted averages.
/// Undefined ratios (no predictions or no support) count as 0.
pub fn classification_report(matrix: &ConfusionMatrix) -> ClassificationReport {
    let not_at_risk = class_metrics(
        matrix.true_negative,
        matrix.false_negative,
        matrix.false_positive,
    );
    let at_risk = class_metrics(
        matrix.true_positive,
        matrix.false_positive,
        matrix.false_negative,
    );

    let total = matrix.total();
    let accuracy = ratio(matrix.true_negative + matrix.true_positive, total);

    let macro_avg = ClassMetrics {
        precision: (not_at_risk.precision + at_risk.precision) / 2.0,
        recall: (not_at_risk.recall + at_risk.recall) / 2.0,
        f1: (not_at_risk.f1 + at_risk.f1) / 2.0,
        support: total,
    };

    let weight = |metric: fn(&ClassMetrics) -> f64| {
        if total == 0 {
            0.0
        } else {
            (metric(&not_at_risk) * not_at_risk.support as f64
                + metric(&at_risk) * at_risk.support as f64)
                / total as f64
        }
    };
    let weighted_avg = ClassMetrics {
        precision: weight(|m| m.precision),
        recall: weight(|m| m.recall),
        f1: weight(|m| m.f1),
        support: total,
    };

    ClassificationReport {
        not_at_risk,
        at_risk,
        accuracy,
        macro_avg,
        weighted_avg,
    }
}

/// True-label counts in reporting order (not-at-risk, at-risk).
pub fn label_distribution(pairs: &[LabeledPrediction]) -> [usize; 2] {
    RiskLabel::ALL.map(|label| pairs.iter().filter(|pair| pair.actual == label).count())
}

fn class_metrics(hits: usize, false_alarms: usize, misses: usize) -> ClassMetrics {
    let precision = ratio(hits, hits + false_alarms);
    let recall = ratio(hits, hits + misses);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    ClassMetrics {
        precision,
        recall,
        f1,
        support: hits + misses,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;

    fn pairs(matrix: [[usize; 2]; 2]) -> Vec<LabeledPrediction> {
        let mut out = Vec::new();
        for (a, actual) in RiskLabel::ALL.into_iter().enumerate() {
            for (p, predicted) in RiskLabel::ALL.into_iter().enumerate() {
                let pair = LabeledPrediction { actual, predicted };
                out.extend(std::iter::repeat(pair).take(matrix[a][p]));
            }
        }
        out
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.005
    }

    #[test]
    fn matches_the_published_test_split() {
        let data = pairs([[51, 1], [0, 6]]);
        let matrix = confusion_matrix(&data);
        assert_eq!(matrix.as_grid(), [[51, 1], [0, 6]]);

        let report = classification_report(&matrix);
        assert!(close(report.not_at_risk.precision, 1.00));
        assert!(close(report.not_at_risk.recall, 0.98));
        assert!(close(report.not_at_risk.f1, 0.99));
        assert_eq!(report.not_at_risk.support, 52);
        assert!(close(report.at_risk.precision, 0.86));
        assert!(close(report.at_risk.f1, 0.92));
        assert!(close(report.accuracy, 0.98));
        assert!(close(report.macro_avg.precision, 0.93));
        assert!(close(report.weighted_avg.f1, 0.98));
        assert_eq!(label_distribution(&data), [52, 6]);
    }

    #[test]
    fn never_predicting_a_class_gives_zero_not_nan() {
        let matrix = confusion_matrix(&pairs([[5, 0], [3, 0]]));
        let report = classification_report(&matrix);
        assert_eq!(report.at_risk.precision, 0.0);
        assert_eq!(report.at_risk.f1, 0.0);
        assert!(report.weighted_avg.precision.is_finite());
    }

    #[test]
    fn empty_test_set_reports_zeros() {
        let report = classification_report(&ConfusionMatrix::default());
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.weighted_avg.recall, 0.0);
        assert_eq!(label_distribution(&[]), [0, 0]);
    }

    #[test]
    fn reads_pairs_in_either_convention() {
        let signed = "actual,predicted\n-1,-1\n1, -1\n";
        let pairs = read_labels(signed.as_bytes(), LabelConvention::Signed).unwrap();
        assert_eq!(pairs[1].actual, RiskLabel::AtRisk);
        assert_eq!(pairs[1].predicted, RiskLabel::NotAtRisk);

        let binary = "actual,predicted\n0,1\n";
        let pairs = read_labels(binary.as_bytes(), LabelConvention::Binary).unwrap();
        assert_eq!(pairs[0].predicted, RiskLabel::AtRisk);
    }

    #[test]
    fn labels_outside_the_convention_are_rejected() {
        let input = "actual,predicted\n0,1\n";
        match read_labels(input.as_bytes(), LabelConvention::Signed) {
            Err(ScreeningError::Inference(InferenceError::UnknownLabel { raw, .. })) => {
                assert_eq!(raw, 0)
            }
            other => panic!("expected unknown label, got {other:?}"),
        }
    }
}
