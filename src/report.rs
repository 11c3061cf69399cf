use std::fmt::Write;

use crate::models::{
    AggregateReport, ClassMetrics, ClassificationReport, ConfusionMatrix, ScreeningOutcome,
    StatusCount,
};
use crate::risk::{RiskLabel, StatusLabels};

/// Counts each label, listing both categories even when one never occurs.
pub fn aggregate(labels: &[RiskLabel], status_labels: &StatusLabels) -> AggregateReport {
    let total = labels.len();
    let counts = RiskLabel::ALL
        .into_iter()
        .map(|label| {
            let count = labels.iter().filter(|candidate| **candidate == label).count();
            StatusCount {
                label,
                status: status_labels.display(label).to_string(),
                count,
                proportion: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                },
            }
        })
        .collect();

    AggregateReport { total, counts }
}

/// One line per category, e.g. for the console summary under the pie chart.
pub fn summary_line(report: &AggregateReport) -> String {
    report
        .counts
        .iter()
        .map(|entry| {
            format!(
                "{}: {} ({:.1}%)",
                entry.status,
                entry.count,
                entry.proportion * 100.0
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn build_report(source: &str, outcome: &ScreeningOutcome, limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Bullying Early Warning Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (run {})",
        source,
        outcome.generated_at.format("%Y-%m-%d %H:%M UTC"),
        outcome.run_id
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Prediction Mix");

    if outcome.report.total == 0 {
        let _ = writeln!(output, "No students in this upload.");
    } else {
        for entry in outcome.report.counts.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students ({:.1}%)",
                entry.status,
                entry.count,
                entry.proportion * 100.0
            );
        }
    }

    let flagged = outcome
        .records
        .iter()
        .filter(|record| record.label == RiskLabel::AtRisk)
        .collect::<Vec<_>>();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Flagged At Risk");

    if flagged.is_empty() {
        let _ = writeln!(output, "No students were flagged in this upload.");
    } else {
        for record in flagged.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}, {})",
                record.name, record.class, record.gender
            );
        }
        if flagged.len() > limit {
            let _ = writeln!(output, "- ... and {} more", flagged.len() - limit);
        }
    }

    output
}

pub fn build_evaluation_report(
    source: &str,
    matrix: &ConfusionMatrix,
    metrics: &ClassificationReport,
    status_labels: &StatusLabels,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Model Evaluation Report");
    let _ = writeln!(output, "Test set: {} ({} students)", source, matrix.total());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Classification Report");
    let _ = writeln!(output, "| | precision | recall | f1-score | support |");
    let _ = writeln!(output, "|---|---|---|---|---|");

    let mut row = |name: &str, entry: &ClassMetrics| {
        let _ = writeln!(
            output,
            "| **{}** | {:.2} | {:.2} | {:.2} | {} |",
            name, entry.precision, entry.recall, entry.f1, entry.support
        );
    };
    row(status_labels.display(RiskLabel::NotAtRisk), &metrics.not_at_risk);
    row(status_labels.display(RiskLabel::AtRisk), &metrics.at_risk);
    row("macro avg", &metrics.macro_avg);
    row("weighted avg", &metrics.weighted_avg);

    let _ = writeln!(output);
    let _ = writeln!(output, "Accuracy: {:.2}", metrics.accuracy);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Confusion Matrix");
    let _ = writeln!(
        output,
        "| actual \\ predicted | {} | {} |",
        status_labels.not_at_risk, status_labels.at_risk
    );
    let _ = writeln!(output, "|---|---|---|");
    let grid = matrix.as_grid();
    for (label, counts) in RiskLabel::ALL.iter().zip(grid.iter()) {
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            status_labels.display(*label),
            counts[0],
            counts[1]
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, ScreenedRecord};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(name: &str, label: RiskLabel) -> ScreenedRecord {
        ScreenedRecord {
            name: name.to_string(),
            class: "7A".to_string(),
            gender: "F".to_string(),
            label,
            status: StatusLabels::default().display(label).to_string(),
        }
    }

    #[test]
    fn single_category_batch_still_lists_the_other() {
        let report = aggregate(
            &[RiskLabel::NotAtRisk, RiskLabel::NotAtRisk],
            &StatusLabels::default(),
        );
        assert_eq!(report.total, 2);
        assert_eq!(report.counts.len(), 2);
        assert_eq!(report.count(RiskLabel::NotAtRisk), 2);
        assert_eq!(report.count(RiskLabel::AtRisk), 0);
        assert_eq!(report.counts[0].proportion, 1.0);
    }

    #[test]
    fn counts_sum_to_total() {
        let labels = [
            RiskLabel::AtRisk,
            RiskLabel::NotAtRisk,
            RiskLabel::NotAtRisk,
            RiskLabel::AtRisk,
            RiskLabel::NotAtRisk,
        ];
        let report = aggregate(&labels, &StatusLabels::default());
        let sum: usize = report.counts.iter().map(|entry| entry.count).sum();
        assert_eq!(sum, labels.len());
        assert!((report.counts[1].proportion - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_batch_has_zero_proportions() {
        let report = aggregate(&[], &StatusLabels::default());
        assert_eq!(report.total, 0);
        assert!(report.counts.iter().all(|entry| entry.count == 0 && entry.proportion == 0.0));
        assert_eq!(
            summary_line(&report),
            "Not at risk: 0 (0.0%) | At risk of bullying victimization: 0 (0.0%)"
        );
    }

    #[test]
    fn report_lists_flagged_students() {
        let records = vec![
            record("Avery Lee", RiskLabel::AtRisk),
            record("Jules Moreno", RiskLabel::NotAtRisk),
            record("Kiara Patel", RiskLabel::AtRisk),
        ];
        let labels = records.iter().map(|r| r.label).collect::<Vec<_>>();
        let outcome = ScreeningOutcome {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            annotated: Dataset::default(),
            report: aggregate(&labels, &StatusLabels::default()),
            records,
        };

        let report = build_report("answers.xlsx", &outcome, 1);
        assert!(report.contains("Generated for answers.xlsx"));
        assert!(report.contains("- At risk of bullying victimization: 2 students (66.7%)"));
        assert!(report.contains("- Avery Lee (7A, F)"));
        assert!(!report.contains("Kiara Patel"));
        assert!(report.contains("and 1 more"));
        assert!(!report.contains("Jules Moreno"));
    }

    #[test]
    fn evaluation_report_tabulates_metrics() {
        let matrix = ConfusionMatrix {
            true_negative: 51,
            false_positive: 1,
            false_negative: 0,
            true_positive: 6,
        };
        let metrics = crate::evaluate::classification_report(&matrix);
        let report =
            build_evaluation_report("y_test.csv", &matrix, &metrics, &StatusLabels::default());
        assert!(report.contains("Test set: y_test.csv (58 students)"));
        assert!(report
            .contains("| **At risk of bullying victimization** | 0.86 | 1.00 | 0.92 | 6 |"));
        assert!(report.contains("Accuracy: 0.98"));
        assert!(report.contains("| Not at risk | 51 | 1 |"));
    }
}
