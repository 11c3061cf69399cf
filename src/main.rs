use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod artifacts;
mod chart;
mod config;
mod dataset;
mod error;
mod evaluate;
mod models;
mod pipeline;
mod report;
mod risk;
mod schema;

use crate::artifacts::ModelArtifacts;
use crate::config::ScreeningConfig;
use crate::pipeline::{InferencePipeline, Screener};
use crate::risk::LabelConvention;

#[derive(Parser)]
#[command(name = "bullying-early-warning")]
#[command(about = "Flag students at risk of bullying victimization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a questionnaire file (CSV or spreadsheet) with the trained model
    Predict {
        #[arg(long)]
        input: PathBuf,
        /// JSON export of the fitted scaler and classifier
        #[arg(long, env = "SCREENING_MODEL")]
        model: PathBuf,
        /// JSON file overriding column names and status wording
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "predictions.csv")]
        out: PathBuf,
        #[arg(long, default_value = "prediction_distribution.png")]
        chart: PathBuf,
        /// Also write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print the category counts as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Evaluate held-out predictions against the true labels
    Evaluate {
        /// CSV with `actual` and `predicted` raw label columns
        #[arg(long)]
        labels: PathBuf,
        #[arg(long, default_value = "signed")]
        convention: LabelConvention,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "confusion_matrix.png")]
        confusion_chart: PathBuf,
        #[arg(long, default_value = "label_distribution.png")]
        distribution_chart: PathBuf,
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            input,
            model,
            config,
            out,
            chart,
            report,
            limit,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let artifacts =
                ModelArtifacts::load(&model).context("failed to load model artifacts")?;
            let pipeline = InferencePipeline::from_artifacts(artifacts)
                .context("model artifacts are inconsistent")?;
            let screener = Screener::new(config, pipeline);

            let outcome = match screener.screen_file(&input) {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(input = %input.display(), error = %err, "screening failed");
                    anyhow::bail!(
                        "could not process {}: {}",
                        input.display(),
                        err.user_message()
                    );
                }
            };

            let csv = dataset::to_csv_bytes(&outcome.annotated)?;
            let png =
                chart::pie_chart_png(&outcome.report).context("failed to render pie chart")?;
            write_output(&out, &csv)?;
            write_output(&chart, &png)?;
            if let Some(path) = &report {
                let markdown = report::build_report(&input.display().to_string(), &outcome, limit);
                write_output(path, markdown.as_bytes())?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
                return Ok(());
            }

            if outcome.records.is_empty() {
                println!("No students found in {}.", input.display());
            } else {
                println!("Prediction results:");
                for record in outcome.records.iter().take(limit) {
                    println!(
                        "- {} ({}, {}): {}",
                        record.name, record.class, record.gender, record.status
                    );
                }
                if outcome.records.len() > limit {
                    println!("... and {} more", outcome.records.len() - limit);
                }
            }
            println!("{}", report::summary_line(&outcome.report));
            println!("Predictions written to {}.", out.display());
            println!("Chart written to {}.", chart.display());
        }
        Commands::Evaluate {
            labels,
            convention,
            config,
            confusion_chart,
            distribution_chart,
            report,
        } => {
            let config = load_config(config.as_deref())?;
            let pairs = match evaluate::load_labels(&labels, convention) {
                Ok(pairs) => pairs,
                Err(err) => {
                    error!(labels = %labels.display(), error = %err, "evaluation failed");
                    anyhow::bail!(
                        "could not evaluate {}: {}",
                        labels.display(),
                        err.user_message()
                    );
                }
            };

            let matrix = evaluate::confusion_matrix(&pairs);
            let metrics = evaluate::classification_report(&matrix);
            let heatmap = chart::confusion_matrix_png(&matrix)
                .context("failed to render confusion matrix")?;
            let bars = chart::label_distribution_png(evaluate::label_distribution(&pairs))
                .context("failed to render label distribution")?;
            write_output(&confusion_chart, &heatmap)?;
            write_output(&distribution_chart, &bars)?;

            let markdown = report::build_evaluation_report(
                &labels.display().to_string(),
                &matrix,
                &metrics,
                &config.status_labels,
            );
            match &report {
                Some(path) => {
                    write_output(path, markdown.as_bytes())?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
            println!(
                "Charts written to {} and {}.",
                confusion_chart.display(),
                distribution_chart.display()
            );
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScreeningConfig> {
    match path {
        Some(path) => ScreeningConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ScreeningConfig::default()),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(())
}
