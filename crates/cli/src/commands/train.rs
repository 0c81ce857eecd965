//! `train`: fit the model on the CSV and persist the artifacts

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use yield_lib::{
    observability::StructuredLogger, ArtifactStore, Trainer, TrainingConfig, TrainingReport,
};

use crate::output::{
    color_r2, format_metric, print_info, print_json, print_success, print_table, print_warning,
    OutputFormat,
};

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct TrainOutput<'a> {
    model_version: &'a str,
    artifact_dir: &'a Path,
    report: &'a TrainingReport,
}

pub fn run(
    data: &Path,
    output_dir: &Path,
    target: &str,
    seed: u64,
    format: OutputFormat,
) -> Result<()> {
    let config = TrainingConfig {
        dataset_path: data.to_path_buf(),
        target: target.to_string(),
        ..TrainingConfig::default()
    }
    .with_seed(seed);

    let trained = Trainer::new(config)
        .run()
        .with_context(|| format!("Training on {} failed", data.display()))?;

    let logger = StructuredLogger::new("trainer");
    logger.log_training_complete(&trained.report);

    let manifest = ArtifactStore::new(output_dir)
        .save(&trained)
        .with_context(|| format!("Failed to save artifacts to {}", output_dir.display()))?;
    logger.log_artifacts_saved(output_dir, &manifest.model_version);

    match format {
        OutputFormat::Table => print_report(&trained.report, output_dir, &manifest.model_version),
        OutputFormat::Json => print_json(&TrainOutput {
            model_version: &manifest.model_version,
            artifact_dir: output_dir,
            report: &trained.report,
        })?,
    }

    Ok(())
}

fn print_report(report: &TrainingReport, output_dir: &Path, model_version: &str) {
    let cv_scores = report
        .cv_r2_scores
        .iter()
        .map(|s| format_metric(*s))
        .collect::<Vec<_>>()
        .join(", ");

    let rows = vec![
        MetricRow {
            metric: "Rows",
            value: report.dataset_rows.to_string(),
        },
        MetricRow {
            metric: "Encoded columns",
            value: report.encoded_columns.to_string(),
        },
        MetricRow {
            metric: "Train / test rows",
            value: format!("{} / {}", report.train_rows, report.test_rows),
        },
        MetricRow {
            metric: "Boosting iterations",
            value: report.n_iter.to_string(),
        },
        MetricRow {
            metric: "R2 Score",
            value: color_r2(report.r2),
        },
        MetricRow {
            metric: "RMSE",
            value: format_metric(report.rmse),
        },
        MetricRow {
            metric: "Cross Validation R2",
            value: cv_scores,
        },
        MetricRow {
            metric: "Average CV R2",
            value: color_r2(report.cv_r2_mean),
        },
    ];
    print_table(&rows);

    if report.r2 < 0.5 {
        print_warning("Held-out R2 is below 0.5; the model explains little of the variance");
    }
    print_info(&format!(
        "Actual vs predicted pairs written to {}",
        output_dir.join(yield_lib::artifacts::DIAGNOSTICS_FILE).display()
    ));
    print_success(&format!(
        "Model {} and column list saved to {}",
        model_version,
        output_dir.display()
    ));
}
