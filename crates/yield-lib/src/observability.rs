//! Observability for training and prediction
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction counts, partial records, model version)
//! - Structured logging of significant events with tracing

use crate::training::TrainingReport;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, GaugeVec, Histogram,
    IntCounter,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

static GLOBAL_METRICS: OnceLock<YieldMetricsInner> = OnceLock::new();

struct YieldMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounter,
    partial_records_total: IntCounter,
    model_info: GaugeVec,
}

impl YieldMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "crop_yield_prediction_latency_seconds",
                "Time spent aligning a record and running the regressor",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "crop_yield_predictions_total",
                "Total number of yield predictions served"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter!(
                "crop_yield_prediction_errors_total",
                "Total number of failed predictions"
            )
            .expect("Failed to register prediction_errors_total"),

            partial_records_total: register_int_counter!(
                "crop_yield_partial_records_total",
                "Predictions made from records missing one or more training fields"
            )
            .expect("Failed to register partial_records_total"),

            model_info: register_gauge_vec!(
                "crop_yield_model_info",
                "Information about the currently loaded model",
                &["version", "columns"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct YieldMetrics {
    _private: (),
}

impl Default for YieldMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl YieldMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(YieldMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &YieldMetricsInner {
        GLOBAL_METRICS.get_or_init(YieldMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    pub fn inc_partial_records(&self) {
        self.inner().partial_records_total.inc();
    }

    /// Replace the model info series with the given version
    pub fn set_model_info(&self, version: &str, columns: usize) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[version, &columns.to_string()])
            .set(1.0);
    }
}

/// Structured logger for training and serving events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "service_started",
            component = %self.component,
            service_version = %version,
            model_version = %model_version,
            "Crop yield service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            component = %self.component,
            reason = %reason,
            "Crop yield service shutting down"
        );
    }

    pub fn log_training_complete(&self, report: &TrainingReport) {
        info!(
            event = "training_complete",
            component = %self.component,
            target = %report.target,
            rows = report.dataset_rows,
            encoded_columns = report.encoded_columns,
            r2 = report.r2,
            rmse = report.rmse,
            cv_r2_mean = report.cv_r2_mean,
            n_iter = report.n_iter,
            training_secs = report.training_secs,
            "Model training complete"
        );
    }

    pub fn log_artifacts_saved(&self, dir: &Path, model_version: &str) {
        info!(
            event = "artifacts_saved",
            component = %self.component,
            dir = %dir.display(),
            model_version = %model_version,
            "Model and column list saved"
        );
    }

    pub fn log_prediction(&self, predicted_yield: f64, model_version: &str, latency_secs: f64) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            predicted_yield = predicted_yield,
            model_version = %model_version,
            latency_secs = latency_secs,
            "Generated yield prediction"
        );
    }

    /// Fields absent from a record are encoded as zeros
    pub fn log_partial_record(&self, missing_fields: &[String]) {
        warn!(
            event = "partial_record",
            component = %self.component,
            missing_fields = ?missing_fields,
            "Record is missing training fields, encoding them as zero"
        );
    }
}
