//! Yield prediction from persisted artifacts
//!
//! Wraps a fitted regressor with the feature schema it was trained on, so
//! callers can hand in raw records with any subset of the training fields.

use crate::artifacts::{ArtifactStore, LoadedArtifacts};
use crate::error::{Result, YieldError};
use crate::features::FeatureSchema;
use crate::model::{GradientBoostingRegressor, Regressor};
use crate::models::{FeatureVector, PredictionOutcome, RawRecord};
use crate::observability::{StructuredLogger, YieldMetrics};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 5;

pub struct YieldPredictor {
    model: GradientBoostingRegressor,
    schema: FeatureSchema,
    target: String,
    model_version: String,
    trained_at: DateTime<Utc>,
    metrics: YieldMetrics,
    logger: StructuredLogger,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    partial_record_count: AtomicU64,
}

impl YieldPredictor {
    /// Load the model and column list from an artifact directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let loaded = ArtifactStore::new(dir.as_ref()).load()?;
        Ok(Self::from_loaded(loaded))
    }

    pub fn from_loaded(loaded: LoadedArtifacts) -> Self {
        let metrics = YieldMetrics::new();
        metrics.set_model_info(&loaded.model_version, loaded.schema.n_columns());
        Self {
            model: loaded.model,
            schema: loaded.schema,
            target: loaded.target,
            model_version: loaded.model_version,
            trained_at: loaded.trained_at,
            metrics,
            logger: StructuredLogger::new("predictor"),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
            partial_record_count: AtomicU64::new(0),
        }
    }

    /// Build a predictor from an in-memory model, e.g. straight after training
    pub fn from_parts(
        model: GradientBoostingRegressor,
        schema: FeatureSchema,
        model_version: impl Into<String>,
    ) -> Result<Self> {
        model.validate_fitted()?;
        if let Some(n) = model.n_features() {
            if n != schema.n_columns() {
                return Err(YieldError::ShapeMismatch {
                    expected: schema.n_columns(),
                    actual: n,
                });
            }
        }
        Ok(Self::from_loaded(LoadedArtifacts {
            model,
            schema,
            target: crate::dataset::DEFAULT_TARGET.to_string(),
            model_version: model_version.into(),
            trained_at: Utc::now(),
        }))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Predict the yield for one raw record.
    ///
    /// Fields the record lacks are encoded as zeros and reported back in
    /// `missing_fields`; fields the model never saw are ignored.
    pub fn predict(&self, record: &RawRecord) -> Result<PredictionOutcome> {
        let start = Instant::now();

        let missing_fields = self.schema.missing_fields(record);
        if !missing_fields.is_empty() {
            self.partial_record_count.fetch_add(1, Ordering::Relaxed);
            self.metrics.inc_partial_records();
            self.logger.log_partial_record(&missing_fields);
        }

        let features = self.schema.align_record(record);
        let predicted_yield = match self.predict_vector(&features) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.inc_prediction_errors();
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        self.record_latency(elapsed);
        self.logger
            .log_prediction(predicted_yield, &self.model_version, elapsed.as_secs_f64());

        Ok(PredictionOutcome {
            predicted_yield,
            missing_fields,
            model_version: self.model_version.clone(),
        })
    }

    /// Predict from a vector already aligned to the column schema
    pub fn predict_vector(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.schema.n_columns() {
            return Err(YieldError::ShapeMismatch {
                expected: self.schema.n_columns(),
                actual: features.len(),
            });
        }
        self.model.predict_row(&features.values)
    }

    pub fn predict_batch(&self, records: &[RawRecord]) -> Result<Vec<f64>> {
        let start = Instant::now();
        let x = self.schema.align_batch(records)?;
        let predictions = self.model.predict(&x).inspect_err(|_| {
            self.metrics.inc_prediction_errors();
        })?;
        debug!(
            records = records.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Batch prediction completed"
        );
        Ok(predictions.as_slice().iter().map(|&v| f64::from(v)).collect())
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            partial_records: self.partial_record_count.load(Ordering::Relaxed),
        }
    }

    fn record_latency(&self, elapsed: std::time::Duration) {
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_predictions();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    pub partial_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::model::BoostingParams;
    use crate::training::{Trainer, TrainingConfig};
    use std::fmt::Write;
    use tempfile::TempDir;

    const HEADER: &str = "Region,Soil_Type,Crop,Rainfall_mm,Temperature_Celsius,\
                          Fertilizer_Used,Irrigation_Used,Weather_Condition,\
                          Days_to_Harvest,Yield_tons_per_hectare\n";

    fn dataset() -> Dataset {
        let regions = ["North", "South", "East", "West"];
        let crops = ["Wheat", "Rice", "Maize"];
        let mut csv = String::from(HEADER);
        for i in 0..200 {
            let rainfall = 300.0 + (i * 13 % 200) as f64 * 3.0;
            let fertilizer = i % 2 == 0;
            let yield_ = rainfall / 200.0 + if fertilizer { 1.5 } else { 0.0 };
            writeln!(
                csv,
                "{},Loam,{},{},{},{},{},Sunny,{},{}",
                regions[i % 4],
                crops[i % 3],
                rainfall,
                20 + i % 10,
                if fertilizer { "True" } else { "False" },
                if i % 3 == 0 { "True" } else { "False" },
                90 + i % 40,
                yield_
            )
            .unwrap();
        }
        Dataset::from_reader(csv.as_bytes(), "predictor.csv").unwrap()
    }

    fn predictor() -> YieldPredictor {
        let config = TrainingConfig {
            params: BoostingParams::crop_yield().with_max_iter(60),
            cv_folds: 2,
            ..TrainingConfig::default()
        };
        let trained = Trainer::new(config).train(&dataset()).unwrap();
        YieldPredictor::from_parts(trained.model, trained.schema, "test").unwrap()
    }

    fn full_record() -> RawRecord {
        RawRecord::new()
            .with("Region", "West")
            .with("Soil_Type", "Loam")
            .with("Crop", "Maize")
            .with("Rainfall_mm", 897.0)
            .with("Temperature_Celsius", 27.6)
            .with("Fertilizer_Used", true)
            .with("Irrigation_Used", true)
            .with("Weather_Condition", "Sunny")
            .with("Days_to_Harvest", 122.0)
    }

    #[test]
    fn test_full_record_prediction() {
        let predictor = predictor();
        let outcome = predictor.predict(&full_record()).unwrap();

        assert!(outcome.predicted_yield.is_finite());
        assert!(outcome.missing_fields.is_empty());
        assert_eq!(outcome.model_version, "test");
        assert_eq!(predictor.stats().total_inferences, 1);
        assert_eq!(predictor.stats().partial_records, 0);
    }

    #[test]
    fn test_partial_record_reports_missing_fields() {
        let predictor = predictor();
        let record = RawRecord::new()
            .with("Rainfall_mm", 500.0)
            .with("Temperature_Celsius", 25.0)
            .with("Fertilizer_Used", 1.0);

        let outcome = predictor.predict(&record).unwrap();
        assert!(outcome.predicted_yield.is_finite());
        assert!(outcome.missing_fields.contains(&"Region".to_string()));
        assert!(!outcome
            .missing_fields
            .contains(&"Rainfall_mm".to_string()));
        assert_eq!(predictor.stats().partial_records, 1);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let predictor = predictor();
        let base = predictor.predict(&full_record()).unwrap();
        let noisy = predictor
            .predict(&full_record().with("Farm_Name", "Green Acres").with("Plot", 4.0))
            .unwrap();
        assert_eq!(base.predicted_yield, noisy.predicted_yield);
    }

    #[test]
    fn test_fertilizer_raises_prediction() {
        let predictor = predictor();
        let with = predictor.predict(&full_record()).unwrap();
        let without = predictor
            .predict(&full_record().with("Fertilizer_Used", false))
            .unwrap();
        assert!(with.predicted_yield > without.predicted_yield);
    }

    #[test]
    fn test_batch_matches_single() {
        let predictor = predictor();
        let records = vec![full_record(), full_record().with("Crop", "Wheat")];
        let batch = predictor.predict_batch(&records).unwrap();

        assert_eq!(batch.len(), 2);
        for (record, value) in records.iter().zip(&batch) {
            assert_eq!(predictor.predict(record).unwrap().predicted_yield, *value);
        }
    }

    #[test]
    fn test_wrong_width_vector_rejected() {
        let predictor = predictor();
        let err = predictor
            .predict_vector(&FeatureVector { values: vec![1.0] })
            .unwrap_err();
        assert!(matches!(err, YieldError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_load_from_artifact_dir() {
        let config = TrainingConfig {
            params: BoostingParams::crop_yield().with_max_iter(20),
            cv_folds: 2,
            ..TrainingConfig::default()
        };
        let trained = Trainer::new(config).train(&dataset()).unwrap();
        let dir = TempDir::new().unwrap();
        let manifest = ArtifactStore::new(dir.path()).save(&trained).unwrap();

        let predictor = YieldPredictor::load(dir.path()).unwrap();
        assert_eq!(predictor.model_version(), manifest.model_version);
        assert_eq!(predictor.schema().columns(), trained.schema.columns());
        assert_eq!(predictor.target(), "Yield_tons_per_hectare");

        let expected = trained
            .model
            .predict_row(&trained.schema.align_record(&full_record()).values)
            .unwrap();
        let actual = predictor.predict(&full_record()).unwrap().predicted_yield;
        assert_eq!(actual, expected);
    }
}
