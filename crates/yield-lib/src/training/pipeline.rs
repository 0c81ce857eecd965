//! End-to-end training: load, encode, split, fit, evaluate

use crate::dataset::{Dataset, DEFAULT_TARGET};
use crate::error::{Result, YieldError};
use crate::features::FeatureSchema;
use crate::model::{take_rows, target_vector, BoostingParams, GradientBoostingRegressor, Regressor};
use aprender::metrics::{mse, r_squared};
use aprender::model_selection::{train_test_split, KFold};
use aprender::primitives::{Matrix, Vector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Held-out fraction for evaluation
pub const DEFAULT_TEST_FRACTION: f32 = 0.2;

/// Number of cross-validation folds
pub const DEFAULT_CV_FOLDS: usize = 5;

/// Seed for the train/test split and the regressor
pub const DEFAULT_SEED: u64 = 42;

/// Configuration for a training run
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub dataset_path: PathBuf,
    pub target: String,
    pub test_fraction: f32,
    pub cv_folds: usize,
    pub seed: u64,
    pub params: BoostingParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("crop_yield.csv"),
            target: DEFAULT_TARGET.to_string(),
            test_fraction: DEFAULT_TEST_FRACTION,
            cv_folds: DEFAULT_CV_FOLDS,
            seed: DEFAULT_SEED,
            params: BoostingParams::crop_yield(),
        }
    }
}

impl TrainingConfig {
    /// Use one seed for both the split and the regressor
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.params.seed = seed;
        self
    }
}

/// Summary of a training run, persisted next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub target: String,
    pub dataset_rows: usize,
    pub input_fields: usize,
    pub encoded_columns: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub r2: f64,
    pub rmse: f64,
    pub cv_r2_scores: Vec<f64>,
    pub cv_r2_mean: f64,
    pub n_iter: usize,
    pub seed: u64,
    /// Range of the actual-vs-predicted reference diagonal
    pub diagonal: (f64, f64),
    pub trained_at: DateTime<Utc>,
    pub training_secs: f64,
}

/// One held-out row: actual target and prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeldOutPoint {
    pub actual: f64,
    pub predicted: f64,
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: GradientBoostingRegressor,
    pub schema: FeatureSchema,
    pub report: TrainingReport,
    pub held_out: Vec<HeldOutPoint>,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the configured CSV and train on it
    pub fn run(&self) -> Result<TrainedModel> {
        let dataset = Dataset::from_csv_path(&self.config.dataset_path)?;
        self.train(&dataset)
    }

    pub fn train(&self, dataset: &Dataset) -> Result<TrainedModel> {
        let start = Instant::now();
        let target = self.config.target.as_str();

        let y = target_vector(&dataset.target(target)?);
        let schema = FeatureSchema::fit(dataset, target)?;
        let x = schema.encode_dataset(dataset)?;
        info!(
            rows = x.n_rows(),
            input_fields = schema.features().len(),
            encoded_columns = x.n_cols(),
            "Encoded features"
        );

        if x.n_rows() < 2 {
            return Err(YieldError::InsufficientRows {
                purpose: "a train/test split",
                required: 2,
                actual: x.n_rows(),
            });
        }
        let (x_train, x_test, y_train, y_test) =
            train_test_split(&x, &y, self.config.test_fraction, Some(self.config.seed))
                .map_err(YieldError::InvalidParameter)?;

        let mut model = GradientBoostingRegressor::new(self.config.params.clone());
        model.fit(&x_train, &y_train)?;

        let y_pred = model.predict(&x_test)?;
        let r2 = f64::from(r_squared(&y_pred, &y_test));
        let rmse = f64::from(mse(&y_pred, &y_test)).sqrt();
        info!(r2, rmse, n_iter = model.n_iter(), "Held-out evaluation");

        let params = self.config.params.clone();
        let cv_r2_scores = cross_val_r2(
            || GradientBoostingRegressor::new(params.clone()),
            &x,
            &y,
            self.config.cv_folds,
        )?;
        let cv_r2_mean = cv_r2_scores.iter().sum::<f64>() / cv_r2_scores.len() as f64;
        info!(cv_r2_mean, folds = cv_r2_scores.len(), "Cross-validation");

        let held_out: Vec<HeldOutPoint> = y_test
            .as_slice()
            .iter()
            .zip(y_pred.as_slice())
            .map(|(&actual, &predicted)| HeldOutPoint {
                actual: f64::from(actual),
                predicted: f64::from(predicted),
            })
            .collect();
        let diagonal = held_out
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), point| {
                (lo.min(point.actual), hi.max(point.actual))
            });

        let report = TrainingReport {
            target: target.to_string(),
            dataset_rows: dataset.n_rows(),
            input_fields: schema.features().len(),
            encoded_columns: schema.n_columns(),
            train_rows: x_train.n_rows(),
            test_rows: x_test.n_rows(),
            r2,
            rmse,
            cv_r2_scores,
            cv_r2_mean,
            n_iter: model.n_iter(),
            seed: self.config.seed,
            diagonal,
            trained_at: Utc::now(),
            training_secs: start.elapsed().as_secs_f64(),
        };

        Ok(TrainedModel {
            model,
            schema,
            report,
            held_out,
        })
    }
}

/// R² of a fresh model on each of `folds` contiguous, unshuffled folds of
/// `(x, y)`
pub fn cross_val_r2<R, F>(
    make_model: F,
    x: &Matrix<f32>,
    y: &Vector<f32>,
    folds: usize,
) -> Result<Vec<f64>>
where
    R: Regressor,
    F: Fn() -> R,
{
    if folds < 2 {
        return Err(YieldError::InvalidParameter(format!(
            "cross-validation needs at least 2 folds, got {}",
            folds
        )));
    }
    if x.n_rows() < folds {
        return Err(YieldError::InsufficientRows {
            purpose: "cross-validation",
            required: folds,
            actual: x.n_rows(),
        });
    }

    KFold::new(folds)
        .split(x.n_rows())
        .into_iter()
        .enumerate()
        .map(|(fold, (train_idx, test_idx))| -> Result<f64> {
            let (x_train, y_train) = take_rows(x, y, &train_idx)?;
            let (x_test, y_test) = take_rows(x, y, &test_idx)?;
            let mut model = make_model();
            model.fit(&x_train, &y_train)?;
            let score = f64::from(r_squared(&model.predict(&x_test)?, &y_test));
            debug!(fold, r2 = score, "Cross-validation fold");
            Ok(score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    /// Yield grows linearly with rainfall; every other field is constant
    fn linear_csv(n: usize) -> String {
        let mut csv = String::from(
            "Region,Soil_Type,Crop,Rainfall_mm,Temperature_Celsius,Fertilizer_Used,\
             Irrigation_Used,Weather_Condition,Days_to_Harvest,Yield_tons_per_hectare\n",
        );
        for i in 0..n {
            let rainfall = 100.0 + (i * 37 % n) as f64 * 2.0;
            let yield_ = 0.01 * rainfall + 1.0;
            writeln!(
                csv,
                "North,Loamy,Wheat,{},25,True,False,Sunny,110,{}",
                rainfall, yield_
            )
            .unwrap();
        }
        csv
    }

    fn dataset(n: usize) -> Dataset {
        Dataset::from_reader(linear_csv(n).as_bytes(), "linear.csv").unwrap()
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig {
            params: BoostingParams::crop_yield()
                .with_max_iter(30)
                .with_learning_rate(0.3),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_linear_relationship_is_learned() {
        let trained = Trainer::new(fast_config()).train(&dataset(250)).unwrap();
        assert!(trained.report.r2 > 0.9, "r2 was {}", trained.report.r2);
        assert_eq!(trained.report.test_rows, 50);
        assert_eq!(trained.report.train_rows, 200);
        assert_eq!(trained.held_out.len(), 50);
    }

    #[test]
    fn test_report_counts_and_cv() {
        let trained = Trainer::new(fast_config()).train(&dataset(300)).unwrap();
        let report = &trained.report;

        assert_eq!(report.dataset_rows, 300);
        assert_eq!(report.input_fields, 9);
        // single-level categoricals contribute no columns
        assert_eq!(report.encoded_columns, 5);
        assert_eq!(report.cv_r2_scores.len(), DEFAULT_CV_FOLDS);
        assert!(report.diagonal.0 <= report.diagonal.1);
    }

    #[test]
    fn test_training_is_deterministic() {
        let ds = dataset(250);
        let a = Trainer::new(fast_config()).train(&ds).unwrap();
        let b = Trainer::new(fast_config()).train(&ds).unwrap();

        assert_eq!(a.schema.columns(), b.schema.columns());
        assert_eq!(a.report.r2, b.report.r2);
        assert_eq!(a.report.rmse, b.report.rmse);
        assert_eq!(a.report.cv_r2_scores, b.report.cv_r2_scores);
        assert_eq!(a.held_out, b.held_out);
    }

    #[test]
    fn test_missing_target_fails_fast() {
        let config = TrainingConfig {
            target: "Yield".to_string(),
            ..fast_config()
        };
        assert!(Trainer::new(config).train(&dataset(50)).is_err());
    }

    #[test]
    fn test_with_seed_sets_both_seeds() {
        let config = TrainingConfig::default().with_seed(7);
        assert_eq!(config.seed, 7);
        assert_eq!(config.params.seed, 7);
    }
}
