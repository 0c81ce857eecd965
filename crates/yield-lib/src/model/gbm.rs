//! Gradient boosting for regression
//!
//! Fits an additive ensemble of aprender CART trees to the squared-error
//! residuals of the running prediction:
//!
//! 1. Start every row at the mean target (the baseline)
//! 2. For each iteration, fit one tree to the residuals `y - prediction` and
//!    add its shrunken output to the prediction
//! 3. Optionally stop once a held-out validation loss stops improving

use super::Regressor;
use crate::error::{Result, YieldError};
use aprender::metrics::mse;
use aprender::model_selection::train_test_split;
use aprender::primitives::{Matrix, Vector};
use aprender::tree::DecisionTreeRegressor;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Row count above which `EarlyStopping::Auto` turns early stopping on
pub const AUTO_EARLY_STOPPING_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    Auto,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub max_iter: usize,
    pub learning_rate: f32,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub early_stopping: EarlyStopping,
    pub validation_fraction: f32,
    pub n_iter_no_change: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            learning_rate: 0.1,
            max_depth: Some(3),
            min_samples_leaf: 20,
            early_stopping: EarlyStopping::Auto,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-7,
            seed: 0,
        }
    }
}

impl BoostingParams {
    /// Hyperparameters used to train the crop yield model
    pub fn crop_yield() -> Self {
        Self {
            max_iter: 150,
            learning_rate: 0.1,
            max_depth: Some(8),
            seed: 42,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_early_stopping(mut self, early_stopping: EarlyStopping) -> Self {
        self.early_stopping = early_stopping;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(YieldError::InvalidParameter(msg));
        if self.max_iter == 0 {
            return invalid("max_iter must be at least 1".into());
        }
        if !(self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.max_depth == Some(0) {
            return invalid("max_depth must be at least 1".into());
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf must be at least 1".into());
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return invalid(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            ));
        }
        Ok(())
    }

    fn tree(&self) -> DecisionTreeRegressor {
        let tree = DecisionTreeRegressor::new()
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_min_samples_split(2 * self.min_samples_leaf);
        match self.max_depth {
            Some(depth) => tree.with_max_depth(depth),
            None => tree,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
    baseline: f32,
    trees: Vec<DecisionTreeRegressor>,
    n_features: Option<usize>,
    /// Validation losses per iteration when early stopping ran
    validation_losses: Vec<f64>,
}

impl GradientBoostingRegressor {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            baseline: 0.0,
            trees: Vec::new(),
            n_features: None,
            validation_losses: Vec::new(),
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_iter(&self) -> usize {
        self.trees.len()
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn validation_losses(&self) -> &[f64] {
        &self.validation_losses
    }

    fn uses_early_stopping(&self, n_rows: usize) -> bool {
        match self.params.early_stopping {
            EarlyStopping::Auto => n_rows > AUTO_EARLY_STOPPING_ROWS,
            EarlyStopping::Enabled => true,
            EarlyStopping::Disabled => false,
        }
    }

    /// True when none of the last `n_iter_no_change` losses beat the loss
    /// just before them by more than `tol`
    fn should_stop(&self) -> bool {
        let n = self.params.n_iter_no_change;
        let losses = &self.validation_losses;
        if n == 0 || losses.len() <= n {
            return false;
        }
        let reference = losses[losses.len() - n - 1] - self.params.tol;
        !losses[losses.len() - n..].iter().any(|&l| l < reference)
    }

    /// Check a persisted model is internally consistent
    pub fn validate_fitted(&self) -> Result<()> {
        self.n_features.ok_or(YieldError::NotFitted)?;
        if !self.baseline.is_finite() {
            return Err(YieldError::InvalidParameter(format!(
                "baseline prediction is not finite: {}",
                self.baseline
            )));
        }
        self.params.validate()
    }

    /// Add the shrunken output of `tree` to `raw`
    fn accumulate(&self, tree: &DecisionTreeRegressor, x: &Matrix<f32>, raw: &mut [f32]) {
        let update = tree.predict(x);
        for (value, step) in raw.iter_mut().zip(update.as_slice()) {
            *value += self.params.learning_rate * step;
        }
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()> {
        self.params.validate()?;
        let (n_rows, n_cols) = x.shape();
        if n_rows != y.len() {
            return Err(YieldError::ShapeMismatch {
                expected: n_rows,
                actual: y.len(),
            });
        }
        if n_rows == 0 {
            return Err(YieldError::InsufficientRows {
                purpose: "fitting",
                required: 1,
                actual: 0,
            });
        }

        let early_stopping = self.uses_early_stopping(n_rows);
        let (x_train, x_val, y_train, y_val) = if early_stopping {
            let (x_train, x_val, y_train, y_val) = train_test_split(
                x,
                y,
                self.params.validation_fraction,
                Some(self.params.seed),
            )
            .map_err(YieldError::InvalidParameter)?;
            (x_train, Some(x_val), y_train, Some(y_val))
        } else {
            (x.clone(), None, y.clone(), None)
        };

        let targets = y_train.as_slice();
        self.baseline = targets.iter().sum::<f32>() / targets.len() as f32;
        self.trees = Vec::with_capacity(self.params.max_iter);
        self.n_features = Some(n_cols);
        self.validation_losses.clear();

        let mut raw = vec![self.baseline; targets.len()];
        let mut val_raw = vec![self.baseline; y_val.as_ref().map_or(0, |v| v.len())];
        if let Some(y_val) = &y_val {
            self.validation_losses
                .push(f64::from(mse(&Vector::from_slice(&val_raw), y_val)));
        }

        for iteration in 0..self.params.max_iter {
            let residuals: Vec<f32> = targets.iter().zip(&raw).map(|(t, p)| t - p).collect();
            if residuals.iter().all(|r| r.abs() <= f32::EPSILON) {
                debug!(iteration, "Residuals vanished");
                break;
            }

            let mut tree = self.params.tree();
            tree.fit(&x_train, &Vector::from_vec(residuals))?;
            self.accumulate(&tree, &x_train, &mut raw);

            if let (Some(x_val), Some(y_val)) = (&x_val, &y_val) {
                self.accumulate(&tree, x_val, &mut val_raw);
                self.validation_losses
                    .push(f64::from(mse(&Vector::from_slice(&val_raw), y_val)));
            }
            self.trees.push(tree);

            if early_stopping && self.should_stop() {
                info!(
                    iteration = iteration + 1,
                    validation_loss = self.validation_losses.last().copied().unwrap_or(f64::NAN),
                    "Early stopping"
                );
                break;
            }
        }

        debug!(
            n_iter = self.trees.len(),
            train_loss = mse(&Vector::from_slice(&raw), &y_train),
            "Boosting finished"
        );
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        let n_features = self.n_features.ok_or(YieldError::NotFitted)?;
        if x.n_cols() != n_features {
            return Err(YieldError::ShapeMismatch {
                expected: n_features,
                actual: x.n_cols(),
            });
        }
        let mut raw = vec![self.baseline; x.n_rows()];
        for tree in &self.trees {
            self.accumulate(tree, x, &mut raw);
        }
        Ok(Vector::from_vec(raw))
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
