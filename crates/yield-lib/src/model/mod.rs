//! Regression models
//!
//! The trainer and front ends only see the [`Regressor`] trait, so the
//! boosting model can be swapped for any comparable regressor.

mod gbm;

pub use gbm::{BoostingParams, EarlyStopping, GradientBoostingRegressor, AUTO_EARLY_STOPPING_ROWS};

use crate::error::{Result, YieldError};
use aprender::primitives::{Matrix, Vector};

/// Trait for fit/predict regression implementations
pub trait Regressor: Send + Sync {
    /// Fit the model to rows of `x` and targets `y`
    fn fit(&mut self, x: &Matrix<f32>, y: &Vector<f32>) -> Result<()>;

    /// Predict every row of `x`
    fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>>;

    /// Number of input columns, once fitted
    fn n_features(&self) -> Option<usize>;

    /// Predict one row laid out like the training columns
    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let x = feature_matrix(row.to_vec(), 1, row.len())?;
        let predictions = self.predict(&x)?;
        predictions
            .as_slice()
            .first()
            .map(|&value| f64::from(value))
            .ok_or(YieldError::NotFitted)
    }
}

/// Row-major `f64` values as the `f32` matrix the regressors train on
pub fn feature_matrix(data: Vec<f64>, n_rows: usize, n_cols: usize) -> Result<Matrix<f32>> {
    let data: Vec<f32> = data.into_iter().map(|v| v as f32).collect();
    Matrix::from_vec(n_rows, n_cols, data).map_err(|e| {
        YieldError::InvalidParameter(format!("{} ({}x{} matrix)", e, n_rows, n_cols))
    })
}

/// `f64` targets as an aprender vector
pub fn target_vector(values: &[f64]) -> Vector<f32> {
    Vector::from_vec(values.iter().map(|&v| v as f32).collect())
}

/// New matrix and target vector holding the given rows, in the given order
pub fn take_rows(
    x: &Matrix<f32>,
    y: &Vector<f32>,
    indices: &[usize],
) -> Result<(Matrix<f32>, Vector<f32>)> {
    let n_cols = x.n_cols();
    let mut data = Vec::with_capacity(indices.len() * n_cols);
    let mut targets = Vec::with_capacity(indices.len());
    for &row in indices {
        data.extend((0..n_cols).map(|col| x.get(row, col)));
        targets.push(y.as_slice()[row]);
    }
    let x = Matrix::from_vec(indices.len(), n_cols, data)
        .map_err(|e| YieldError::InvalidParameter(e.to_string()))?;
    Ok((x, Vector::from_vec(targets)))
}
