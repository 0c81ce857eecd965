//! Error types for dataset loading, training and prediction

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, YieldError>;

#[derive(Debug, Error)]
pub enum YieldError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to (de)serialize {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("column '{column}' not found (available: {available:?})")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("target column '{0}' is not numeric")]
    NonNumericTarget(String),

    #[error("dataset is empty after dropping rows with missing values")]
    EmptyDataset,

    #[error("need at least {required} rows for {purpose}, got {actual}")]
    InsufficientRows {
        purpose: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("feature vector has {actual} columns, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("persisted column schema does not match the feature definitions: {0}")]
    StaleSchema(String),

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("model has not been fitted")]
    NotFitted,

    #[error("regressor failed: {0}")]
    Model(#[from] aprender::AprenderError),
}

impl YieldError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            what: what.into(),
            source,
        }
    }
}
