//! Crop yield regression library
//!
//! This crate provides the core functionality for:
//! - Loading the crop yield CSV and one-hot encoding its categorical fields
//! - Training a gradient-boosting regressor and evaluating it
//! - Persisting the model with its ordered training column list
//! - Aligning partial or noisy input records to that column list for prediction
//! - Health checks and observability for the serving front ends

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod features;
pub mod health;
pub mod model;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use artifacts::{ArtifactStore, LoadedArtifacts, Manifest, DEFAULT_ARTIFACT_DIR};
pub use dataset::{Dataset, DEFAULT_TARGET};
pub use error::{Result, YieldError};
pub use features::{FeatureDef, FeatureSchema};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, YieldMetrics};
pub use predictor::{InferenceStats, YieldPredictor};
pub use training::{Trainer, TrainedModel, TrainingConfig, TrainingReport};
