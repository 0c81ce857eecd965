//! Model training and evaluation

mod pipeline;

pub use pipeline::{
    cross_val_r2, HeldOutPoint, TrainedModel, Trainer, TrainingConfig, TrainingReport,
    DEFAULT_CV_FOLDS, DEFAULT_SEED, DEFAULT_TEST_FRACTION,
};
