//! Feature encoding shared by training and inference
//!
//! Training derives a [`FeatureSchema`] from the dataset; every later
//! prediction reshapes its input through the same schema.

mod align;
mod schema;

pub use align::{one_hot, EncodedRow};
pub use schema::{indicator_column, FeatureDef, FeatureSchema};
