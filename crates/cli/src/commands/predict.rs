//! `predict`: run the built-in example record through the saved model

use anyhow::{Context, Result};
use std::path::Path;
use yield_lib::{RawRecord, YieldPredictor};

/// The example farm: a northern wheat plot on loamy soil
pub fn example_record() -> RawRecord {
    RawRecord::new()
        .with("Region", "North")
        .with("Soil_Type", "Loamy")
        .with("Crop", "Wheat")
        .with("Rainfall_mm", 120.0)
        .with("Temperature_Celsius", 25.0)
        .with("Fertilizer_Used", 1.0)
        .with("Irrigation_Used", 1.0)
        .with("Weather_Condition", "Sunny")
        .with("Days_to_Harvest", 110.0)
}

/// Output line; whole-number yields still print with a decimal point
pub fn prediction_line(predicted_yield: f64) -> String {
    format!("Predicted Yield (tons per hectare): {:?}", predicted_yield)
}

pub fn run(model_dir: &Path) -> Result<()> {
    let predictor = YieldPredictor::load(model_dir)
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;

    let outcome = predictor
        .predict(&example_record())
        .context("Prediction failed")?;

    println!("{}", prediction_line(outcome.predicted_yield));
    Ok(())
}
