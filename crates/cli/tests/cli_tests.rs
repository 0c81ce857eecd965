//! CLI integration tests

use std::fmt::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn crop_yield(args: &[&str], home: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crop-yield"))
        .args(args)
        .env("HOME", home)
        .env_remove("CROP_YIELD_DATA")
        .env_remove("CROP_YIELD_MODEL_DIR")
        .output()
        .expect("Failed to execute command")
}

/// A small dataset covering the levels used by the example record
fn write_dataset(dir: &Path) -> String {
    let regions = ["North", "South", "East", "West"];
    let soils = ["Loamy", "Sandy", "Clay", "Silt"];
    let crops = ["Wheat", "Rice", "Maize"];
    let weather = ["Sunny", "Rainy", "Cloudy"];
    let mut csv = String::from(
        "Region,Soil_Type,Crop,Rainfall_mm,Temperature_Celsius,Fertilizer_Used,\
         Irrigation_Used,Weather_Condition,Days_to_Harvest,Yield_tons_per_hectare\n",
    );
    for i in 0..240 {
        let rainfall = 100.0 + (i * 11 % 240) as f64 * 3.5;
        let fertilizer = i % 2 == 0;
        let irrigation = i % 3 == 0;
        let yield_ = 0.5
            + rainfall / 200.0
            + if fertilizer { 1.2 } else { 0.0 }
            + if irrigation { 0.8 } else { 0.0 };
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{}",
            regions[i % 4],
            soils[i % 4],
            crops[i % 3],
            rainfall,
            15 + i % 20,
            if fertilizer { "True" } else { "False" },
            if irrigation { "True" } else { "False" },
            weather[i % 3],
            80 + i % 60,
            yield_
        )
        .unwrap();
    }
    let path = dir.join("crop_yield.csv");
    std::fs::write(&path, csv).unwrap();
    path.to_string_lossy().into_owned()
}

fn train(dir: &TempDir) -> String {
    let data = write_dataset(dir.path());
    let model_dir = dir.path().join("artifacts").to_string_lossy().into_owned();
    let output = crop_yield(
        &["train", "--data", &data, "--output-dir", &model_dir],
        dir.path(),
    );
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    model_dir
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = crop_yield(&["--help"], dir.path());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Crop Yield Predictor"), "Should show app name");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("schema"), "Should show schema command");
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    let output = crop_yield(&["--version"], dir.path());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("crop-yield"), "Should show binary name");
}

#[test]
fn test_train_help_lists_options() {
    let dir = TempDir::new().unwrap();
    let output = crop_yield(&["train", "--help"], dir.path());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("--data"));
    assert!(stdout.contains("--output-dir"));
    assert!(stdout.contains("--target"));
    assert!(stdout.contains("--seed"));
}

#[test]
fn test_train_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let model_dir = train(&dir);

    for file in [
        "crop_yield_model.json",
        "model_columns.json",
        "manifest.json",
        "training_report.json",
        "actual_vs_predicted.csv",
    ] {
        assert!(
            Path::new(&model_dir).join(file).exists(),
            "{} should be written",
            file
        );
    }

    let columns: Vec<String> = serde_json::from_str(
        &std::fs::read_to_string(Path::new(&model_dir).join("model_columns.json")).unwrap(),
    )
    .unwrap();
    assert!(columns.contains(&"Region_West".to_string()));
    assert!(!columns.contains(&"Region_East".to_string()));
}

#[test]
fn test_train_json_output() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(dir.path());
    let model_dir = dir.path().join("out").to_string_lossy().into_owned();
    let output = crop_yield(
        &[
            "train",
            "--data",
            &data,
            "--output-dir",
            &model_dir,
            "--format",
            "json",
        ],
        dir.path(),
    );
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["report"]["dataset_rows"], 240);
    assert_eq!(report["report"]["test_rows"], 48);
    assert_eq!(report["report"]["cv_r2_scores"].as_array().unwrap().len(), 5);
    assert!(report["model_version"].is_string());
}

#[test]
fn test_predict_prints_single_line() {
    let dir = TempDir::new().unwrap();
    let model_dir = train(&dir);

    let output = crop_yield(&["predict", "--model-dir", &model_dir], dir.path());
    assert!(
        output.status.success(),
        "predict failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let value = lines[0]
        .strip_prefix("Predicted Yield (tons per hectare): ")
        .expect("prediction line prefix");
    let value: f64 = value.parse().unwrap();
    assert!(value.is_finite());
}

#[test]
fn test_predict_without_model_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nothing-here").to_string_lossy().into_owned();

    let output = crop_yield(&["predict", "--model-dir", &missing], dir.path());
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_train_missing_target_fails() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(dir.path());
    let model_dir = dir.path().join("out").to_string_lossy().into_owned();

    let output = crop_yield(
        &[
            "train",
            "--data",
            &data,
            "--output-dir",
            &model_dir,
            "--target",
            "Yield",
        ],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(!Path::new(&model_dir).join("crop_yield_model.json").exists());
}

#[test]
fn test_schema_json_matches_column_file() {
    let dir = TempDir::new().unwrap();
    let model_dir = train(&dir);

    let output = crop_yield(
        &["schema", "--model-dir", &model_dir, "--format", "json"],
        dir.path(),
    );
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let columns: Vec<String> = serde_json::from_str(
        &std::fs::read_to_string(Path::new(&model_dir).join("model_columns.json")).unwrap(),
    )
    .unwrap();

    assert_eq!(rows.len(), columns.len());
    for (row, column) in rows.iter().zip(&columns) {
        assert_eq!(row["column"], column.as_str());
    }
    assert_eq!(rows[0]["kind"], "numeric");
}
