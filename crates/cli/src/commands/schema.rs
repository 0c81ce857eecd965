//! `schema`: list the training columns a saved model expects

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use yield_lib::{ArtifactStore, FeatureDef, FeatureSchema};

use crate::output::{print_info, print_json, print_table, OutputFormat};

#[derive(Debug, Tabled, Serialize)]
struct ColumnRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Column")]
    column: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Kind")]
    kind: &'static str,
}

/// One row per training column, in model order
fn column_rows(schema: &FeatureSchema) -> Vec<ColumnRow> {
    let mut rows: Vec<ColumnRow> = schema
        .features()
        .iter()
        .flat_map(|feature| match feature {
            FeatureDef::Numeric { name } => vec![(name.clone(), name.clone(), "numeric")],
            FeatureDef::Categorical { name, .. } => feature
                .encoded_levels()
                .iter()
                .map(|level| {
                    (
                        yield_lib::features::indicator_column(name, level),
                        name.clone(),
                        "indicator",
                    )
                })
                .collect(),
        })
        .filter_map(|(column, field, kind)| {
            schema.column_index(&column).map(|index| ColumnRow {
                index,
                column,
                field,
                kind,
            })
        })
        .collect();
    rows.sort_by_key(|row| row.index);
    rows
}

pub fn run(model_dir: &Path, format: OutputFormat) -> Result<()> {
    let loaded = ArtifactStore::new(model_dir)
        .load()
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
    let rows = column_rows(&loaded.schema);

    match format {
        OutputFormat::Table => {
            print_table(&rows);
            for feature in loaded.schema.features() {
                if let Some(reference) = feature.reference_level() {
                    print_info(&format!(
                        "{} reference level '{}' is encoded as all zeros",
                        feature.name(),
                        reference
                    ));
                }
            }
        }
        OutputFormat::Json => print_json(&rows)?,
    }
    Ok(())
}
