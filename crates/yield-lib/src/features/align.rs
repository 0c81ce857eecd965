//! Reshapes inference records to the training column layout
//!
//! A single record cannot reproduce every category level seen in training,
//! so its encoding is reconciled against the schema: known columns are
//! copied, absent ones are zero-filled and unknown ones are dropped.

use super::schema::{indicator_column, FeatureDef, FeatureSchema};
use crate::error::Result;
use crate::model::feature_matrix;
use crate::models::{FeatureVector, FieldValue, RawRecord};
use aprender::primitives::Matrix;
use tracing::debug;

/// Named columns produced by encoding a record, before alignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRow {
    columns: Vec<(String, f64)>,
}

impl EncodedRow {
    pub fn push(&mut self, column: impl Into<String>, value: f64) {
        self.columns.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One-hot encode a record without any knowledge of the training levels.
///
/// Numeric and boolean values keep their field name; each text value becomes
/// a `<field>_<value>` indicator set to 1. Indicators follow the plain
/// columns.
pub fn one_hot(record: &RawRecord) -> EncodedRow {
    let mut row = EncodedRow::default();
    for (field, value) in record.iter() {
        if let Some(number) = value.as_number() {
            row.push(field, number);
        }
    }
    for (field, value) in record.iter() {
        if let FieldValue::Text(level) = value {
            row.push(indicator_column(field, level), 1.0);
        }
    }
    row
}

impl FeatureSchema {
    /// Reindex an encoded row to the schema: missing columns become 0,
    /// columns the schema does not know are dropped
    pub fn align(&self, encoded: &EncodedRow) -> FeatureVector {
        let values = self
            .columns()
            .iter()
            .map(|column| encoded.get(column).unwrap_or(0.0))
            .collect();

        let dropped: Vec<&str> = encoded
            .names()
            .filter(|name| self.column_index(name).is_none())
            .collect();
        if !dropped.is_empty() {
            debug!(columns = ?dropped, "Dropped columns unknown to the training schema");
        }

        FeatureVector { values }
    }

    /// Encode and align a record by direct lookup in the feature
    /// definitions.
    ///
    /// Gives the same vector as `align(&one_hot(record))` for records keyed
    /// by training input fields. Only a categorical field can fire its
    /// indicators.
    pub fn align_record(&self, record: &RawRecord) -> FeatureVector {
        let mut values = vec![0.0; self.n_columns()];

        for feature in self.features() {
            let Some(value) = record.get(feature.name()) else {
                continue;
            };
            match feature {
                FeatureDef::Numeric { name } => match value.as_number() {
                    Some(number) => {
                        if let Some(col) = self.column_index(name) {
                            values[col] = number;
                        }
                    }
                    None => debug!(field = %name, "Text value for numeric field, zero-filled"),
                },
                FeatureDef::Categorical { name, .. } => {
                    let Some(level) = value.as_text() else {
                        debug!(field = %name, "Non-text value for categorical field ignored");
                        continue;
                    };
                    // the reference level and unseen levels have no column
                    if let Some(col) = self.column_index(&indicator_column(name, level)) {
                        values[col] = 1.0;
                    }
                }
            }
        }

        FeatureVector { values }
    }

    /// Align several records into a matrix, one row per record
    pub fn align_batch(&self, records: &[RawRecord]) -> Result<Matrix<f32>> {
        let n_cols = self.n_columns();
        let mut data = Vec::with_capacity(records.len() * n_cols);
        for record in records {
            data.extend(self.align_record(record).values);
        }
        feature_matrix(data, records.len(), n_cols)
    }

    /// Attach column names to an aligned vector
    pub fn label(&self, vector: &FeatureVector) -> EncodedRow {
        let mut row = EncodedRow::default();
        for (column, value) in self.columns().iter().zip(&vector.values) {
            row.push(column.as_str(), *value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Schema shaped like the crop yield training set
    fn crop_schema() -> FeatureSchema {
        let categorical = |name: &str, levels: &[&str]| FeatureDef::Categorical {
            name: name.to_string(),
            levels: levels.iter().map(|l| l.to_string()).collect(),
        };
        let numeric = |name: &str| FeatureDef::Numeric {
            name: name.to_string(),
        };
        FeatureSchema::from_features(vec![
            categorical("Region", &["East", "North", "South", "West"]),
            categorical("Soil_Type", &["Chalky", "Clay", "Loamy", "Peaty", "Sandy", "Silt"]),
            categorical("Crop", &["Barley", "Cotton", "Maize", "Rice", "Soybean", "Wheat"]),
            numeric("Rainfall_mm"),
            numeric("Temperature_Celsius"),
            numeric("Fertilizer_Used"),
            numeric("Irrigation_Used"),
            categorical("Weather_Condition", &["Cloudy", "Rainy", "Sunny"]),
            numeric("Days_to_Harvest"),
        ])
    }

    fn example_record() -> RawRecord {
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

    fn indicator_columns(schema: &FeatureSchema) -> Vec<usize> {
        let numeric: Vec<&str> = schema
            .features()
            .iter()
            .filter(|f| !f.is_categorical())
            .map(|f| f.name())
            .collect();
        (0..schema.n_columns())
            .filter(|&i| !numeric.contains(&schema.columns()[i].as_str()))
            .collect()
    }

    #[test]
    fn test_one_hot_expands_text_fields() {
        let record = RawRecord::new()
            .with("Crop", "Wheat")
            .with("Rainfall_mm", 120.0)
            .with("Irrigation_Used", true);
        let encoded = one_hot(&record);

        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded.get("Crop_Wheat"), Some(1.0));
        assert_eq!(encoded.get("Rainfall_mm"), Some(120.0));
        assert_eq!(encoded.get("Irrigation_Used"), Some(1.0));
        assert_eq!(encoded.get("Crop"), None);
    }

    #[test]
    fn test_full_record_sets_one_indicator_per_field() {
        let schema = crop_schema();
        let vector = schema.align_record(&example_record());
        let labeled = schema.label(&vector);

        assert_eq!(vector.len(), schema.n_columns());
        assert_eq!(labeled.get("Region_North"), Some(1.0));
        assert_eq!(labeled.get("Soil_Type_Loamy"), Some(1.0));
        assert_eq!(labeled.get("Crop_Wheat"), Some(1.0));
        assert_eq!(labeled.get("Weather_Condition_Sunny"), Some(1.0));
        assert_eq!(labeled.get("Rainfall_mm"), Some(120.0));
        assert_eq!(labeled.get("Days_to_Harvest"), Some(110.0));

        let active: f64 = indicator_columns(&schema)
            .iter()
            .map(|&i| vector.values[i])
            .sum();
        assert_eq!(active, 4.0);
    }

    #[test]
    fn test_reference_level_fires_nothing() {
        let schema = crop_schema();
        let record = RawRecord::new().with("Region", "East").with("Crop", "Barley");
        let vector = schema.align_record(&record);
        assert!(vector.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_output_columns_match_schema_for_any_subset() {
        let schema = crop_schema();
        let full = example_record();
        let fields: Vec<&str> = full.iter().map(|(name, _)| name).collect();

        // every subset of the nine fields
        for mask in 0u32..(1 << fields.len()) {
            let mut record = RawRecord::new();
            for (bit, field) in fields.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    record.insert(*field, full.get(field).cloned().unwrap());
                }
            }

            let vector = schema.align_record(&record);
            assert_eq!(vector.len(), schema.n_columns());
            let labeled = schema.label(&vector);
            assert!(labeled.names().eq(schema.columns().iter().map(String::as_str)));
        }
    }

    #[test]
    fn test_lookup_matches_encode_then_reindex() {
        let schema = crop_schema();
        let records = vec![
            example_record(),
            RawRecord::new().with("Region", "South").with("Rainfall_mm", 300.0),
            RawRecord::new().with("Crop", "Quinoa").with("Days_to_Harvest", 90.0),
            RawRecord::new()
                .with("Rainfall_mm", "heavy")
                .with("Soil_Type", 3.0)
                .with("Irrigation_Used", false),
            RawRecord::new(),
        ];
        for record in &records {
            assert_eq!(schema.align_record(record), schema.align(&one_hot(record)));
        }
    }

    #[test]
    fn test_align_is_idempotent() {
        let schema = crop_schema();
        let once = schema.align_record(&example_record());
        let twice = schema.align(&schema.label(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let schema = crop_schema();
        let mut encoded = EncodedRow::default();
        encoded.push("Rainfall_mm", 80.0);
        encoded.push("Crop_Quinoa", 1.0);
        encoded.push("Elevation_m", 1200.0);

        let labeled = schema.label(&schema.align(&encoded));
        assert_eq!(labeled.len(), schema.n_columns());
        assert_eq!(labeled.get("Rainfall_mm"), Some(80.0));
        assert_eq!(labeled.get("Crop_Quinoa"), None);
        assert_eq!(labeled.get("Elevation_m"), None);
    }

    #[test]
    fn test_numeric_only_record_zero_fills_indicators() {
        let schema = crop_schema();
        let record = RawRecord::new()
            .with("Rainfall", 50.0)
            .with("Temperature", 20.0)
            .with("Fertilizer", 10.0);
        let vector = schema.align_record(&record);

        assert_eq!(vector.len(), schema.n_columns());
        for i in indicator_columns(&schema) {
            assert_eq!(vector.values[i], 0.0, "{} should be 0", schema.columns()[i]);
        }
        assert_eq!(schema.align(&one_hot(&record)), vector);
    }

    #[test]
    fn test_align_batch() {
        let schema = crop_schema();
        let batch = schema
            .align_batch(&[example_record(), RawRecord::new()])
            .unwrap();
        assert_eq!(batch.n_rows(), 2);
        assert_eq!(batch.n_cols(), schema.n_columns());
        assert!(batch.row(1).as_slice().iter().all(|v| *v == 0.0));
    }
}
