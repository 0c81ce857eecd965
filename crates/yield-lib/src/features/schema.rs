//! Training column schema
//!
//! Records, per input field, how it was encoded at training time and the
//! exact ordered list of model columns that encoding produced.

use crate::dataset::{ColumnData, Dataset};
use crate::error::{Result, YieldError};
use crate::model::feature_matrix;
use crate::models::RawRecord;
use aprender::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Encoding rule for one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeatureDef {
    Numeric {
        name: String,
    },
    /// `levels` is sorted; `levels[0]` is the dropped reference level
    Categorical {
        name: String,
        levels: Vec<String>,
    },
}

impl FeatureDef {
    pub fn name(&self) -> &str {
        match self {
            FeatureDef::Numeric { name } | FeatureDef::Categorical { name, .. } => name,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureDef::Categorical { .. })
    }

    pub fn reference_level(&self) -> Option<&str> {
        match self {
            FeatureDef::Categorical { levels, .. } => levels.first().map(String::as_str),
            FeatureDef::Numeric { .. } => None,
        }
    }

    /// Levels that get their own indicator column
    pub fn encoded_levels(&self) -> &[String] {
        match self {
            FeatureDef::Categorical { levels, .. } if !levels.is_empty() => &levels[1..],
            _ => &[],
        }
    }
}

/// Name of the indicator column for `field == level`
pub fn indicator_column(field: &str, level: &str) -> String {
    format!("{}_{}", field, level)
}

/// Feature definitions plus the ordered column list they produce
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    features: Vec<FeatureDef>,
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Derive the schema from a training dataset
    pub fn fit(dataset: &Dataset, target: &str) -> Result<Self> {
        if dataset.column(target).is_none() {
            return Err(YieldError::MissingColumn {
                column: target.to_string(),
                available: dataset.column_names(),
            });
        }

        let features = dataset
            .features(target)
            .map(|column| match &column.data {
                ColumnData::Numeric(_) => FeatureDef::Numeric {
                    name: column.name.clone(),
                },
                ColumnData::Categorical(values) => {
                    let levels: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                    FeatureDef::Categorical {
                        name: column.name.clone(),
                        levels: levels.into_iter().map(str::to_string).collect(),
                    }
                }
            })
            .collect();

        Ok(Self::from_features(features))
    }

    pub fn from_features(features: Vec<FeatureDef>) -> Self {
        let columns = derive_columns(&features);
        let index = build_index(&columns);
        Self {
            features,
            columns,
            index,
        }
    }

    /// Rebuild a persisted schema, checking the column list still matches
    /// what the definitions produce
    pub fn new(features: Vec<FeatureDef>, columns: Vec<String>) -> Result<Self> {
        let derived = derive_columns(&features);
        if derived != columns {
            let detail = match derived.iter().zip(&columns).position(|(a, b)| a != b) {
                Some(i) => format!(
                    "column {} is '{}' but the definitions give '{}'",
                    i, columns[i], derived[i]
                ),
                None => format!(
                    "{} persisted columns, definitions give {}",
                    columns.len(),
                    derived.len()
                ),
            };
            return Err(YieldError::StaleSchema(detail));
        }
        Ok(Self::from_features(features))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn features(&self) -> &[FeatureDef] {
        &self.features
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(FeatureDef::name)
    }

    /// Training input fields the record does not provide
    pub fn missing_fields(&self, record: &RawRecord) -> Vec<String> {
        self.field_names()
            .filter(|name| !record.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Encode every row of a dataset into the schema's column layout
    pub fn encode_dataset(&self, dataset: &Dataset) -> Result<Matrix<f32>> {
        let n_rows = dataset.n_rows();
        let n_cols = self.n_columns();
        let mut data = vec![0.0; n_rows * n_cols];

        for feature in &self.features {
            let column = dataset
                .column(feature.name())
                .ok_or_else(|| YieldError::MissingColumn {
                    column: feature.name().to_string(),
                    available: dataset.column_names(),
                })?;

            match (feature, &column.data) {
                (FeatureDef::Numeric { name }, ColumnData::Numeric(values)) => {
                    let col = self.index[name];
                    for (row, value) in values.iter().enumerate() {
                        data[row * n_cols + col] = *value;
                    }
                }
                (FeatureDef::Categorical { name, .. }, ColumnData::Categorical(values)) => {
                    for (row, value) in values.iter().enumerate() {
                        if let Some(&col) = self.index.get(&indicator_column(name, value)) {
                            data[row * n_cols + col] = 1.0;
                        }
                    }
                }
                _ => {
                    return Err(YieldError::StaleSchema(format!(
                        "field '{}' changed type since training",
                        feature.name()
                    )))
                }
            }
        }

        feature_matrix(data, n_rows, n_cols)
    }
}

/// Numeric columns first in field order, then indicator columns grouped by
/// field
fn derive_columns(features: &[FeatureDef]) -> Vec<String> {
    let numeric = features
        .iter()
        .filter(|f| !f.is_categorical())
        .map(|f| f.name().to_string());
    let indicators = features.iter().flat_map(|f| {
        f.encoded_levels()
            .iter()
            .map(move |level| indicator_column(f.name(), level))
    });
    numeric.chain(indicators).collect()
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        index.entry(column.clone()).or_insert(i);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Region,Rainfall_mm,Crop,Irrigation_Used,Yield_tons_per_hectare
West,100,Wheat,True,3.0
East,200,Rice,False,4.0
North,150,Wheat,True,5.0
";

    fn dataset() -> Dataset {
        Dataset::from_reader(SAMPLE.as_bytes(), "sample.csv").unwrap()
    }

    #[test]
    fn test_fit_orders_numeric_before_indicators() {
        let schema = FeatureSchema::fit(&dataset(), "Yield_tons_per_hectare").unwrap();
        assert_eq!(
            schema.columns(),
            &[
                "Rainfall_mm",
                "Irrigation_Used",
                "Region_North",
                "Region_West",
                "Crop_Wheat",
            ]
        );
    }

    #[test]
    fn test_fit_drops_first_sorted_level() {
        let schema = FeatureSchema::fit(&dataset(), "Yield_tons_per_hectare").unwrap();
        let region = &schema.features()[0];
        assert_eq!(region.name(), "Region");
        assert_eq!(region.reference_level(), Some("East"));
        assert_eq!(region.encoded_levels(), &["North", "West"]);
    }

    #[test]
    fn test_encode_dataset() {
        let ds = dataset();
        let schema = FeatureSchema::fit(&ds, "Yield_tons_per_hectare").unwrap();
        let x = schema.encode_dataset(&ds).unwrap();

        assert_eq!(x.n_rows(), 3);
        assert_eq!(x.row(0).as_slice(), &[100.0, 1.0, 0.0, 1.0, 1.0]);
        // East is the reference level, Rice the reference crop
        assert_eq!(x.row(1).as_slice(), &[200.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(x.row(2).as_slice(), &[150.0, 1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fit_requires_target() {
        let err = FeatureSchema::fit(&dataset(), "Yield").unwrap_err();
        assert!(matches!(err, YieldError::MissingColumn { .. }));
    }

    #[test]
    fn test_new_detects_stale_columns() {
        let schema = FeatureSchema::fit(&dataset(), "Yield_tons_per_hectare").unwrap();
        let mut columns = schema.columns().to_vec();
        columns.swap(2, 3);

        let err = FeatureSchema::new(schema.features().to_vec(), columns).unwrap_err();
        assert!(matches!(err, YieldError::StaleSchema(_)));

        let ok = FeatureSchema::new(schema.features().to_vec(), schema.columns().to_vec());
        assert!(ok.is_ok());
    }

    #[test]
    fn test_single_level_field_has_no_columns() {
        let schema = FeatureSchema::from_features(vec![
            FeatureDef::Numeric {
                name: "Days_to_Harvest".into(),
            },
            FeatureDef::Categorical {
                name: "Soil_Type".into(),
                levels: vec!["Loamy".into()],
            },
        ]);
        assert_eq!(schema.columns(), &["Days_to_Harvest"]);
    }

    #[test]
    fn test_missing_fields() {
        let schema = FeatureSchema::fit(&dataset(), "Yield_tons_per_hectare").unwrap();
        let record = RawRecord::new().with("Rainfall_mm", 50.0).with("Crop", "Rice");
        assert_eq!(schema.missing_fields(&record), vec!["Region", "Irrigation_Used"]);
    }
}
