//! Tabular dataset loading
//!
//! Reads a CSV file, infers which columns are numeric and which are
//! categorical, and drops every row that has a missing cell.

use crate::error::{Result, YieldError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Target column of the crop yield dataset
pub const DEFAULT_TARGET: &str = "Yield_tons_per_hectare";

/// Cell contents treated as missing, matched exactly after trimming
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnData::Categorical(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A fully typed, complete (no missing cells) table
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Load a dataset from a CSV file with a header row
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| YieldError::io(path, e))?;
        let dataset = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.n_cols(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Load a dataset from any CSV source; `source` only labels errors
    pub fn from_reader<R: Read>(reader: R, source: impl AsRef<Path>) -> Result<Self> {
        let source: PathBuf = source.as_ref().to_path_buf();
        let csv_err = |e| YieldError::Csv {
            path: source.clone(),
            source: e,
        };

        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(|cell| Some(cell.to_string())).collect());
        }

        Self::from_rows(headers, rows)
    }

    /// Build a dataset from header names and optional cells.
    ///
    /// Cells are trimmed, and missing-value tokens become `None`. Column types
    /// are decided over all non-missing cells before any row is dropped, so a
    /// row removed for a missing value still counts towards the decision.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        let rows: Vec<Vec<Option<String>>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        cell.map(|c| c.trim().to_string())
                            .filter(|c| !is_missing(c))
                    })
                    .collect()
            })
            .collect();
        let total = rows.len();
        let numeric: Vec<bool> = (0..headers.len())
            .map(|col| {
                rows.iter()
                    .filter_map(|row| row.get(col).and_then(|c| c.as_deref()))
                    .all(|cell| parse_numeric(cell).is_some())
            })
            .collect();

        let complete: Vec<&Vec<Option<String>>> = rows
            .iter()
            .filter(|row| row.len() == headers.len() && row.iter().all(Option::is_some))
            .collect();

        if complete.len() < total {
            debug!(
                dropped = total - complete.len(),
                kept = complete.len(),
                "Dropped rows with missing values"
            );
        }
        if complete.is_empty() {
            return Err(YieldError::EmptyDataset);
        }

        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(col, name)| {
                let cells = complete.iter().filter_map(|row| row[col].as_deref());
                let data = if numeric[col] {
                    ColumnData::Numeric(cells.filter_map(parse_numeric).collect())
                } else {
                    ColumnData::Categorical(cells.map(str::to_string).collect())
                };
                Column { name, data }
            })
            .collect();

        Ok(Self {
            columns,
            n_rows: complete.len(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Values of the target column
    pub fn target(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name).ok_or_else(|| YieldError::MissingColumn {
            column: name.to_string(),
            available: self.column_names(),
        })?;
        match &column.data {
            ColumnData::Numeric(values) => Ok(values.clone()),
            ColumnData::Categorical(_) => Err(YieldError::NonNumericTarget(name.to_string())),
        }
    }

    /// Every column except the target, in file order
    pub fn features<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Column> + 'a {
        self.columns.iter().filter(move |c| c.name != target)
    }
}

/// A missing-value token, or a number that is NaN or infinite in any
/// spelling `f64` parsing accepts (`NAN`, `-nan`, `+inf`, ...)
fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell) || cell.parse::<f64>().is_ok_and(|v| !v.is_finite())
}

/// Parse a cell as a finite number, accepting booleans as 1/0
fn parse_numeric(cell: &str) -> Option<f64> {
    if cell.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}
