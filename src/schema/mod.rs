//! Schema detection for unknown tabular datasets
//!
//! Infers which column is the prediction target, which (if any) identifies
//! rows, and whether each remaining column is numerical or categorical. The
//! result is a [`SchemaDescriptor`]: an explicit value object passed through
//! every later stage, so feature identity is never resolved by late string
//! lookup against a loosely-typed blob.
//!
//! `feature_cols` is frozen here — categorical columns first, then numerical,
//! each in dataset order — and every design matrix and serving vector is
//! built in exactly that order.

use crate::data::{coerce_numeric, RawDataset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Column names recognized as the prediction target, in priority order
pub const TARGET_ALIASES: [&str; 6] = ["Churn", "Exited", "churn", "Target", "Status", "churned"];

/// Column names recognized as the row identifier, in priority order
pub const ID_ALIASES: [&str; 5] = ["customerID", "CustomerId", "customer_id", "id", "RowNumber"];

/// Column names that appear on documentation sheets, not data sheets
///
/// Spreadsheet exports often bundle a variable-description sheet next to the
/// data; training on one of those silently produces a nonsense model, so any
/// overlap with this set is a hard error.
pub const DOC_SHEET_COLUMNS: [&str; 9] = [
    "Data",
    "Variable",
    "Description",
    "Discerption",
    "Column_name",
    "Column_type",
    "Data_type",
    "Type",
    "Format",
];

/// Fraction of parseable values above which a column counts as numerical
pub const NUMERIC_RATIO: f64 = 0.8;

/// Column name used when no id column exists and row ids are synthesized
pub const SYNTHETIC_ID_COL: &str = "ROW_ID";

/// Last-column target fallback applies only below this cardinality
const MAX_TARGET_CARDINALITY: usize = 5;

/// Vocabulary preview cap per categorical column
const MAX_VOCABULARY: usize = 20;

/// Errors from schema detection
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no target column found among: {columns:?}")]
    NoTarget { columns: Vec<String> },

    #[error("dataset looks like a documentation sheet (matched columns: {matched:?})")]
    DocumentationSheet { matched: Vec<String> },

    #[error("dataset is empty")]
    EmptyDataset,
}

/// Inferred column roles plus the frozen feature ordering
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub target_col: String,
    pub id_col: String,
    /// True when no id column was found and sequential row ids stand in
    pub id_synthesized: bool,
    pub numerical_cols: Vec<String>,
    pub categorical_cols: Vec<String>,
    /// Authoritative feature order: categorical then numerical, frozen at
    /// detection time. Serving vectors are built in exactly this order.
    pub feature_cols: Vec<String>,
    /// Observed categorical values (sorted, capped) for display surfaces
    pub categorical_vocabularies: BTreeMap<String, Vec<String>>,
    /// Numerical columns whose values are all 0/1; informational only
    pub known_binary_fields: Vec<String>,
}

impl SchemaDescriptor {
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_cols.len()
    }
}

/// Detects a [`SchemaDescriptor`] from raw rows
#[derive(Clone, Debug)]
pub struct SchemaDetector {
    numeric_ratio: f64,
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self {
            numeric_ratio: NUMERIC_RATIO,
        }
    }
}

impl SchemaDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the numerical-classification threshold
    #[must_use]
    pub fn with_numeric_ratio(ratio: f64) -> Self {
        Self {
            numeric_ratio: ratio,
        }
    }

    /// Run full detection: documentation-sheet guard, target, id, column roles
    pub fn detect(&self, dataset: &RawDataset) -> Result<SchemaDescriptor, SchemaError> {
        if dataset.is_empty() {
            return Err(SchemaError::EmptyDataset);
        }

        let doc_columns: BTreeSet<&str> = DOC_SHEET_COLUMNS.iter().copied().collect();
        let matched: Vec<String> = dataset
            .columns()
            .iter()
            .filter(|c| doc_columns.contains(c.as_str()))
            .cloned()
            .collect();
        if !matched.is_empty() {
            return Err(SchemaError::DocumentationSheet { matched });
        }

        let target_col = self.detect_target(dataset)?;
        let (id_col, id_synthesized) = Self::detect_id(dataset);
        self.classify_columns(dataset, target_col, id_col, id_synthesized)
    }

    /// First alias match wins; otherwise the last column qualifies when its
    /// distinct-value count is small enough to be a label.
    pub fn detect_target(&self, dataset: &RawDataset) -> Result<String, SchemaError> {
        for alias in TARGET_ALIASES {
            if dataset.column_index(alias).is_some() {
                return Ok(alias.to_string());
            }
        }

        let last = dataset
            .columns()
            .last()
            .ok_or(SchemaError::EmptyDataset)?;
        let distinct: BTreeSet<&str> = dataset
            .column_values(last)
            .unwrap_or_default()
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if !distinct.is_empty() && distinct.len() <= MAX_TARGET_CARDINALITY {
            return Ok(last.clone());
        }

        Err(SchemaError::NoTarget {
            columns: dataset.columns().to_vec(),
        })
    }

    /// First alias match wins; a missing id column is not an error, sequential
    /// row ids are synthesized instead.
    #[must_use]
    pub fn detect_id(dataset: &RawDataset) -> (String, bool) {
        for alias in ID_ALIASES {
            if dataset.column_index(alias).is_some() {
                return (alias.to_string(), false);
            }
        }
        (SYNTHETIC_ID_COL.to_string(), true)
    }

    fn classify_columns(
        &self,
        dataset: &RawDataset,
        target_col: String,
        id_col: String,
        id_synthesized: bool,
    ) -> Result<SchemaDescriptor, SchemaError> {
        let mut numerical_cols = Vec::new();
        let mut categorical_cols = Vec::new();
        let mut categorical_vocabularies = BTreeMap::new();
        let mut known_binary_fields = Vec::new();
        let n = dataset.n_rows() as f64;

        for col in dataset.columns() {
            if *col == target_col || *col == id_col {
                continue;
            }
            let values = dataset.column_values(col).unwrap_or_default();
            let parsed: Vec<f64> = values.iter().filter_map(|v| coerce_numeric(v)).collect();
            let ratio = parsed.len() as f64 / n;

            if ratio > self.numeric_ratio {
                if !parsed.is_empty() && parsed.iter().all(|&v| v == 0.0 || v == 1.0) {
                    known_binary_fields.push(col.clone());
                }
                numerical_cols.push(col.clone());
            } else {
                let mut vocabulary: Vec<String> = values
                    .iter()
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();
                vocabulary.truncate(MAX_VOCABULARY);
                categorical_vocabularies.insert(col.clone(), vocabulary);
                categorical_cols.push(col.clone());
            }
        }

        let mut feature_cols = categorical_cols.clone();
        feature_cols.extend(numerical_cols.iter().cloned());

        Ok(SchemaDescriptor {
            target_col,
            id_col,
            id_synthesized,
            numerical_cols,
            categorical_cols,
            feature_cols,
            categorical_vocabularies,
            known_binary_fields,
        })
    }
}

/// Normalize a raw target cell to a 0/1 label
///
/// Positive labels are the original system's accepted spellings; anything
/// else (including blanks) is negative.
#[must_use]
pub fn normalize_target(value: &str) -> u8 {
    let lowered = value.trim().to_lowercase();
    u8::from(matches!(
        lowered.as_str(),
        "yes" | "1" | "true" | "churned" | "exited"
    ))
}
