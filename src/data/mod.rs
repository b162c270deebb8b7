//! Raw tabular data
//!
//! Datasets arrive as untyped uploads with unknown columns. [`RawDataset`]
//! keeps column order and cell text exactly as read; all typing decisions
//! happen later, in schema detection and the feature pipeline.

pub mod load;

use std::collections::HashMap;
use thiserror::Error;

/// Errors from dataset construction and ingestion
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset has no columns")]
    NoColumns,

    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },
}

/// An ordered, untyped tabular dataset
///
/// Rows are stored as strings in column order. Cell text is interpreted only
/// downstream (numeric coercion, label encoding), so the same dataset value
/// feeds both training and serving without re-parsing ambiguity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawDataset {
    /// Build a dataset from pre-split cells. Every row must match the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DataError> {
        if columns.is_empty() {
            return Err(DataError::NoColumns);
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataError::RaggedRow {
                    row: i,
                    got: row.len(),
                    expected: columns.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Column names in their original order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cell values of one column, in row order
    #[must_use]
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Raw rows, in insertion order
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// One row as a column-name → value map (the serving-path input shape)
    #[must_use]
    pub fn row_map(&self, row: usize) -> HashMap<String, String> {
        self.columns
            .iter()
            .cloned()
            .zip(self.rows[row].iter().cloned())
            .collect()
    }

    /// Every row as a column-name → value map
    #[must_use]
    pub fn row_maps(&self) -> Vec<HashMap<String, String>> {
        (0..self.n_rows()).map(|i| self.row_map(i)).collect()
    }

    /// Canonical byte stream for content hashing
    ///
    /// Stable under serialization details: cells are separated by 0x1F and
    /// rows (and the header) by 0x1E, so two datasets hash equal iff their
    /// columns, rows, and cell text are identical.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                bytes.push(0x1F);
            }
            bytes.extend_from_slice(col.as_bytes());
        }
        for row in &self.rows {
            bytes.push(0x1E);
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    bytes.push(0x1F);
                }
                bytes.extend_from_slice(cell.as_bytes());
            }
        }
        bytes
    }
}

/// Parse a cell as a finite number
///
/// Empty, whitespace-only, and non-numeric cells are `None`; so are
/// non-finite parses, which keeps downstream arithmetic NaN-free.
#[must_use]
pub fn coerce_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}
