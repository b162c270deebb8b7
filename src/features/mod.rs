//! Fitted feature transforms
//!
//! The per-column state a bundle carries: label encoders for categorical
//! columns and a z-score scaler for the numerical block. Both serialize with
//! the bundle so serving always applies exactly the fitted transformation.

use serde::{Deserialize, Serialize};

/// Sentinel vocabulary entry standing in for missing values at fit time
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Zero-variance guard: columns flatter than this scale by 1
const MIN_STD: f64 = 1e-12;

/// A fitted categorical vocabulary mapping values to dense indices
///
/// Classes are stored sorted, so index assignment is deterministic for a
/// given set of observed values. Missing (empty) cells are folded into
/// [`UNKNOWN_LABEL`], which is always part of the vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit over observed values
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values
            .into_iter()
            .map(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    UNKNOWN_LABEL.to_string()
                } else {
                    trimmed.to_string()
                }
            })
            .collect();
        classes.push(UNKNOWN_LABEL.to_string());
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// The fitted vocabulary, sorted
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Index of a value in the fitted vocabulary; `None` when unseen.
    /// Empty values resolve to the [`UNKNOWN_LABEL`] bucket.
    #[must_use]
    pub fn index_of(&self, value: &str) -> Option<usize> {
        let trimmed = value.trim();
        let key = if trimmed.is_empty() {
            UNKNOWN_LABEL
        } else {
            trimmed
        };
        self.classes.binary_search_by(|c| c.as_str().cmp(key)).ok()
    }

    /// Fit-time code: every training cell is in the vocabulary by
    /// construction, so a miss here can only mean a caller bug; it maps to 0
    /// rather than panicking.
    #[must_use]
    pub fn encode_fit(&self, value: &str) -> usize {
        self.index_of(value).unwrap_or(0)
    }
}

/// A fitted z-score scaler over the numerical columns
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and (population) standard deviation
    ///
    /// `data` holds one value vector per entry of `columns`, in the same
    /// order.
    #[must_use]
    pub fn fit(columns: &[String], data: &[Vec<f64>]) -> Self {
        let mut means = Vec::with_capacity(columns.len());
        let mut stds = Vec::with_capacity(columns.len());
        for values in data {
            let n = values.len() as f64;
            let mean = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / n
            };
            let var = if values.is_empty() {
                0.0
            } else {
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
            };
            let std = var.sqrt();
            means.push(mean);
            stds.push(if std <= MIN_STD { 1.0 } else { std });
        }
        Self {
            columns: columns.to_vec(),
            means,
            stds,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column in the fitted scaler, if it was fitted
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[must_use]
    pub fn mean(&self, col: usize) -> f64 {
        self.means[col]
    }

    #[must_use]
    pub fn std(&self, col: usize) -> f64 {
        self.stds[col]
    }

    /// Apply the fitted transform to one value
    #[must_use]
    pub fn transform_value(&self, col: usize, value: f64) -> f64 {
        (value - self.means[col]) / self.stds[col]
    }
}
