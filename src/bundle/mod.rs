//! Immutable trained artifacts
//!
//! An [`ArtifactBundle`] is everything serving needs, packaged as one value:
//! classifier, fitted per-column transforms, the schema descriptor, and
//! evaluation metadata. Bundles are created only by the trainer, consumed
//! read-only, and replaced wholesale — never mutated field by field.

pub mod io;

use crate::boost::GradientBoostedTrees;
use crate::features::{LabelEncoder, StandardScaler};
use crate::schema::SchemaDescriptor;
use crate::train::metrics::EvalMetrics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One feature's share of total split gain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// The structured metadata record persisted next to the model
///
/// Duplicates the schema's column lists so collaborators can consume the
/// metadata file on its own, without parsing the full descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub model_name: String,
    pub roc_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// Positive-label fraction of the training dataset
    pub churn_rate: f64,
    pub customer_id_col: String,
    pub target_col: String,
    /// Authoritative serving order
    pub feature_cols: Vec<String>,
    pub categorical_cols: Vec<String>,
    pub numerical_cols: Vec<String>,
    /// Gain importances, descending
    pub feature_importance: Vec<FeatureImportance>,
    pub n_rows: usize,
    pub n_positive: usize,
    pub training_date: NaiveDate,
}

impl BundleMetadata {
    /// The held-out evaluation scores as one value
    #[must_use]
    pub fn metrics(&self) -> EvalMetrics {
        EvalMetrics {
            roc_auc: self.roc_auc,
            accuracy: self.accuracy,
            precision: self.precision,
            recall: self.recall,
        }
    }
}

/// Versioned, immutable set of trained state, swapped as a unit
///
/// Scaler and encoders are optional at load time: a bundle without them
/// still serves, passing raw values through (see `predict`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub classifier: GradientBoostedTrees,
    pub encoders: BTreeMap<String, LabelEncoder>,
    pub scaler: Option<StandardScaler>,
    pub schema: SchemaDescriptor,
    pub metadata: BundleMetadata,
}
