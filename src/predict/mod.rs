//! Serving-path prediction
//!
//! A [`Predictor`] wraps one immutable bundle and serves single and batch
//! predictions using exactly the fitted transformation. The feature vector
//! is always built in the bundle's `feature_cols` order, whatever order the
//! input row's keys arrive in.
//!
//! `prepare_batch` is the column-sweep equivalent of calling
//! [`prepare_single`](Predictor::prepare_single) per row and must agree with
//! it elementwise within 1e-9 — that equivalence is a hard invariant of the
//! pipeline, not an optimization detail.

use crate::bundle::ArtifactBundle;
use crate::data::coerce_numeric;
use crate::explain::{FeatureAttribution, TopFactor, TreeExplainer, DEFAULT_TOP_K};
use crate::features::LabelEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A serving-path input row: column name → raw value
pub type InputRow = HashMap<String, String>;

/// Probability at or above which risk is high
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Probability at or above which risk is medium
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.3;

/// Code used for unseen and absent categorical values at serving time
const DEFAULT_CATEGORY_INDEX: usize = 0;

/// 95% two-sided normal quantile
const Z_95: f64 = 1.96;

/// Nominal sample size behind the normal-approximation interval
const CONFIDENCE_SAMPLE: f64 = 100.0;

/// Serving-path errors
#[derive(Debug, Error)]
pub enum PredictError {
    /// Prediction requested before any bundle exists — an explicit
    /// "not ready" condition, not a generic failure
    #[error("no model is loaded")]
    ModelNotLoaded,

    #[error("bundle failed validation: {0}")]
    InvalidBundle(String),
}

/// Bucketed probability band driving the recommended action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    #[must_use]
    pub fn from_probability(p: f64) -> Self {
        if p >= HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if p >= MEDIUM_RISK_THRESHOLD {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::High => "high",
            RiskTier::Medium => "medium",
            RiskTier::Low => "low",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 95% interval via the normal approximation, clipped to [0, 1]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub confidence_level: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub fn for_probability(p: f64) -> Self {
        let std_error = (p * (1.0 - p) / CONFIDENCE_SAMPLE).sqrt();
        Self {
            lower: (p - Z_95 * std_error).max(0.0),
            upper: (p + Z_95 * std_error).min(1.0),
            confidence_level: 0.95,
        }
    }
}

/// An unseen categorical value recovered by defaulting; never aborts the
/// request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingWarning {
    pub column: String,
    pub value: String,
}

/// One served prediction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub churn_probability: f64,
    pub risk_level: RiskTier,
    pub confidence_interval: ConfidenceInterval,
    pub recommendation: String,
    /// Unseen-value recoveries hit while encoding this row
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encoding_warnings: Vec<EncodingWarning>,
}

/// A prediction plus its attribution breakdown
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplainedPrediction {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    /// Logit-space contributions in `feature_cols` order; empty when no
    /// explainer is available
    pub attributions: Vec<FeatureAttribution>,
    pub top_factors: Vec<TopFactor>,
}

/// One row's outcome within a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowPrediction {
    pub row_index: usize,
    pub customer_id: Option<String>,
    #[serde(flatten)]
    pub prediction: PredictionResult,
}

/// Batch-level aggregates; per-row issues are counted here, never fatal
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub predicted: usize,
    /// Rows dropped for a non-finite classifier output
    pub anomalies: usize,
    pub encoding_warnings: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub avg_churn_probability: f64,
}

/// A full batch result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub predictions: Vec<RowPrediction>,
    pub summary: BatchSummary,
}

/// Serves predictions from one validated, immutable bundle
#[derive(Clone, Debug)]
pub struct Predictor {
    bundle: Arc<ArtifactBundle>,
    explainer: Option<TreeExplainer>,
    degraded: bool,
}

impl Predictor {
    /// Validate and wrap a bundle
    ///
    /// Classifier, schema, and metadata are mandatory and must agree on the
    /// feature order. Scaler and encoders are optional: without them the
    /// matching features pass through unscaled/raw-coerced, and
    /// [`is_degraded`](Self::is_degraded) reports it.
    pub fn load(bundle: Arc<ArtifactBundle>) -> Result<Self, PredictError> {
        let schema = &bundle.schema;
        if schema.feature_cols.is_empty() {
            return Err(PredictError::InvalidBundle(
                "bundle has no feature columns".to_string(),
            ));
        }
        if bundle.metadata.feature_cols != schema.feature_cols {
            return Err(PredictError::InvalidBundle(
                "metadata and schema disagree on feature order".to_string(),
            ));
        }
        if bundle.classifier.n_features() != schema.feature_cols.len() {
            return Err(PredictError::InvalidBundle(format!(
                "classifier expects {} features, schema has {}",
                bundle.classifier.n_features(),
                schema.feature_cols.len()
            )));
        }

        let degraded = (!schema.numerical_cols.is_empty() && bundle.scaler.is_none())
            || schema
                .categorical_cols
                .iter()
                .any(|c| !bundle.encoders.contains_key(c));
        let explainer = if bundle.classifier.trees().is_empty() {
            None
        } else {
            Some(TreeExplainer::new(Arc::clone(&bundle)))
        };

        Ok(Self {
            bundle,
            explainer,
            degraded,
        })
    }

    #[must_use]
    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// True when the bundle is serving without its scaler or some encoder
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn explainer(&self) -> Option<&TreeExplainer> {
        self.explainer.as_ref()
    }

    /// Build one feature vector in `feature_cols` order
    ///
    /// Absent features default to 0 (numeric) or the default categorical
    /// code; unseen categorical values recover via
    /// [`EncodingWarning`].
    #[must_use]
    pub fn prepare_single(&self, row: &InputRow) -> (Vec<f64>, Vec<EncodingWarning>) {
        let schema = &self.bundle.schema;
        let mut x = Vec::with_capacity(schema.feature_cols.len());
        let mut warnings = Vec::new();

        for col in &schema.feature_cols {
            let raw = row.get(col).map(String::as_str);
            if let Some(encoder) = self.bundle.encoders.get(col) {
                x.push(encode_categorical(col, raw, encoder, &mut warnings));
            } else if schema.categorical_cols.contains(col) {
                // Degraded path: no encoder survived for this column, so the
                // raw value is coerced instead of encoded
                x.push(raw.and_then(coerce_numeric).unwrap_or(0.0));
            } else {
                let value = raw.and_then(coerce_numeric).unwrap_or(0.0);
                x.push(self.scale_numeric(col, value));
            }
        }
        (x, warnings)
    }

    /// Column-sweep equivalent of [`prepare_single`](Self::prepare_single)
    /// over many rows; elementwise identical per row
    #[must_use]
    pub fn prepare_batch(&self, rows: &[InputRow]) -> (Vec<Vec<f64>>, Vec<EncodingWarning>) {
        let schema = &self.bundle.schema;
        let mut matrix = vec![vec![0.0; schema.feature_cols.len()]; rows.len()];
        let mut warnings = Vec::new();

        for (j, col) in schema.feature_cols.iter().enumerate() {
            if let Some(encoder) = self.bundle.encoders.get(col) {
                for (i, row) in rows.iter().enumerate() {
                    let raw = row.get(col).map(String::as_str);
                    matrix[i][j] = encode_categorical(col, raw, encoder, &mut warnings);
                }
            } else if schema.categorical_cols.contains(col) {
                for (i, row) in rows.iter().enumerate() {
                    let raw = row.get(col).map(String::as_str);
                    matrix[i][j] = raw.and_then(coerce_numeric).unwrap_or(0.0);
                }
            } else {
                for (i, row) in rows.iter().enumerate() {
                    let raw = row.get(col).map(String::as_str);
                    let value = raw.and_then(coerce_numeric).unwrap_or(0.0);
                    matrix[i][j] = self.scale_numeric(col, value);
                }
            }
        }
        (matrix, warnings)
    }

    /// Positive-class probability with tier, interval, and recommendation
    #[must_use]
    pub fn predict(&self, row: &InputRow) -> PredictionResult {
        let (x, warnings) = self.prepare_single(row);
        let p = self.bundle.classifier.predict_proba(&x);
        self.assemble(p, row, warnings)
    }

    /// As [`predict`](Self::predict), plus attribution output; when no
    /// explainer is available the attribution is empty rather than an error
    #[must_use]
    pub fn predict_with_explanation(&self, row: &InputRow) -> ExplainedPrediction {
        let (x, warnings) = self.prepare_single(row);
        let p = self.bundle.classifier.predict_proba(&x);
        let prediction = self.assemble(p, row, warnings);

        let Some(explainer) = &self.explainer else {
            return ExplainedPrediction {
                prediction,
                attributions: Vec::new(),
                top_factors: Vec::new(),
            };
        };

        let phi = explainer.explain(&x);
        let feature_cols = &self.bundle.schema.feature_cols;
        let attributions = feature_cols
            .iter()
            .zip(&phi)
            .map(|(feature, &attribution)| FeatureAttribution {
                feature: feature.clone(),
                attribution,
            })
            .collect();
        let top_factors = TreeExplainer::top_factors(&phi, feature_cols, row, DEFAULT_TOP_K);

        ExplainedPrediction {
            prediction,
            attributions,
            top_factors,
        }
    }

    /// One result per row; per-row issues are recovered locally and counted
    /// in the summary (warnings are aggregated there, not attached per row)
    #[must_use]
    pub fn batch_predict(&self, rows: &[InputRow]) -> BatchOutcome {
        let (matrix, warnings) = self.prepare_batch(rows);
        let probabilities = self.bundle.classifier.predict_proba_batch(&matrix);
        let id_col = &self.bundle.schema.id_col;

        let mut summary = BatchSummary {
            total_rows: rows.len(),
            encoding_warnings: warnings.len(),
            ..BatchSummary::default()
        };
        let mut predictions = Vec::with_capacity(rows.len());
        let mut probability_sum = 0.0;

        for (i, (row, &p)) in rows.iter().zip(&probabilities).enumerate() {
            if !p.is_finite() {
                summary.anomalies += 1;
                continue;
            }
            let p = p.clamp(0.0, 1.0);
            match RiskTier::from_probability(p) {
                RiskTier::High => summary.high_risk += 1,
                RiskTier::Medium => summary.medium_risk += 1,
                RiskTier::Low => summary.low_risk += 1,
            }
            probability_sum += p;
            predictions.push(RowPrediction {
                row_index: i,
                customer_id: row.get(id_col).cloned(),
                prediction: self.assemble(p, row, Vec::new()),
            });
        }

        summary.predicted = predictions.len();
        summary.avg_churn_probability = if predictions.is_empty() {
            0.0
        } else {
            probability_sum / predictions.len() as f64
        };

        BatchOutcome {
            predictions,
            summary,
        }
    }

    /// Batch attributions over already-prepared rows, shared tree walk
    /// (empty when no explainer is available)
    #[must_use]
    pub fn explain_batch(&self, rows: &[InputRow]) -> Vec<Vec<FeatureAttribution>> {
        let Some(explainer) = &self.explainer else {
            return vec![Vec::new(); rows.len()];
        };
        let (matrix, _) = self.prepare_batch(rows);
        let feature_cols = &self.bundle.schema.feature_cols;
        explainer
            .explain_batch(&matrix)
            .into_iter()
            .map(|phi| {
                feature_cols
                    .iter()
                    .zip(phi)
                    .map(|(feature, attribution)| FeatureAttribution {
                        feature: feature.clone(),
                        attribution,
                    })
                    .collect()
            })
            .collect()
    }

    fn scale_numeric(&self, col: &str, value: f64) -> f64 {
        if let Some(scaler) = &self.bundle.scaler {
            if let Some(pos) = scaler.position(col) {
                return scaler.transform_value(pos, value);
            }
        }
        value
    }

    fn assemble(
        &self,
        probability: f64,
        row: &InputRow,
        encoding_warnings: Vec<EncodingWarning>,
    ) -> PredictionResult {
        let p = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let risk_level = RiskTier::from_probability(p);
        PredictionResult {
            churn_probability: p,
            risk_level,
            confidence_interval: ConfidenceInterval::for_probability(p),
            recommendation: self.recommendation(risk_level, row),
            encoding_warnings,
        }
    }

    fn recommendation(&self, risk: RiskTier, row: &InputRow) -> String {
        let mut text = match risk {
            RiskTier::High => {
                "Immediate intervention required. Consider personalized retention offer, \
                 direct outreach, or exclusive incentives."
            }
            RiskTier::Medium => {
                "Proactive engagement recommended. Schedule check-in, offer loyalty \
                 rewards, or provide service enhancement."
            }
            RiskTier::Low => {
                "Continue standard engagement. Monitor for changes and maintain regular \
                 communication."
            }
        }
        .to_string();

        if let Some(top) = self.bundle.metadata.feature_importance.first() {
            if let Some(value) = row.get(&top.feature) {
                text.push_str(&format!(
                    " Focus on addressing '{}' (current value: {}).",
                    top.feature, value
                ));
            }
        }
        text
    }
}

/// Serving-time categorical encoding
///
/// Unseen values map to code 0 — deliberately not the fitted Unknown
/// bucket. That approximation matches the behavior the bundle was tuned
/// against; the warning keeps it visible to callers instead of silent.
fn encode_categorical(
    col: &str,
    raw: Option<&str>,
    encoder: &LabelEncoder,
    warnings: &mut Vec<EncodingWarning>,
) -> f64 {
    match raw {
        None => DEFAULT_CATEGORY_INDEX as f64,
        Some(value) => match encoder.index_of(value) {
            Some(idx) => idx as f64,
            None => {
                warnings.push(EncodingWarning {
                    column: col.to_string(),
                    value: value.to_string(),
                });
                DEFAULT_CATEGORY_INDEX as f64
            }
        },
    }
}
