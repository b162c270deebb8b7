//! Dataset training
//!
//! [`Trainer::fit`] turns a raw dataset plus its detected schema into an
//! immutable [`ArtifactBundle`]: fitted encoders and scaler, a trained
//! classifier, held-out evaluation metrics, and gain importances. It never
//! mutates previously served state — retraining always produces a fresh
//! bundle.

pub mod metrics;

use crate::boost::{BoostParams, GradientBoostedTrees};
use crate::bundle::{ArtifactBundle, BundleMetadata, FeatureImportance};
use crate::data::{coerce_numeric, RawDataset};
use crate::features::{LabelEncoder, StandardScaler};
use crate::schema::{normalize_target, SchemaDescriptor};
use chrono::Utc;
use metrics::EvalMetrics;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Minimum rows required to attempt a fit
pub const MIN_ROWS: usize = 20;

/// Decision threshold behind accuracy/precision/recall
const DECISION_THRESHOLD: f64 = 0.5;

/// Errors that abort a training attempt
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("target has fewer than two distinct classes")]
    DegenerateTarget,

    #[error("dataset has {rows} rows, need at least {min}")]
    TooFewRows { rows: usize, min: usize },

    #[error("no usable feature columns after schema detection")]
    EmptyFeatureMatrix,
}

/// Training hyperparameters, loadable from a YAML file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub lambda: f64,
    /// Held-out fraction for evaluation
    pub test_fraction: f64,
    /// Seed for the stratified split; fitting is otherwise deterministic
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            lambda: 1.0,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    #[must_use]
    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    fn boost_params(&self) -> BoostParams {
        BoostParams {
            n_trees: self.n_trees,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            lambda: self.lambda,
        }
    }
}

/// Fits bundles from raw datasets
#[derive(Clone, Debug, Default)]
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    #[must_use]
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Fit encoders, scaler, and classifier; deterministic for a fixed seed
    pub fn fit(
        &self,
        dataset: &RawDataset,
        schema: &SchemaDescriptor,
    ) -> Result<ArtifactBundle, TrainingError> {
        let n = dataset.n_rows();
        if n < MIN_ROWS {
            return Err(TrainingError::TooFewRows { rows: n, min: MIN_ROWS });
        }
        if schema.feature_cols.is_empty() {
            return Err(TrainingError::EmptyFeatureMatrix);
        }

        let labels: Vec<u8> = dataset
            .column_values(&schema.target_col)
            .unwrap_or_default()
            .into_iter()
            .map(normalize_target)
            .collect();
        if labels.len() != n {
            return Err(TrainingError::EmptyFeatureMatrix);
        }
        let n_positive = labels.iter().filter(|&&l| l == 1).count();
        if n_positive == 0 || n_positive == n {
            return Err(TrainingError::DegenerateTarget);
        }

        // Encoder vocabularies cover every observed value, plus the Unknown
        // sentinel for missing cells
        let mut encoders = BTreeMap::new();
        for col in &schema.categorical_cols {
            let values = dataset.column_values(col).unwrap_or_default();
            encoders.insert(col.clone(), LabelEncoder::fit(values));
        }

        // Unscaled design matrix in frozen feature_cols order
        let mut matrix: Vec<Vec<f64>> = Vec::with_capacity(n);
        for row in dataset.rows() {
            let mut x = Vec::with_capacity(schema.feature_cols.len());
            for col in &schema.feature_cols {
                let cell = dataset
                    .column_index(col)
                    .map_or("", |idx| row[idx].as_str());
                if let Some(encoder) = encoders.get(col) {
                    x.push(encoder.encode_fit(cell) as f64);
                } else {
                    x.push(coerce_numeric(cell).unwrap_or(0.0));
                }
            }
            matrix.push(x);
        }

        let (train_idx, test_idx) =
            stratified_split(&labels, self.config.test_fraction, self.config.seed);

        // Scaler statistics come from the training split only
        let scaler = if schema.numerical_cols.is_empty() {
            None
        } else {
            let mut column_data = Vec::with_capacity(schema.numerical_cols.len());
            for col in &schema.numerical_cols {
                column_data.push(match feature_position(schema, col) {
                    Some(pos) => train_idx.iter().map(|&i| matrix[i][pos]).collect(),
                    None => Vec::new(),
                });
            }
            Some(StandardScaler::fit(&schema.numerical_cols, &column_data))
        };

        if let Some(scaler) = &scaler {
            for (k, col) in schema.numerical_cols.iter().enumerate() {
                if let Some(pos) = feature_position(schema, col) {
                    for row in &mut matrix {
                        row[pos] = scaler.transform_value(k, row[pos]);
                    }
                }
            }
        }

        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| matrix[i].clone()).collect();
        let train_labels: Vec<f64> = train_idx.iter().map(|&i| f64::from(labels[i])).collect();
        let classifier =
            GradientBoostedTrees::fit(&train_rows, &train_labels, &self.config.boost_params());

        let test_labels: Vec<u8> = test_idx.iter().map(|&i| labels[i]).collect();
        let test_scores: Vec<f64> = test_idx
            .iter()
            .map(|&i| classifier.predict_proba(&matrix[i]))
            .collect();
        let eval = EvalMetrics::compute(&test_labels, &test_scores, DECISION_THRESHOLD);

        let mut feature_importance: Vec<FeatureImportance> = schema
            .feature_cols
            .iter()
            .zip(classifier.feature_importance())
            .map(|(feature, importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let metadata = BundleMetadata {
            model_name: "gbdt".to_string(),
            roc_auc: eval.roc_auc,
            accuracy: eval.accuracy,
            precision: eval.precision,
            recall: eval.recall,
            churn_rate: n_positive as f64 / n as f64,
            customer_id_col: schema.id_col.clone(),
            target_col: schema.target_col.clone(),
            feature_cols: schema.feature_cols.clone(),
            categorical_cols: schema.categorical_cols.clone(),
            numerical_cols: schema.numerical_cols.clone(),
            feature_importance,
            n_rows: n,
            n_positive,
            training_date: Utc::now().date_naive(),
        };

        Ok(ArtifactBundle {
            classifier,
            encoders,
            scaler,
            schema: schema.clone(),
            metadata,
        })
    }
}

fn feature_position(schema: &SchemaDescriptor, col: &str) -> Option<usize> {
    schema.feature_cols.iter().position(|c| c == col)
}

/// Seeded stratified split over 0/1 labels, returning sorted (train, test)
/// index sets with the test fraction taken per class
#[must_use]
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(indices.len());
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDetector;

    fn synthetic(n: usize) -> RawDataset {
        let columns = vec![
            "customerID".to_string(),
            "Contract".to_string(),
            "tenure".to_string(),
            "Churn".to_string(),
        ];
        let rows = (0..n)
            .map(|i| {
                let month_to_month = i % 10 < 3;
                let contract = if month_to_month {
                    "Month-to-month"
                } else {
                    "One year"
                };
                let churn = if month_to_month { "Yes" } else { "No" };
                vec![
                    format!("C-{i:04}"),
                    contract.to_string(),
                    (i % 73).to_string(),
                    churn.to_string(),
                ]
            })
            .collect();
        RawDataset::new(columns, rows).unwrap()
    }

    fn fit(n: usize) -> ArtifactBundle {
        let dataset = synthetic(n);
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        Trainer::new(TrainConfig::default())
            .fit(&dataset, &schema)
            .unwrap()
    }

    #[test]
    fn test_fit_produces_complete_bundle() {
        let bundle = fit(100);
        assert_eq!(bundle.schema.feature_cols, vec!["Contract", "tenure"]);
        assert_eq!(
            bundle.schema.feature_cols.len(),
            bundle.schema.numerical_cols.len() + bundle.schema.categorical_cols.len()
        );
        assert!(bundle.encoders.contains_key("Contract"));
        assert!(bundle.scaler.is_some());
        assert!(bundle.metadata.roc_auc > 0.5);
        assert!((bundle.metadata.churn_rate - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let dataset = synthetic(100);
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        let trainer = Trainer::new(TrainConfig::default());
        let a = trainer.fit(&dataset, &schema).unwrap();
        let b = trainer.fit(&dataset, &schema).unwrap();
        assert_eq!(a.classifier, b.classifier);
        assert_eq!(a.metadata.roc_auc, b.metadata.roc_auc);
    }

    #[test]
    fn test_too_few_rows() {
        let dataset = synthetic(10);
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        let result = Trainer::new(TrainConfig::default()).fit(&dataset, &schema);
        assert!(matches!(
            result,
            Err(TrainingError::TooFewRows { rows: 10, min: MIN_ROWS })
        ));
    }

    #[test]
    fn test_degenerate_target() {
        let columns = vec!["id".to_string(), "x".to_string(), "Churn".to_string()];
        let rows = (0..30)
            .map(|i| vec![i.to_string(), (i % 5).to_string(), "No".to_string()])
            .collect();
        let dataset = RawDataset::new(columns, rows).unwrap();
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        let result = Trainer::new(TrainConfig::default()).fit(&dataset, &schema);
        assert!(matches!(result, Err(TrainingError::DegenerateTarget)));
    }

    #[test]
    fn test_empty_feature_matrix() {
        let dataset = synthetic(100);
        let mut schema = SchemaDetector::new().detect(&dataset).unwrap();
        schema.feature_cols.clear();
        schema.categorical_cols.clear();
        schema.numerical_cols.clear();
        let result = Trainer::new(TrainConfig::default()).fit(&dataset, &schema);
        assert!(matches!(result, Err(TrainingError::EmptyFeatureMatrix)));
    }

    #[test]
    fn test_importances_sorted_descending() {
        let bundle = fit(100);
        let imp = &bundle.metadata.feature_importance;
        for pair in imp.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
        // Contract fully determines churn in the synthetic data
        assert_eq!(imp[0].feature, "Contract");
    }

    #[test]
    fn test_stratified_split_preserves_class_balance() {
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i % 10 < 3)).collect();
        let (train, test) = stratified_split(&labels, 0.2, 7);
        assert_eq!(train.len() + test.len(), 100);
        let test_pos = test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 6); // 20% of 30 positives
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_split_seed_determinism() {
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i % 3 == 0)).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 42),
            stratified_split(&labels, 0.2, 42)
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 42),
            stratified_split(&labels, 0.2, 43)
        );
    }

    #[test]
    fn test_scaler_fitted_on_training_split_only() {
        let dataset = synthetic(100);
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        let bundle = Trainer::new(TrainConfig::default())
            .fit(&dataset, &schema)
            .unwrap();
        let scaler = bundle.scaler.as_ref().unwrap();

        let labels: Vec<u8> = dataset
            .column_values("Churn")
            .unwrap()
            .into_iter()
            .map(normalize_target)
            .collect();
        let (train_idx, _) = stratified_split(&labels, 0.2, 42);
        let tenure = dataset.column_values("tenure").unwrap();
        let train_mean = train_idx
            .iter()
            .map(|&i| coerce_numeric(tenure[i]).unwrap_or(0.0))
            .sum::<f64>()
            / train_idx.len() as f64;
        assert!((scaler.mean(0) - train_mean).abs() < 1e-9);
    }
}
