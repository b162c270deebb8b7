//! Additive prediction explanations
//!
//! Attributions are computed by decision-path decomposition over the tree
//! ensemble and are expressed in **logit space**: for every input,
//! `bias() + explain(x).iter().sum()` reconstructs the classifier margin up
//! to floating-point rounding, and any larger mismatch is a correctness bug
//! (asserted in tests). Probability-space attribution cannot satisfy that
//! additivity through the sigmoid link, which is why logit space is the
//! contract for both the single-row and batch paths.
//!
//! Each split a row passes through moves the running node weight; that
//! movement is credited to the split's feature. Per tree, the credited
//! movements plus the root weight telescope to the reached leaf weight.

use crate::boost::{Node, Tree};
use crate::bundle::{ArtifactBundle, FeatureImportance};
use crate::predict::InputRow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default factor count for display surfaces
pub const DEFAULT_TOP_K: usize = 5;

/// Direction of a factor's effect on churn probability
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Increases,
    Decreases,
}

/// One feature's logit-space contribution to a prediction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: String,
    pub attribution: f64,
}

/// A display-ready top factor, carrying the original (pre-encoding) value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopFactor {
    pub feature: String,
    /// The raw input value, as supplied by the caller
    pub value: String,
    pub attribution: f64,
    pub impact: Impact,
}

/// Path-decomposition explainer over a trained bundle
///
/// Rebuilt whenever the live bundle is swapped; holds the bundle by `Arc`,
/// so an in-flight explanation keeps its bundle alive across a swap.
#[derive(Clone, Debug)]
pub struct TreeExplainer {
    bundle: Arc<ArtifactBundle>,
}

impl TreeExplainer {
    #[must_use]
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self { bundle }
    }

    /// Logit-space expected value: the ensemble base score plus every
    /// tree's root weight. The additive baseline all attributions sum from.
    #[must_use]
    pub fn bias(&self) -> f64 {
        let classifier = &self.bundle.classifier;
        classifier.base_score()
            + classifier
                .trees()
                .iter()
                .map(Tree::root_value)
                .sum::<f64>()
    }

    /// One attribution per feature, in `feature_cols` order
    #[must_use]
    pub fn explain(&self, x: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; self.bundle.classifier.n_features()];
        for tree in self.bundle.classifier.trees() {
            walk(tree, x, &mut phi);
        }
        phi
    }

    /// Attributions for a whole prepared matrix
    ///
    /// One pass per tree across all rows — the tree walk (the CPU-heavy
    /// step) is shared over the batch, and the arithmetic is identical to
    /// row-wise [`explain`](Self::explain).
    #[must_use]
    pub fn explain_batch(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n_features = self.bundle.classifier.n_features();
        let mut phis = vec![vec![0.0; n_features]; rows.len()];
        for tree in self.bundle.classifier.trees() {
            for (phi, x) in phis.iter_mut().zip(rows) {
                walk(tree, x, phi);
            }
        }
        phis
    }

    /// Top-k factors by absolute attribution, tagged by sign and carrying
    /// the original input value for display
    #[must_use]
    pub fn top_factors(
        attributions: &[f64],
        feature_cols: &[String],
        row: &InputRow,
        k: usize,
    ) -> Vec<TopFactor> {
        let mut order: Vec<usize> = (0..attributions.len()).collect();
        order.sort_by(|&a, &b| attributions[b].abs().total_cmp(&attributions[a].abs()));
        order.truncate(k);

        order
            .into_iter()
            .map(|j| TopFactor {
                feature: feature_cols[j].clone(),
                value: row
                    .get(&feature_cols[j])
                    .cloned()
                    .unwrap_or_else(|| "N/A".to_string()),
                attribution: attributions[j],
                impact: if attributions[j] > 0.0 {
                    Impact::Increases
                } else {
                    Impact::Decreases
                },
            })
            .collect()
    }
}

/// Credit one tree's path movements into `phi`
fn walk(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    let mut idx = 0;
    let mut prev = tree.root_value();
    loop {
        match &tree.nodes[idx] {
            Node::Leaf { .. } => return,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                let next = if x[*feature] < *threshold {
                    *left
                } else {
                    *right
                };
                let next_value = tree.nodes[next].value();
                phi[*feature] += next_value - prev;
                prev = next_value;
                idx = next;
            }
        }
    }
}

/// The bundle's stored gain importances, descending — independent of any
/// single prediction
#[must_use]
pub fn global_importance(bundle: &ArtifactBundle) -> Vec<FeatureImportance> {
    bundle.metadata.feature_importance.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawDataset;
    use crate::schema::SchemaDetector;
    use crate::train::{TrainConfig, Trainer};

    fn trained() -> Arc<ArtifactBundle> {
        let columns = vec![
            "customerID".to_string(),
            "Contract".to_string(),
            "tenure".to_string(),
            "Churn".to_string(),
        ];
        let rows = (0..80)
            .map(|i| {
                vec![
                    format!("C-{i}"),
                    if i % 4 == 0 { "Month-to-month" } else { "One year" }.to_string(),
                    (i % 60).to_string(),
                    if i % 4 == 0 { "Yes" } else { "No" }.to_string(),
                ]
            })
            .collect();
        let dataset = RawDataset::new(columns, rows).unwrap();
        let schema = SchemaDetector::new().detect(&dataset).unwrap();
        Arc::new(
            Trainer::new(TrainConfig::default().with_n_trees(30))
                .fit(&dataset, &schema)
                .unwrap(),
        )
    }

    fn sample_vectors(bundle: &ArtifactBundle) -> Vec<Vec<f64>> {
        // A spread of encoded points in the 2-feature space
        vec![
            vec![0.0, -1.2],
            vec![1.0, 0.4],
            vec![0.0, 2.0],
            vec![2.0, 0.0],
        ]
        .into_iter()
        .map(|mut v| {
            v.truncate(bundle.classifier.n_features());
            v
        })
        .collect()
    }

    #[test]
    fn test_additive_reconstruction() {
        let bundle = trained();
        let explainer = TreeExplainer::new(Arc::clone(&bundle));
        for x in sample_vectors(&bundle) {
            let phi = explainer.explain(&x);
            let reconstructed = explainer.bias() + phi.iter().sum::<f64>();
            let margin = bundle.classifier.predict_margin(&x);
            assert!(
                (reconstructed - margin).abs() < 1e-9,
                "bias + sum(phi) = {reconstructed} but margin = {margin}"
            );
        }
    }

    #[test]
    fn test_batch_matches_single() {
        let bundle = trained();
        let explainer = TreeExplainer::new(Arc::clone(&bundle));
        let rows = sample_vectors(&bundle);
        let batch = explainer.explain_batch(&rows);
        for (x, batch_phi) in rows.iter().zip(&batch) {
            let single_phi = explainer.explain(x);
            for (a, b) in single_phi.iter().zip(batch_phi) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_attribution_length_matches_features() {
        let bundle = trained();
        let explainer = TreeExplainer::new(Arc::clone(&bundle));
        let phi = explainer.explain(&vec![0.0; bundle.classifier.n_features()]);
        assert_eq!(phi.len(), bundle.schema.feature_cols.len());
    }

    #[test]
    fn test_top_factors_ordering_and_values() {
        let feature_cols = vec!["Contract".to_string(), "tenure".to_string()];
        let mut row = InputRow::new();
        row.insert("Contract".to_string(), "Month-to-month".to_string());
        let attributions = [0.2, -0.9];

        let factors = TreeExplainer::top_factors(&attributions, &feature_cols, &row, 2);
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].feature, "tenure");
        assert_eq!(factors[0].impact, Impact::Decreases);
        assert_eq!(factors[0].value, "N/A");
        assert_eq!(factors[1].feature, "Contract");
        assert_eq!(factors[1].impact, Impact::Increases);
        assert_eq!(factors[1].value, "Month-to-month");
    }

    #[test]
    fn test_top_factors_k_truncation() {
        let feature_cols = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let row = InputRow::new();
        let factors = TreeExplainer::top_factors(&[0.1, 0.3, 0.2], &feature_cols, &row, 1);
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].feature, "b");
    }

    #[test]
    fn test_global_importance_descending() {
        let bundle = trained();
        let importance = global_importance(&bundle);
        for pair in importance.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }
}
