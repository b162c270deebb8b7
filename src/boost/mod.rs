//! Gradient-boosted tree ensemble (binary logistic)
//!
//! A deterministic exact-greedy GBDT: second-order (Newton) boosting on the
//! logistic loss, depth-limited regression trees, L2-regularized leaf
//! weights, and per-feature gain accounting for global importances.
//!
//! Every node stores its weight — internal nodes included — so a decision
//! path decomposes additively (see `explain`). Leaf weights are stored
//! already scaled by the learning rate; the ensemble margin is
//! `base_score + Σ tree(x)`.
//!
//! Training is deterministic for a given input order: split search iterates
//! features left to right and ties keep the first candidate, so refitting
//! the same data always yields the same ensemble.

use serde::{Deserialize, Serialize};

/// Splits below this gain are not worth a node
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Hessian floor keeping leaf weights finite on saturated predictions
const MIN_HESSIAN: f64 = 1e-16;

/// Ensemble hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 regularization on leaf weights
    pub lambda: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            lambda: 1.0,
        }
    }
}

/// A node in the index-linked tree arena
///
/// `value` is the node's regularized weight (what this node would predict as
/// a leaf), kept on split nodes too so path attributions can difference
/// parent and child weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        value: f64,
        left: usize,
        right: usize,
    },
}

impl Node {
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Node::Leaf { value } | Node::Split { value, .. } => *value,
        }
    }
}

/// A single regression tree over arena-indexed nodes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
}

impl Tree {
    /// Margin contribution for one row (rate-scaled leaf weight)
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if x[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Weight of the root node (the tree's expected contribution)
    #[must_use]
    pub fn root_value(&self) -> f64 {
        self.nodes.first().map_or(0.0, Node::value)
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// The trained ensemble
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub(crate) trees: Vec<Tree>,
    pub(crate) base_score: f64,
    pub(crate) n_features: usize,
    /// Total split gain accumulated per feature during fitting
    pub(crate) gain: Vec<f64>,
}

impl GradientBoostedTrees {
    /// Fit on a row-major design matrix with 0/1 labels
    #[must_use]
    pub fn fit(rows: &[Vec<f64>], labels: &[f64], params: &BoostParams) -> Self {
        let n = rows.len();
        let n_features = rows.first().map_or(0, Vec::len);
        if n == 0 || n_features == 0 {
            return Self {
                trees: Vec::new(),
                base_score: 0.0,
                n_features,
                gain: vec![0.0; n_features],
            };
        }

        let positive = labels.iter().sum::<f64>();
        let prior = (positive / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let mut margins = vec![base_score; n];
        let mut gain = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grad[i] = p - labels[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let mut builder = TreeBuilder {
                rows,
                grad: &grad,
                hess: &hess,
                params,
                gain: &mut gain,
                nodes: Vec::new(),
            };
            builder.build((0..n).collect(), 0);
            let tree = Tree {
                nodes: builder.nodes,
            };

            for (i, row) in rows.iter().enumerate() {
                margins[i] += tree.predict(row);
            }
            trees.push(tree);
        }

        Self {
            trees,
            base_score,
            n_features,
            gain,
        }
    }

    /// Raw additive output in logit space
    #[must_use]
    pub fn predict_margin(&self, x: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    /// Positive-class probability
    #[must_use]
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        sigmoid(self.predict_margin(x))
    }

    /// Positive-class probabilities for a whole matrix
    #[must_use]
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|x| self.predict_proba(x)).collect()
    }

    /// Normalized gain-based importance per feature (sums to 1 when any
    /// split exists; all-zero otherwise)
    #[must_use]
    pub fn feature_importance(&self) -> Vec<f64> {
        let total: f64 = self.gain.iter().sum();
        if total > 0.0 {
            self.gain.iter().map(|g| g / total).collect()
        } else {
            vec![0.0; self.n_features]
        }
    }

    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    #[must_use]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoostParams,
    gain: &'a mut Vec<f64>,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    /// Grow a subtree over `indices`, returning its arena index
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let g: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let value = self.params.learning_rate * (-g / (h + self.params.lambda));

        if depth >= self.params.max_depth || indices.len() < 2 * self.params.min_samples_leaf {
            self.nodes.push(Node::Leaf { value });
            return self.nodes.len() - 1;
        }

        let Some(split) = self.best_split(&indices, g, h) else {
            self.nodes.push(Node::Leaf { value });
            return self.nodes.len() - 1;
        };

        self.gain[split.feature] += split.gain;
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.rows[i][split.feature] < split.threshold);

        // Reserve the slot before recursing so child indices are known
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { value });
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            value,
            left,
            right,
        };
        slot
    }

    fn best_split(&self, indices: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let lambda = self.params.lambda;
        let parent_score = g_total * g_total / (h_total + lambda);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..self.rows[indices[0]].len() {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| self.rows[a][feature].total_cmp(&self.rows[b][feature]));

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            for k in 0..order.len() - 1 {
                let i = order[k];
                g_left += self.grad[i];
                h_left += self.hess[i];

                let v = self.rows[i][feature];
                let v_next = self.rows[order[k + 1]][feature];
                if v >= v_next {
                    continue; // no boundary inside a tie group
                }
                let left_count = k + 1;
                let right_count = order.len() - left_count;
                if left_count < self.params.min_samples_leaf
                    || right_count < self.params.min_samples_leaf
                {
                    continue;
                }

                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                let gain = 0.5
                    * (g_left * g_left / (h_left + lambda)
                        + g_right * g_right / (h_right + lambda)
                        - parent_score);
                if gain > MIN_SPLIT_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: 0.5 * (v + v_next),
                        gain,
                    });
                }
            }
        }
        best
    }
}
