//! Binary classification metrics
//!
//! ROC-AUC is the rank statistic (Mann-Whitney U with tied-rank averaging);
//! accuracy, precision, and recall are computed at a fixed decision
//! threshold. Degenerate inputs return the conventional fallbacks rather
//! than NaN: 0.5 for AUC with a single class, 0.0 for a zero denominator.

use serde::{Deserialize, Serialize};

/// Held-out evaluation scores stored in bundle metadata
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub roc_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl EvalMetrics {
    /// Evaluate scores against labels at the given decision threshold
    #[must_use]
    pub fn compute(labels: &[u8], scores: &[f64], threshold: f64) -> Self {
        let preds: Vec<u8> = scores.iter().map(|&s| u8::from(s >= threshold)).collect();
        Self {
            roc_auc: roc_auc(labels, scores),
            accuracy: accuracy(labels, &preds),
            precision: precision(labels, &preds),
            recall: recall(labels, &preds),
        }
    }
}

/// Rank-based ROC-AUC; 0.5 when either class is absent
#[must_use]
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average ranks across tie groups so equal scores share one rank
    let mut ranks = vec![0.0; labels.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

/// Fraction of correct predictions; 0.0 on empty input
#[must_use]
pub fn accuracy(labels: &[u8], preds: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels.iter().zip(preds).filter(|(l, p)| l == p).count();
    correct as f64 / labels.len() as f64
}

/// TP / (TP + FP); 0.0 when nothing was predicted positive
#[must_use]
pub fn precision(labels: &[u8], preds: &[u8]) -> f64 {
    let tp = count(labels, preds, 1, 1);
    let fp = count(labels, preds, 0, 1);
    if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

/// TP / (TP + FN); 0.0 when no positives exist
#[must_use]
pub fn recall(labels: &[u8], preds: &[u8]) -> f64 {
    let tp = count(labels, preds, 1, 1);
    let fn_ = count(labels, preds, 1, 0);
    if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    }
}

fn count(labels: &[u8], preds: &[u8], label: u8, pred: u8) -> usize {
    labels
        .iter()
        .zip(preds)
        .filter(|(&l, &p)| l == label && p == pred)
        .count()
}
