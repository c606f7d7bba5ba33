//! Validation metrics for the training pipeline

use serde::Serialize;

/// Classification quality of the combined score on a held-out split.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalMetrics {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
}

/// Evaluate `(labels, scores)` at `threshold`. Labels are 0/1; scores are the
/// combined confidences.
pub fn evaluate(labels: &[f64], scores: &[f64], threshold: f64) -> EvalMetrics {
    let mut metrics = EvalMetrics {
        auc: roc_auc(labels, scores),
        ..Default::default()
    };

    for (label, score) in labels.iter().zip(scores.iter()) {
        let predicted = *score > threshold;
        let actual = *label > 0.5;
        match (actual, predicted) {
            (true, true) => metrics.true_positives += 1,
            (false, true) => metrics.false_positives += 1,
            (false, false) => metrics.true_negatives += 1,
            (true, false) => metrics.false_negatives += 1,
        }
    }

    let tp = metrics.true_positives as f64;
    let fp = metrics.false_positives as f64;
    let fn_ = metrics.false_negatives as f64;
    metrics.precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    metrics.recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    metrics.f1 = if metrics.precision + metrics.recall > 0.0 {
        2.0 * metrics.precision * metrics.recall / (metrics.precision + metrics.recall)
    } else {
        0.0
    };
    metrics
}

/// Rank-based ROC AUC (Mann-Whitney U), with average ranks for ties.
/// Returns 0.5 when either class is absent.
fn roc_auc(labels: &[f64], scores: &[f64]) -> f64 {
    let positives = labels.iter().filter(|&&l| l > 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut indexed: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels.iter())
        .map(|(&s, &l)| (s, l > 0.5))
        .collect();
    indexed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    // Average ranks over tied score groups
    let mut rank_sum_positive = 0.0;
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j < indexed.len() && indexed[j].0 == indexed[i].0 {
            j += 1;
        }
        let avg_rank = ((i + 1 + j) as f64) / 2.0;
        for item in &indexed[i..j] {
            if item.1 {
                rank_sum_positive += avg_rank;
            }
        }
        i = j;
    }

    let p = positives as f64;
    let n = negatives as f64;
    (rank_sum_positive - p * (p + 1.0) / 2.0) / (p * n)
}
