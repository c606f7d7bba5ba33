//! Gradient-boosted tree classifier
//!
//! Depth-limited regression trees fit to logistic-loss residuals, with row
//! subsampling per boosting round and feature subsampling per tree. Leaf
//! values use a single Newton step (sum of residuals over sum of hessians).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Classifier hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Row subsample ratio per boosting round
    pub subsample: f64,
    /// Feature subsample ratio per tree
    pub colsample_bytree: f64,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Random seed for subsampling
    pub seed: u64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 4,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample_bytree: 0.8,
            min_samples_split: 10,
            seed: 42,
        }
    }
}

/// Node of a regression tree over residuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if row[*feature_idx] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// Supervised fraud classifier: `fit` on labeled rows, `predict_proba` yields
/// the positive-class probability in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostClassifier {
    params: ClassifierParams,
    trees: Vec<TreeNode>,
    /// Initial prediction in log-odds space
    base_score: f64,
    n_features: usize,
    trained: bool,
}

impl GradientBoostClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            trained: false,
        }
    }

    /// Train on labeled rows (label 1.0 = fraud, 0.0 = legitimate).
    pub fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<()> {
        if rows.is_empty() {
            return Err(PipelineError::DataQuality(
                "classifier fit on empty training set".into(),
            ));
        }
        if rows.len() != labels.len() {
            return Err(PipelineError::DataQuality(format!(
                "classifier fit with {} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }

        self.n_features = rows[0].len();
        self.trees.clear();

        let n = rows.len();
        let positive_rate = (labels.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (positive_rate / (1.0 - positive_rate)).ln();

        let mut raw: Vec<f64> = vec![self.base_score; n];
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        for _ in 0..self.params.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&x| sigmoid(x)).collect();
            let residuals: Vec<f64> = labels
                .iter()
                .zip(probs.iter())
                .map(|(y, p)| y - p)
                .collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            // Row subsample for this round
            let indices: Vec<usize> = (0..n)
                .filter(|_| rng.random::<f64>() < self.params.subsample)
                .collect();
            if indices.is_empty() {
                continue;
            }

            // Feature subsample for this tree
            let take = ((self.n_features as f64 * self.params.colsample_bytree).ceil() as usize)
                .clamp(1, self.n_features);
            let mut features: Vec<usize> = (0..self.n_features).collect();
            features.shuffle(&mut rng);
            features.truncate(take);
            features.sort_unstable();

            let tree = build_tree(
                rows,
                &residuals,
                &hessians,
                &indices,
                &features,
                0,
                &self.params,
            );
            for (i, row) in rows.iter().enumerate() {
                raw[i] += self.params.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        self.trained = true;
        Ok(())
    }

    /// Positive-class probability for one feature row.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        if !self.trained {
            return Err(PipelineError::Inference(
                "classifier used before training".into(),
            ));
        }
        if row.len() != self.n_features {
            return Err(PipelineError::Inference(format!(
                "classifier expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let mut score = self.base_score;
        for tree in &self.trees {
            score += self.params.learning_rate * tree.predict(row);
        }
        Ok(sigmoid(score))
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }
}

fn build_tree(
    rows: &[Vec<f64>],
    residuals: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    depth: usize,
    params: &ClassifierParams,
) -> TreeNode {
    if depth >= params.max_depth || indices.len() < params.min_samples_split {
        return TreeNode::Leaf {
            value: newton_leaf(indices, residuals, hessians),
        };
    }

    let node_variance = variance_at(indices, residuals);
    let mut best_gain = 0.0;
    let mut best: Option<(usize, f64)> = None;

    for &feature_idx in features {
        let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature_idx]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();
        if values.len() < 2 {
            continue;
        }

        // Cap candidate thresholds to bound the split search
        let step = (values.len() / 32).max(1);
        for threshold in values.iter().skip(1).step_by(step) {
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| rows[i][feature_idx] < *threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }

            let left_weight = left.len() as f64 / indices.len() as f64;
            let right_weight = right.len() as f64 / indices.len() as f64;
            let gain = node_variance
                - (left_weight * variance_at(&left, residuals)
                    + right_weight * variance_at(&right, residuals));
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature_idx, *threshold));
            }
        }
    }

    match best {
        Some((feature_idx, threshold)) => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| rows[i][feature_idx] < threshold);
            TreeNode::Split {
                feature_idx,
                // Split applied as `<= threshold` goes left; the candidate was
                // chosen with `< threshold`, so nudge the stored threshold to
                // the midpoint below it.
                threshold: threshold - f64::EPSILON.max(threshold.abs() * 1e-12),
                left: Box::new(build_tree(
                    rows, residuals, hessians, &left_idx, features, depth + 1, params,
                )),
                right: Box::new(build_tree(
                    rows, residuals, hessians, &right_idx, features, depth + 1, params,
                )),
            }
        }
        None => TreeNode::Leaf {
            value: newton_leaf(indices, residuals, hessians),
        },
    }
}

/// Newton-step leaf value: sum(residuals) / sum(hessians).
fn newton_leaf(indices: &[usize], residuals: &[f64], hessians: &[f64]) -> f64 {
    let num: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let den: f64 = indices.iter().map(|&i| hessians[i]).sum();
    (num / (den + 1e-12)).clamp(-4.0, 4.0)
}

fn variance_at(indices: &[usize], values: &[f64]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let n = indices.len() as f64;
    let mean: f64 = indices.iter().map(|&i| values[i]).sum::<f64>() / n;
    indices
        .iter()
        .map(|&i| (values[i] - mean).powi(2))
        .sum::<f64>()
        / n
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // Two clusters: fraud around (10, 10), legitimate around (0, 0)
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..60 {
            let jitter = (i % 7) as f64 * 0.1;
            rows.push(vec![jitter, -jitter]);
            labels.push(0.0);
            rows.push(vec![10.0 + jitter, 10.0 - jitter]);
            labels.push(1.0);
        }
        (rows, labels)
    }

    #[test]
    fn test_fit_separates_classes() {
        let (rows, labels) = separable_data();
        let mut clf = GradientBoostClassifier::new(ClassifierParams {
            n_estimators: 30,
            ..Default::default()
        });
        clf.fit(&rows, &labels).unwrap();
        assert!(clf.is_trained());

        let fraud = clf.predict_proba(&[10.0, 10.0]).unwrap();
        let legit = clf.predict_proba(&[0.0, 0.0]).unwrap();
        assert!(fraud > 0.8, "fraud proba {fraud} should be high");
        assert!(legit < 0.2, "legit proba {legit} should be low");
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let clf = GradientBoostClassifier::new(ClassifierParams::default());
        let err = clf.predict_proba(&[1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let (rows, labels) = separable_data();
        let mut clf = GradientBoostClassifier::new(ClassifierParams {
            n_estimators: 5,
            ..Default::default()
        });
        clf.fit(&rows, &labels).unwrap();

        let err = clf.predict_proba(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let (rows, labels) = separable_data();
        let params = ClassifierParams {
            n_estimators: 10,
            ..Default::default()
        };

        let mut a = GradientBoostClassifier::new(params.clone());
        a.fit(&rows, &labels).unwrap();
        let mut b = GradientBoostClassifier::new(params);
        b.fit(&rows, &labels).unwrap();

        let pa = a.predict_proba(&[5.0, 5.0]).unwrap();
        let pb = b.predict_proba(&[5.0, 5.0]).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_empty_fit_fails() {
        let mut clf = GradientBoostClassifier::new(ClassifierParams::default());
        let err = clf.fit(&[], &[]).unwrap_err();
        assert!(matches!(err, PipelineError::DataQuality(_)));
    }
}
