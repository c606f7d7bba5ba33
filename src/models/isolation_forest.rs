//! Isolation Forest anomaly detector
//!
//! Anomalies are easier to isolate and thus have shorter average path lengths
//! across the trees. `score_samples` returns the normalized score
//! `2^(-E[h(x)] / c(n))` in (0, 1), higher = more anomalous, which already
//! matches the classifier's polarity.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Detector hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Number of isolation trees
    pub n_estimators: usize,
    /// Rows sampled (with replacement) per tree
    pub sample_size: usize,
    /// Expected fraction of anomalies; sets the standalone decision offset
    pub contamination: f64,
    /// Random seed for sampling and splits
    pub seed: u64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            sample_size: 256,
            contamination: 0.01,
            seed: 42,
        }
    }
}

/// Unsupervised anomaly detector over scaled feature rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    params: DetectorParams,
    trees: Vec<IsolationTree>,
    /// `c(sample_size)` normalization factor
    avg_path_length: f64,
    /// Score above which `predict` flags an anomaly; the
    /// `(1 - contamination)` quantile of training scores
    score_offset: f64,
    n_features: usize,
    trained: bool,
}

impl IsolationForest {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            avg_path_length: 0.0,
            score_offset: 0.5,
            n_features: 0,
            trained: false,
        }
    }

    /// Average unsuccessful-search path length in a BST of `n` nodes, c(n).
    fn average_path_length(n: usize) -> f64 {
        if n <= 1 {
            return 0.0;
        }
        let n = n as f64;
        2.0 * ((n - 1.0).ln() + 0.577_215_664_9) - 2.0 * (n - 1.0) / n
    }

    /// Build the forest over (unlabeled) training rows.
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        if rows.is_empty() {
            return Err(PipelineError::DataQuality(
                "isolation forest fit on empty training set".into(),
            ));
        }

        self.n_features = rows[0].len();
        let sample_size = self.params.sample_size.min(rows.len()).max(2);
        self.avg_path_length = Self::average_path_length(sample_size);
        self.trees.clear();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        for _ in 0..self.params.n_estimators {
            let sample: Vec<&[f64]> = (0..sample_size)
                .map(|_| rows[rng.random_range(0..rows.len())].as_slice())
                .collect();
            self.trees
                .push(IsolationTree::build(&sample, self.n_features, max_depth, &mut rng));
        }
        self.trained = true;

        // Derive the standalone decision offset from the training score
        // distribution, so `predict` flags roughly the contamination fraction.
        let mut scores: Vec<f64> = rows
            .iter()
            .map(|row| self.raw_score(row))
            .collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let quantile = (1.0 - self.params.contamination).clamp(0.0, 1.0);
        let idx = ((scores.len() - 1) as f64 * quantile).round() as usize;
        self.score_offset = scores[idx];

        Ok(())
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        if self.avg_path_length == 0.0 {
            // Degenerate single-row sample; no isolation signal
            return 0.5;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum();
        let avg_path = total / self.trees.len() as f64;
        2.0_f64.powf(-avg_path / self.avg_path_length)
    }

    /// Normalized anomaly score in (0, 1), higher = more anomalous.
    pub fn score_samples(&self, row: &[f64]) -> Result<f64> {
        if !self.trained {
            return Err(PipelineError::Inference(
                "isolation forest used before training".into(),
            ));
        }
        if row.len() != self.n_features {
            return Err(PipelineError::Inference(format!(
                "isolation forest expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(self.raw_score(row))
    }

    /// Standalone anomaly decision against the contamination-derived offset.
    pub fn predict(&self, row: &[f64]) -> Result<bool> {
        Ok(self.score_samples(row)? > self.score_offset)
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    root: Option<Box<IsolationNode>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    Internal {
        feature_idx: usize,
        split_value: f64,
        left: Option<Box<IsolationNode>>,
        right: Option<Box<IsolationNode>>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationTree {
    fn build(samples: &[&[f64]], n_features: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(samples, n_features, 0, max_depth, rng),
        }
    }

    fn build_node(
        samples: &[&[f64]],
        n_features: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Option<Box<IsolationNode>> {
        if samples.is_empty() {
            return None;
        }
        if depth >= max_depth || samples.len() <= 1 {
            return Some(Box::new(IsolationNode::Leaf {
                size: samples.len(),
            }));
        }

        let feature_idx = rng.random_range(0..n_features);
        let mut min_val = f64::MAX;
        let mut max_val = f64::MIN;
        for sample in samples {
            let val = sample[feature_idx];
            min_val = min_val.min(val);
            max_val = max_val.max(val);
        }
        if (max_val - min_val).abs() < f64::EPSILON {
            return Some(Box::new(IsolationNode::Leaf {
                size: samples.len(),
            }));
        }

        let split_value = rng.random_range(min_val..max_val);
        let (left_samples, right_samples): (Vec<&[f64]>, Vec<&[f64]>) = samples
            .iter()
            .partition(|s| s[feature_idx] < split_value);

        Some(Box::new(IsolationNode::Internal {
            feature_idx,
            split_value,
            left: Self::build_node(&left_samples, n_features, depth + 1, max_depth, rng),
            right: Self::build_node(&right_samples, n_features, depth + 1, max_depth, rng),
        }))
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        match &self.root {
            None => 0.0,
            Some(node) => Self::node_path_length(node, row, 0),
        }
    }

    fn node_path_length(node: &IsolationNode, row: &[f64], depth: usize) -> f64 {
        match node {
            IsolationNode::Leaf { size } => {
                depth as f64 + IsolationForest::average_path_length(*size)
            }
            IsolationNode::Internal {
                feature_idx,
                split_value,
                left,
                right,
            } => {
                let next = if row[*feature_idx] < *split_value {
                    left
                } else {
                    right
                };
                match next {
                    Some(n) => Self::node_path_length(n, row, depth + 1),
                    None => depth as f64 + 1.0,
                }
            }
        }
    }
}
