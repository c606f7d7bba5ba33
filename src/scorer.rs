//! Ensemble scoring: weighted blend of classifier and anomaly scores

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{GradientBoostClassifier, IsolationForest};
use crate::types::score::ScoreResult;

/// Ensemble policy constants. Operational knobs, not learned parameters:
/// loaded from configuration so the fraud/anomaly trade-off can be retuned
/// without a code change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Weight on the supervised fraud probability
    pub classifier_weight: f64,
    /// Weight on the normalized anomaly score
    pub anomaly_weight: f64,
    /// Combined confidence above which a transaction is flagged
    pub decision_threshold: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            classifier_weight: 0.7,
            anomaly_weight: 0.3,
            decision_threshold: 0.5,
        }
    }
}

/// Combines the two sub-model scores into one confidence and decision.
#[derive(Debug, Clone)]
pub struct EnsembleScorer {
    config: EnsembleConfig,
}

impl EnsembleScorer {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Score one scaled, aligned feature row. Fails with `Inference` if
    /// either sub-model raises; never returns a partial result.
    pub fn score(
        &self,
        classifier: &GradientBoostClassifier,
        detector: &IsolationForest,
        row: &[f64],
    ) -> Result<ScoreResult> {
        let classifier_score = classifier.predict_proba(row)?;
        let anomaly_score = detector.score_samples(row)?;

        let confidence = (self.config.classifier_weight * classifier_score
            + self.config.anomaly_weight * anomaly_score)
            .clamp(0.0, 1.0);

        Ok(ScoreResult {
            is_fraud: confidence > self.config.decision_threshold,
            confidence,
            classifier_score,
            anomaly_score,
        })
    }

    /// Score a batch of rows; any sub-model failure fails the whole batch.
    pub fn score_batch(
        &self,
        classifier: &GradientBoostClassifier,
        detector: &IsolationForest,
        rows: &[Vec<f64>],
    ) -> Result<Vec<ScoreResult>> {
        rows.iter()
            .map(|row| self.score(classifier, detector, row))
            .collect()
    }
}
