//! Scoring result data structures

use serde::{Deserialize, Serialize};

/// Risk level classification for display at the serving boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from a combined confidence and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            low: 0.3,
            medium: 0.5,
            high: 0.7,
            critical: 0.9,
        }
    }
}

/// Outcome of scoring one transaction. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Final decision: combined confidence above the decision threshold
    pub is_fraud: bool,

    /// Weighted blend of both model scores, in [0, 1]
    pub confidence: f64,

    /// Supervised classifier's fraud probability, in [0, 1]
    pub classifier_score: f64,

    /// Normalized anomaly score, higher = more anomalous
    pub anomaly_score: f64,
}

impl ScoreResult {
    /// Classify the combined confidence into a display risk level
    pub fn risk_level(&self, thresholds: &RiskLevelThresholds) -> RiskLevel {
        RiskLevel::from_score(self.confidence, thresholds)
    }
}
