//! Scoring engine: the serving-side pipeline over a loaded bundle
//!
//! The bundle is injected explicitly and shared read-only; score calls are
//! stateless and safe to run in parallel against the same `Arc<ModelBundle>`.

use std::sync::Arc;
use tracing::debug;

use crate::align::align;
use crate::bundle::ModelBundle;
use crate::error::{PipelineError, Result};
use crate::scorer::{EnsembleConfig, EnsembleScorer};
use crate::types::score::ScoreResult;
use crate::types::transaction::TransactionRecord;

/// Scores transactions against one immutable model bundle.
pub struct ScoringEngine {
    bundle: Arc<ModelBundle>,
    scorer: EnsembleScorer,
}

impl ScoringEngine {
    pub fn new(bundle: Arc<ModelBundle>, config: EnsembleConfig) -> Self {
        Self {
            bundle,
            scorer: EnsembleScorer::new(config),
        }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Run one record through the full pipeline:
    /// validate → preprocess → align → scale → ensemble score.
    pub fn score(&self, record: &TransactionRecord) -> Result<ScoreResult> {
        record.validate()?;

        let table = record.to_table();
        let matrix = self.bundle.preprocessor().transform(&table)?;
        let (aligned, report) = align(&matrix, self.bundle.feature_columns());
        if !report.is_clean() {
            debug!(
                added = report.added.len(),
                dropped = report.dropped.len(),
                "record features aligned to canonical columns"
            );
        }
        let scaled = self.bundle.scaler().transform(&aligned)?;

        let row = scaled.rows.first().ok_or_else(|| {
            PipelineError::Inference("preprocessing produced no feature row".into())
        })?;
        let result = self
            .scorer
            .score(self.bundle.classifier(), self.bundle.detector(), row)?;

        debug!(
            confidence = result.confidence,
            classifier_score = result.classifier_score,
            anomaly_score = result.anomaly_score,
            is_fraud = result.is_fraud,
            "transaction scored"
        );
        Ok(result)
    }

    /// Score several records; any failure aborts the batch.
    pub fn score_batch(&self, records: &[TransactionRecord]) -> Result<Vec<ScoreResult>> {
        records.iter().map(|record| self.score(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClassifierParams, DetectorParams, GradientBoostClassifier, IsolationForest,
    };
    use crate::preprocess::Preprocessor;
    use crate::scale::StandardScaler;
    use crate::table::{Column, FeatureTable};

    fn trained_engine() -> ScoringEngine {
        let n = 80;
        let mut table = FeatureTable::new();
        table
            .push_column(
                "TransactionAmt",
                Column::Numeric(
                    (0..n)
                        .map(|i| Some(if i % 4 == 0 { 900.0 } else { 20.0 + i as f64 }))
                        .collect(),
                ),
            )
            .unwrap();
        table
            .push_column(
                "card4",
                Column::Categorical(
                    (0..n)
                        .map(|i| Some(if i % 4 == 0 { "discover" } else { "visa" }.to_string()))
                        .collect(),
                ),
            )
            .unwrap();
        table
            .push_column(
                "dist1",
                Column::Numeric((0..n).map(|i| Some((i % 15) as f64)).collect()),
            )
            .unwrap();
        let labels: Vec<f64> = (0..n).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }).collect();

        let (preprocessor, matrix) = Preprocessor::fit_transform(&table).unwrap();
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&matrix).unwrap();

        let mut classifier = GradientBoostClassifier::new(ClassifierParams {
            n_estimators: 20,
            ..Default::default()
        });
        classifier.fit(&scaled.rows, &labels).unwrap();
        let mut detector = IsolationForest::new(DetectorParams {
            n_estimators: 20,
            sample_size: 32,
            ..Default::default()
        });
        detector.fit(&scaled.rows).unwrap();

        let bundle = ModelBundle::new(
            classifier,
            detector,
            scaler,
            preprocessor,
            matrix.columns,
            n,
        );
        ScoringEngine::new(Arc::new(bundle), EnsembleConfig::default())
    }

    #[test]
    fn test_score_single_record() {
        let engine = trained_engine();
        let mut record = TransactionRecord::new(900.0);
        record.card4 = Some("discover".into());

        let result = engine.score(&record).unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
        assert_eq!(result.is_fraud, result.confidence > 0.5);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let engine = trained_engine();
        let mut record = TransactionRecord::new(250.0);
        record.card4 = Some("visa".into());
        record.dist1 = Some(10.0);

        let first = engine.score(&record).unwrap();
        let second = engine.score(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_record_rejected() {
        let engine = trained_engine();
        let record = TransactionRecord::new(f64::INFINITY);
        let err = engine.score(&record).unwrap_err();
        assert!(matches!(err, PipelineError::DataQuality(_)));
    }

    #[test]
    fn test_fraud_pattern_scores_higher_than_baseline() {
        let engine = trained_engine();

        let mut fraud_like = TransactionRecord::new(900.0);
        fraud_like.card4 = Some("discover".into());
        let mut baseline = TransactionRecord::new(40.0);
        baseline.card4 = Some("visa".into());
        baseline.dist1 = Some(5.0);

        let high = engine.score(&fraud_like).unwrap();
        let low = engine.score(&baseline).unwrap();
        assert!(
            high.confidence > low.confidence,
            "fraud-patterned record ({}) should outscore baseline ({})",
            high.confidence,
            low.confidence
        );
    }
}
