//! Offline training pipeline producing a model bundle

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::bundle::ModelBundle;
use crate::config::AppConfig;
use crate::dataset::{self, LABEL_COLUMN, TRANSACTION_ID_COLUMN};
use crate::error::{PipelineError, Result};
use crate::eval::{self, EvalMetrics};
use crate::models::{GradientBoostClassifier, IsolationForest};
use crate::preprocess::Preprocessor;
use crate::scale::StandardScaler;
use crate::scorer::EnsembleScorer;

/// Summary of one training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub training_rows: usize,
    pub validation_rows: usize,
    pub feature_count: usize,
    pub fraud_rate: f64,
    pub metrics: EvalMetrics,
}

/// Run the full training pipeline:
/// load + sample + join → labels out → preprocess → split → scale → fit both
/// models → evaluate on the held-out split → assemble the bundle.
///
/// The caller persists the returned bundle; training never mutates an
/// existing artifact.
pub fn run_training(config: &AppConfig) -> Result<(ModelBundle, TrainingReport)> {
    info!("Loading and sampling training data");
    let mut table = dataset::load_training_table(
        &config.data.transactions_path,
        config.data.identity_path.as_ref(),
        config.data.sample_fraction,
        config.data.seed,
    )?;

    let labels = dataset::split_labels(&mut table, LABEL_COLUMN)?;
    table.drop_columns(&[TRANSACTION_ID_COLUMN]);
    if table.num_rows() == 0 {
        return Err(PipelineError::Dataset(
            "no training rows left after sampling".into(),
        ));
    }
    let fraud_rate = labels.iter().sum::<f64>() / labels.len() as f64;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        fraud_rate = format!("{:.4}", fraud_rate),
        "Preprocessing training data"
    );

    let (preprocessor, matrix) = Preprocessor::fit_transform(&table)?;
    let feature_columns = matrix.columns.clone();
    info!(features = feature_columns.len(), "Features encoded");

    let (train_idx, val_idx) =
        stratified_split(&labels, config.data.validation_split, config.data.seed);
    let train_matrix = matrix.select_rows(&train_idx);
    let val_matrix = matrix.select_rows(&val_idx);
    let train_labels: Vec<f64> = train_idx.iter().map(|&i| labels[i]).collect();
    let val_labels: Vec<f64> = val_idx.iter().map(|&i| labels[i]).collect();

    let mut scaler = StandardScaler::new();
    let scaled_train = scaler.fit_transform(&train_matrix)?;

    info!(
        n_estimators = config.classifier.n_estimators,
        max_depth = config.classifier.max_depth,
        "Training gradient boost classifier"
    );
    let mut classifier = GradientBoostClassifier::new(config.classifier.clone());
    classifier.fit(&scaled_train.rows, &train_labels)?;

    info!(
        n_estimators = config.detector.n_estimators,
        contamination = config.detector.contamination,
        "Training isolation forest"
    );
    let mut detector = IsolationForest::new(config.detector.clone());
    detector.fit(&scaled_train.rows)?;

    let metrics = if val_matrix.num_rows() > 0 {
        let scaled_val = scaler.transform(&val_matrix)?;
        let scorer = EnsembleScorer::new(config.ensemble.clone());
        let results = scorer.score_batch(&classifier, &detector, &scaled_val.rows)?;
        let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
        let metrics = eval::evaluate(
            &val_labels,
            &confidences,
            config.ensemble.decision_threshold,
        );
        info!(
            auc = format!("{:.4}", metrics.auc),
            precision = format!("{:.4}", metrics.precision),
            recall = format!("{:.4}", metrics.recall),
            f1 = format!("{:.4}", metrics.f1),
            "Validation metrics"
        );
        metrics
    } else {
        EvalMetrics::default()
    };

    let report = TrainingReport {
        training_rows: train_matrix.num_rows(),
        validation_rows: val_matrix.num_rows(),
        feature_count: feature_columns.len(),
        fraud_rate,
        metrics,
    };
    let bundle = ModelBundle::new(
        classifier,
        detector,
        scaler,
        preprocessor,
        feature_columns,
        report.training_rows,
    );
    Ok((bundle, report))
}

/// Split row indices into (train, validation), keeping the class balance of
/// both splits close to the overall one.
fn stratified_split(labels: &[f64], validation_split: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let validation_split = validation_split.clamp(0.0, 0.9);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut positives: Vec<usize> = Vec::new();
    let mut negatives: Vec<usize> = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label > 0.5 {
            positives.push(i);
        } else {
            negatives.push(i);
        }
    }
    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let mut train = Vec::new();
    let mut val = Vec::new();
    for class in [positives, negatives] {
        let n_val = ((class.len() as f64) * validation_split).round() as usize;
        val.extend_from_slice(&class[..n_val]);
        train.extend_from_slice(&class[n_val..]);
    }
    train.sort_unstable();
    val.sort_unstable();
    (train, val)
}
