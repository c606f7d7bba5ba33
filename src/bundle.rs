//! Persisted model bundle: the atomic set of co-trained artifacts
//!
//! The classifier, anomaly detector, scaler, fitted preprocessor, and
//! canonical feature-column list are serialized as one bincode record so a
//! scoring process always operates against a consistent training snapshot.
//! Retraining produces a new bundle file; there is no in-place mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::models::{GradientBoostClassifier, IsolationForest};
use crate::preprocess::FittedPreprocessor;
use crate::scale::StandardScaler;

/// On-disk format version; bumped on incompatible layout changes.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Provenance recorded alongside the trained artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub bundle_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
    pub feature_count: usize,
}

/// The four co-trained artifacts plus the fitted preprocessing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    version: u32,
    metadata: BundleMetadata,
    classifier: GradientBoostClassifier,
    detector: IsolationForest,
    scaler: StandardScaler,
    preprocessor: FittedPreprocessor,
    feature_columns: Vec<String>,
}

impl ModelBundle {
    pub fn new(
        classifier: GradientBoostClassifier,
        detector: IsolationForest,
        scaler: StandardScaler,
        preprocessor: FittedPreprocessor,
        feature_columns: Vec<String>,
        training_rows: usize,
    ) -> Self {
        let metadata = BundleMetadata {
            bundle_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            training_rows,
            feature_count: feature_columns.len(),
        };
        Self {
            version: BUNDLE_FORMAT_VERSION,
            metadata,
            classifier,
            detector,
            scaler,
            preprocessor,
            feature_columns,
        }
    }

    // Read-only accessors; the bundle is immutable after construction.

    pub fn classifier(&self) -> &GradientBoostClassifier {
        &self.classifier
    }

    pub fn detector(&self) -> &IsolationForest {
        &self.detector
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    /// Ordered feature-column set the models were trained on.
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Reject bundles with a stale format or an untrained/empty member.
    fn validate(&self) -> Result<()> {
        if self.version != BUNDLE_FORMAT_VERSION {
            return Err(PipelineError::BundleLoad(format!(
                "unsupported bundle format version {} (expected {})",
                self.version, BUNDLE_FORMAT_VERSION
            )));
        }
        if self.feature_columns.is_empty() {
            return Err(PipelineError::BundleLoad(
                "bundle has no canonical feature columns".into(),
            ));
        }
        if !self.classifier.is_trained() {
            return Err(PipelineError::BundleLoad(
                "bundle classifier member is untrained".into(),
            ));
        }
        if !self.detector.is_trained() {
            return Err(PipelineError::BundleLoad(
                "bundle anomaly detector member is untrained".into(),
            ));
        }
        if !self.scaler.is_fitted() {
            return Err(PipelineError::BundleLoad(
                "bundle scaler member is unfitted".into(),
            ));
        }
        if self.preprocessor.is_empty() {
            return Err(PipelineError::BundleLoad(
                "bundle preprocessor member is unfitted".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to `path`. Writes a temp file in the same directory and
    /// renames it over the target, so in-flight readers of the old bundle are
    /// never exposed to a half-written artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()
            .map_err(|e| PipelineError::BundleSave(format!("refusing to save invalid bundle: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::BundleSave(format!("{}: {e}", parent.display())))?;
            }
        }

        let tmp_path = path.with_extension("tmp");
        let file = File::create(&tmp_path)
            .map_err(|e| PipelineError::BundleSave(format!("{}: {e}", tmp_path.display())))?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)
            .map_err(|e| PipelineError::BundleSave(format!("{}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| PipelineError::BundleSave(format!("{}: {e}", path.display())))?;

        info!(
            path = %path.display(),
            bundle_id = %self.metadata.bundle_id,
            features = self.feature_columns.len(),
            "Saved model bundle"
        );
        Ok(())
    }

    /// Load and validate a bundle. Fails with `BundleLoad` on a missing file,
    /// corrupt payload, version mismatch, or untrained member; never returns
    /// a partially-populated bundle.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::BundleLoad(format!(
                "bundle file not found: {}",
                path.display()
            )));
        }

        // Decode from an in-memory slice: a corrupt length prefix then fails
        // cleanly instead of driving a huge allocation from the reader.
        let bytes = fs::read(path)
            .map_err(|e| PipelineError::BundleLoad(format!("{}: {e}", path.display())))?;
        let bundle: ModelBundle = bincode::deserialize(&bytes).map_err(|e| {
            PipelineError::BundleLoad(format!("corrupt bundle {}: {e}", path.display()))
        })?;
        bundle.validate()?;

        info!(
            path = %path.display(),
            bundle_id = %bundle.metadata.bundle_id,
            trained_at = %bundle.metadata.trained_at,
            features = bundle.feature_columns.len(),
            "Loaded model bundle"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierParams, DetectorParams};
    use std::io::Write;

    fn trained_bundle() -> ModelBundle {
        use crate::preprocess::Preprocessor;
        use crate::table::{Column, FeatureTable};

        let mut table = FeatureTable::new();
        table
            .push_column(
                "TransactionAmt",
                Column::Numeric((0..50).map(|i| Some(10.0 + i as f64)).collect()),
            )
            .unwrap();
        table
            .push_column(
                "card4",
                Column::Categorical(
                    (0..50)
                        .map(|i| Some(if i % 2 == 0 { "visa" } else { "mastercard" }.to_string()))
                        .collect(),
                ),
            )
            .unwrap();

        let (preprocessor, matrix) = Preprocessor::fit_transform(&table).unwrap();
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&matrix).unwrap();

        let labels: Vec<f64> = (0..50).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect();
        let mut classifier = GradientBoostClassifier::new(ClassifierParams {
            n_estimators: 5,
            ..Default::default()
        });
        classifier.fit(&scaled.rows, &labels).unwrap();
        let mut detector = IsolationForest::new(DetectorParams {
            n_estimators: 5,
            sample_size: 16,
            ..Default::default()
        });
        detector.fit(&scaled.rows).unwrap();

        ModelBundle::new(
            classifier,
            detector,
            scaler,
            preprocessor,
            matrix.columns,
            50,
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.bin");

        let bundle = trained_bundle();
        bundle.save(&path).unwrap();

        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded.metadata().bundle_id, bundle.metadata().bundle_id);
        assert_eq!(loaded.feature_columns(), bundle.feature_columns());
        assert!(loaded.classifier().is_trained());
        assert!(loaded.detector().is_trained());
        assert!(loaded.scaler().is_fitted());
    }

    #[test]
    fn test_missing_file_fails() {
        let err = ModelBundle::load("/nonexistent/bundle.bin").unwrap_err();
        assert!(matches!(err, PipelineError::BundleLoad(_)));
    }

    #[test]
    fn test_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"not a bundle").unwrap();

        let err = ModelBundle::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::BundleLoad(_)));
    }

    #[test]
    fn test_oversized_length_prefix_fails_cleanly() {
        // Bytes that decode as a multi-exabyte collection length must come
        // back as a load error, not an allocation attempt.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0xFF; 32]).unwrap();

        let err = ModelBundle::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::BundleLoad(_)));
    }

    #[test]
    fn test_untrained_member_rejected_on_save() {
        let bundle = ModelBundle::new(
            GradientBoostClassifier::new(ClassifierParams::default()),
            IsolationForest::new(DetectorParams::default()),
            StandardScaler::new(),
            FittedPreprocessor::default(),
            vec!["a".into()],
            0,
        );
        let dir = tempfile::tempdir().unwrap();
        let err = bundle.save(dir.path().join("bundle.bin")).unwrap_err();
        assert!(matches!(err, PipelineError::BundleSave(_)));
    }
}
