//! Configuration management for the fraud risk engine

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{ClassifierParams, DetectorParams};
use crate::scorer::EnsembleConfig;
use crate::types::score::RiskLevelThresholds;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub classifier: ClassifierParams,
    pub detector: DetectorParams,
    pub ensemble: EnsembleConfig,
    pub risk_levels: RiskLevelThresholds,
    pub bundle: BundleConfig,
    pub logging: LoggingConfig,
}

/// Training data inputs and sampling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Transaction facts CSV
    pub transactions_path: PathBuf,
    /// Identity facts CSV, joined on TransactionID (optional)
    pub identity_path: Option<PathBuf>,
    /// Fraction of transaction rows used for training
    pub sample_fraction: f64,
    /// Fraction of sampled rows held out for validation
    pub validation_split: f64,
    /// Seed for sampling, splitting, and model training
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            transactions_path: PathBuf::from("data/train_transaction.csv"),
            identity_path: Some(PathBuf::from("data/train_identity.csv")),
            sample_fraction: 0.1,
            validation_split: 0.2,
            seed: 42,
        }
    }
}

/// Persisted bundle location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub path: PathBuf,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/fraud_detection_model.bin"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load from an explicit path, or fall back to defaults when none given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.data.sample_fraction, 0.1);
        assert_eq!(config.data.seed, 42);
        assert_eq!(config.classifier.n_estimators, 100);
        assert_eq!(config.classifier.max_depth, 4);
        assert_eq!(config.classifier.learning_rate, 0.05);
        assert_eq!(config.detector.n_estimators, 50);
        assert_eq!(config.detector.contamination, 0.01);
        assert_eq!(config.ensemble.classifier_weight, 0.7);
        assert_eq!(config.ensemble.anomaly_weight, 0.3);
        assert_eq!(config.ensemble.decision_threshold, 0.5);
    }

    #[test]
    fn test_partial_config_file() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[ensemble]\nclassifier_weight = 0.6\nanomaly_weight = 0.4"
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.ensemble.classifier_weight, 0.6);
        assert_eq!(config.ensemble.anomaly_weight, 0.4);
        // Unspecified sections keep their defaults
        assert_eq!(config.ensemble.decision_threshold, 0.5);
        assert_eq!(config.classifier.n_estimators, 100);
    }
}
