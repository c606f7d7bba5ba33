//! Native ML models trained and persisted by the pipeline

pub mod gradient_boost;
pub mod isolation_forest;

pub use gradient_boost::{ClassifierParams, GradientBoostClassifier};
pub use isolation_forest::{DetectorParams, IsolationForest};
