//! Fraud Risk Engine Library
//!
//! Trains and serves an ensemble fraud model: a gradient boost classifier
//! blended with an isolation forest over standardized transaction features.

pub mod align;
pub mod bundle;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod eval;
pub mod models;
pub mod preprocess;
pub mod scale;
pub mod scorer;
pub mod table;
pub mod train;
pub mod types;

pub use bundle::ModelBundle;
pub use config::AppConfig;
pub use engine::ScoringEngine;
pub use error::{PipelineError, Result};
pub use scorer::{EnsembleConfig, EnsembleScorer};
pub use types::{score::ScoreResult, transaction::TransactionRecord};
