//! Type definitions for the fraud risk engine

pub mod score;
pub mod transaction;

pub use score::{RiskLevel, RiskLevelThresholds, ScoreResult};
pub use transaction::TransactionRecord;
