//! Error taxonomy for the scoring pipeline

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the pipeline.
///
/// All variants are unrecoverable for the current request: the pipeline never
/// retries and never substitutes a default score. The serving boundary turns
/// them into user-visible messages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unprocessable input data (e.g. a fully-missing column, malformed field).
    #[error("data quality: {0}")]
    DataQuality(String),

    /// Scaler transform invoked before fitting.
    #[error("scaler transform called before fit")]
    ScalerNotFitted,

    /// Persisted model bundle is missing, corrupt, or incomplete.
    #[error("bundle load: {0}")]
    BundleLoad(String),

    /// Bundle artifact could not be written.
    #[error("bundle save: {0}")]
    BundleSave(String),

    /// A sub-model failed during scoring (wrong shape, untrained model).
    #[error("inference: {0}")]
    Inference(String),

    /// Training dataset could not be read or is malformed.
    #[error("dataset: {0}")]
    Dataset(String),
}
