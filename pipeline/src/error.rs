//! Error types for the pipeline engine

use thiserror::Error;

// Re-export the stage taxonomy from virta-core
pub use virta_core::StageError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline engine
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Stage processing error
    #[error(transparent)]
    Stage(#[from] StageError),
}
