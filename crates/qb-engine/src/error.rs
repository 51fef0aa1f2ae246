//! Engine error types.

use thiserror::Error;

/// Errors that can occur inside the decision engine.
///
/// Note that the decision pipeline itself never fails for ordinary
/// inputs — these errors surface only at startup, when loading classifier
/// artifacts. Registry fetch failures travel as `anyhow::Error` through
/// the snapshot source and are absorbed by the cache.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("classifier artifact {path}: {message}")]
    Artifact { path: String, message: String },
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
