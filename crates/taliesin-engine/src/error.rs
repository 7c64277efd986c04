//! Error types for the scheduling and session layer.

use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend rejected us before any task started.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[from] taliesin_llm::GenerationError),

    /// The session request is malformed.
    #[error("Invalid session request: {0}")]
    InvalidRequest(String),
}
