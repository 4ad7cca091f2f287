//! Error types for the eye engine

use thiserror::Error;

/// Errors raised when a caller breaks a precondition of the engine.
///
/// None of these are recoverable at runtime; they signal a bug in the
/// host integration and are returned from the call that would have
/// created the malformed object.
#[derive(Error, Debug)]
pub enum EyeError {
    #[error("sphere segment count must be positive")]
    ZeroSegments,

    #[error("tween duration must be positive and finite, got {0} ms")]
    InvalidDuration(f32),

    #[error("unknown eye state: {0:?}")]
    UnknownState(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EyeError>;
