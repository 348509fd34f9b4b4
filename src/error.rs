//! Krrish Error Types
//!
//! Centralized error handling for the assistant library.

use thiserror::Error;

/// Central error type for Krrish
#[derive(Error, Debug)]
pub enum KrrishError {
    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Unsupported language tag: {0}")]
    Language(String),

    #[error("Event loop closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Krrish operations
pub type KrrishResult<T> = Result<T, KrrishError>;
