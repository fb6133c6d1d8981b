//! Error types for argus-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid action token: {0}")]
    InvalidAction(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
