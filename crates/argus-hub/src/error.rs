//! Error types for the hub binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
