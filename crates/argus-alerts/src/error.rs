//! Error types for argus-alerts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Invalid alert: {0}")]
    Invalid(String),

    #[error("Alert not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Core(#[from] argus_core::CoreError),
}

pub type Result<T> = std::result::Result<T, AlertError>;
