//! Error types for argus-store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Notification not found: {0}")]
    NotFound(String),

    #[error("Store actor unavailable")]
    Unavailable,
}

pub type Result<T> = std::result::Result<T, StoreError>;
