//! Error types for argus-threat.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreatError {
    #[error("Price event bus closed")]
    BusClosed,

    #[error("Draft delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, ThreatError>;
