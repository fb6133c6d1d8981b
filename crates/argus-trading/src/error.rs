//! Error types for argus-trading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradingError {
    /// Request validation failed before reaching the engine.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Position not found: {0}")]
    NotFound(String),

    /// The engine rejected the order for insufficient balance.
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Trading engine unavailable: {0}")]
    UpstreamUnavailable(String),
}

pub type Result<T> = std::result::Result<T, TradingError>;
