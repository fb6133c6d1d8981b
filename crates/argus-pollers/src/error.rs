//! Error types for argus-pollers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollerError {
    /// Provider signalled a rate limit; the runner doubles the interval.
    #[error("Provider rate limited")]
    RateLimited,

    /// Provider call failed after retries.
    #[error("Provider failed: {0}")]
    Provider(String),

    /// Malformed provider payload.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<argus_market::MarketError> for PollerError {
    fn from(e: argus_market::MarketError) -> Self {
        match e {
            argus_market::MarketError::RateLimited => Self::RateLimited,
            other => Self::Provider(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PollerError>;
