//! Error types for argus-market.

use thiserror::Error;

/// Market adapter errors.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The exchange does not list this symbol. Never retried.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Transient provider failure that survived the retry policy.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Provider returned a rate-limit response. The caller's backoff
    /// reacts; the call itself is not retried.
    #[error("Rate limited by provider")]
    RateLimited,

    /// Malformed provider payload.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl MarketError {
    /// Whether the retry policy may re-attempt after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

/// Result type alias for market operations.
pub type Result<T> = std::result::Result<T, MarketError>;
