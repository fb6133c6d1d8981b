//! Error types for argus-fanout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FanoutError {
    /// The session's send buffer overflowed with a critical frame
    /// pending; the session must be closed.
    #[error("Session lagging")]
    SessionLagging,

    #[error("Malformed client frame: {0}")]
    BadFrame(String),
}

pub type Result<T> = std::result::Result<T, FanoutError>;
