//! Error types for argus-telemetry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Logging init failed: {0}")]
    LoggingInit(String),

    #[error("Metrics encode failed: {0}")]
    MetricsEncode(String),
}

pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
