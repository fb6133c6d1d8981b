//! Typed API errors with the `{error_code, message, details?}` wire shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("All synthesis providers unavailable")]
    SynthesisUnavailable,

    #[error("Nothing to speak after sanitization")]
    EmptyAfterSanitize,

    #[error("Internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::EmptyAfterSanitize => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientBalance => StatusCode::CONFLICT,
            Self::UpstreamUnavailable(_) | Self::SynthesisUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmptyAfterSanitize => "empty_after_sanitize",
            Self::NotFound(_) => "not_found",
            Self::InsufficientBalance => "insufficient_balance",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::SynthesisUnavailable => "synthesis_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(detail, "Internal error on REST path");
        }
        let body = json!({
            "error_code": self.error_code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<argus_store::StoreError> for ApiError {
    fn from(e: argus_store::StoreError) -> Self {
        match e {
            argus_store::StoreError::NotFound(id) => Self::NotFound(id),
            argus_store::StoreError::Unavailable => Self::Internal("store unavailable".to_string()),
        }
    }
}

impl From<argus_alerts::AlertError> for ApiError {
    fn from(e: argus_alerts::AlertError) -> Self {
        match e {
            argus_alerts::AlertError::NotFound(id) => Self::NotFound(id),
            argus_alerts::AlertError::Invalid(m) => Self::InvalidInput(m),
            argus_alerts::AlertError::Core(c) => Self::InvalidInput(c.to_string()),
        }
    }
}

impl From<argus_trading::TradingError> for ApiError {
    fn from(e: argus_trading::TradingError) -> Self {
        match e {
            argus_trading::TradingError::InvalidInput(m) => Self::InvalidInput(m),
            argus_trading::TradingError::NotFound(id) => Self::NotFound(id),
            argus_trading::TradingError::InsufficientBalance => Self::InsufficientBalance,
            argus_trading::TradingError::UpstreamUnavailable(m) => Self::UpstreamUnavailable(m),
        }
    }
}

impl From<argus_tts::TtsError> for ApiError {
    fn from(e: argus_tts::TtsError) -> Self {
        match e {
            argus_tts::TtsError::SynthesisUnavailable => Self::SynthesisUnavailable,
            argus_tts::TtsError::EmptyAfterSanitize => Self::EmptyAfterSanitize,
            argus_tts::TtsError::ProviderFailed { provider, reason } => {
                Self::UpstreamUnavailable(format!("{provider}: {reason}"))
            }
        }
    }
}

impl From<argus_enrich::EnrichError> for ApiError {
    fn from(e: argus_enrich::EnrichError) -> Self {
        match e {
            argus_enrich::EnrichError::InvalidDraft(m) => Self::InvalidInput(m),
            argus_enrich::EnrichError::Store(s) => s.into(),
            argus_enrich::EnrichError::SummarizerFailed(m) => Self::UpstreamUnavailable(m),
        }
    }
}

impl From<argus_core::CoreError> for ApiError {
    fn from(e: argus_core::CoreError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidInput("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::InsufficientBalance.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::SynthesisUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ApiError::InsufficientBalance.error_code(), "insufficient_balance");
        assert_eq!(
            ApiError::UpstreamUnavailable("x".to_string()).error_code(),
            "upstream_unavailable"
        );
    }
}
