//! Error types for argus-tts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    /// Every configured provider is unavailable or failed. The client
    /// falls back to its local speech synthesizer.
    #[error("All synthesis providers unavailable")]
    SynthesisUnavailable,

    /// Sanitization removed everything; there is nothing to speak.
    #[error("Text empty after sanitization")]
    EmptyAfterSanitize,

    /// Single-provider failure (internal; triggers cascade + backoff).
    #[error("Provider {provider} failed: {reason}")]
    ProviderFailed { provider: String, reason: String },
}

pub type Result<T> = std::result::Result<T, TtsError>;
