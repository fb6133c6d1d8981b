//! Multi-provider text-to-speech synthesis.
//!
//! Text is sanitized (no emoji, no `#`, no markdown punctuation) before it
//! reaches any vendor. Providers are tried in configured order; a failing
//! provider enters a 60s backoff and the request cascades to the next.
//! Synthesized audio is cached by `(provider, voice, text, preset)`.

pub mod cache;
pub mod error;
pub mod provider;
pub mod sanitize;
pub mod service;

pub use error::{Result, TtsError};
pub use provider::{HttpTtsProvider, ProviderConfig, Synthesis, TtsProvider, VoicePreset};
pub use sanitize::sanitize_text;
pub use service::{ProviderStatus, TtsConfig, TtsService};
