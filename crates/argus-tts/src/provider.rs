//! TTS provider contract and the generic HTTP vendor implementation.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use argus_core::Priority;

use crate::error::{Result, TtsError};

/// Default timeout for vendor calls.
const DEFAULT_TTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Voice parameters for one synthesis call. Adjusted by priority: critical
/// speaks slightly faster, info slightly slower, all within a calm range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoicePreset {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl VoicePreset {
    /// Preset for a priority class.
    #[must_use]
    pub fn for_priority(priority: Priority) -> Self {
        let rate = match priority {
            Priority::Critical => 1.1,
            Priority::High => 1.05,
            Priority::Medium => 1.0,
            Priority::Low => 0.95,
            Priority::Info => 0.9,
        };
        Self {
            rate,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    /// Stable cache-key fragment for this preset.
    #[must_use]
    pub fn cache_tag(&self) -> String {
        format!("r{:.2}p{:.2}v{:.2}", self.rate, self.pitch, self.volume)
    }
}

/// Synthesized audio.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub audio: Vec<u8>,
    pub content_type: String,
}

/// A synthesis vendor.
pub trait TtsProvider: Send + Sync {
    /// Stable provider name used in config, metrics and cache keys.
    fn name(&self) -> &str;

    /// Voice id used in cache keys.
    fn voice(&self) -> &str;

    /// Whether credentials are present for this provider.
    fn available(&self) -> bool;

    fn synthesize(
        &self,
        text: &str,
        preset: VoicePreset,
    ) -> impl std::future::Future<Output = Result<Synthesis>> + Send;
}

/// Configuration for one HTTP vendor.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Stable name (e.g., "premium", "cloud_a", "cloud_b").
    pub name: String,
    pub base_url: String,
    pub voice: String,
    /// API key; `None` means the provider is not configured.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(name: &str, base_url: &str, voice: &str, api_key: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            voice: voice.to_string(),
            api_key,
            timeout: DEFAULT_TTS_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
    rate: f32,
    pitch: f32,
    volume: f32,
}

/// Generic HTTP vendor: POST `{base_url}/synthesize`, bearer-authorized,
/// audio bytes in the body and the format in `content-type`.
pub struct HttpTtsProvider {
    client: Client,
    config: ProviderConfig,
}

impl HttpTtsProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TtsError::ProviderFailed {
                provider: config.name.clone(),
                reason: format!("client build: {e}"),
            })?;
        Ok(Self { client, config })
    }
}

impl TtsProvider for HttpTtsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn voice(&self) -> &str {
        &self.config.voice
    }

    fn available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }

    async fn synthesize(&self, text: &str, preset: VoicePreset) -> Result<Synthesis> {
        let fail = |reason: String| TtsError::ProviderFailed {
            provider: self.config.name.clone(),
            reason,
        };

        let url = format!("{}/synthesize", self.config.base_url);
        let request = SynthesizeRequest {
            text,
            voice: &self.config.voice,
            rate: preset.rate,
            pitch: preset.pitch,
            volume: preset.volume,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| fail(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();

        let audio = response
            .bytes()
            .await
            .map_err(|e| fail(format!("body: {e}")))?
            .to_vec();

        if audio.is_empty() {
            return Err(fail("empty audio body".to_string()));
        }

        debug!(provider = %self.config.name, bytes = audio.len(), "Synthesis complete");
        Ok(Synthesis {
            audio,
            content_type,
        })
    }
}
