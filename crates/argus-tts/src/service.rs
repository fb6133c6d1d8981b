//! The synthesis service: sanitize, pick a provider, cache, cascade.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use argus_core::Priority;
use argus_telemetry::metrics::{TTS_CACHE_HITS_TOTAL, TTS_SYNTH_TOTAL};

use crate::cache::AudioCache;
use crate::error::{Result, TtsError};
use crate::provider::{Synthesis, TtsProvider, VoicePreset};
use crate::sanitize::sanitize_text;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Backoff applied to a provider after a failure.
    pub failure_backoff: Duration,
    /// Audio cache entries.
    pub cache_cap: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            failure_backoff: Duration::from_secs(60),
            cache_cap: 512,
        }
    }
}

/// Provider health as reported over the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
    pub in_backoff: bool,
}

/// Multi-provider synthesis with fallback.
///
/// Providers are tried in the order given; "available" means credentials
/// are present and the provider is not in failure backoff.
pub struct TtsService<P> {
    providers: Vec<P>,
    config: TtsConfig,
    /// provider name -> backoff expiry.
    backoff_until: Mutex<HashMap<String, Instant>>,
    cache: Mutex<AudioCache>,
}

impl<P: TtsProvider> TtsService<P> {
    pub fn new(providers: Vec<P>, config: TtsConfig) -> Self {
        let cache = Mutex::new(AudioCache::new(config.cache_cap));
        Self {
            providers,
            config,
            backoff_until: Mutex::new(HashMap::new()),
            cache,
        }
    }

    /// Synthesize `text` at `priority`, optionally pinned to one provider.
    ///
    /// Returns `EmptyAfterSanitize` when sanitization leaves nothing, and
    /// `SynthesisUnavailable` when every provider fails or is unavailable.
    pub async fn synthesize(
        &self,
        text: &str,
        priority: Priority,
        provider_override: Option<&str>,
    ) -> Result<Synthesis> {
        let clean = sanitize_text(text);
        if clean.is_empty() {
            return Err(TtsError::EmptyAfterSanitize);
        }
        let preset = VoicePreset::for_priority(priority);

        for provider in &self.providers {
            if let Some(wanted) = provider_override {
                if provider.name() != wanted {
                    continue;
                }
            }
            if !provider.available() {
                continue;
            }
            if self.in_backoff(provider.name()) {
                debug!(provider = provider.name(), "Provider in backoff, skipping");
                continue;
            }

            let key = (
                provider.name().to_string(),
                provider.voice().to_string(),
                clean.clone(),
                preset.cache_tag(),
            );
            if let Some(hit) = self.cache.lock().get(&key) {
                TTS_CACHE_HITS_TOTAL.inc();
                return Ok(hit);
            }

            match provider.synthesize(&clean, preset).await {
                Ok(synthesis) => {
                    TTS_SYNTH_TOTAL
                        .with_label_values(&[provider.name(), "ok"])
                        .inc();
                    self.cache.lock().insert(key, synthesis.clone());
                    return Ok(synthesis);
                }
                Err(e) => {
                    TTS_SYNTH_TOTAL
                        .with_label_values(&[provider.name(), "error"])
                        .inc();
                    warn!(provider = provider.name(), error = %e,
                        "Provider failed, entering backoff and cascading");
                    self.backoff_until.lock().insert(
                        provider.name().to_string(),
                        Instant::now() + self.config.failure_backoff,
                    );
                }
            }
        }

        Err(TtsError::SynthesisUnavailable)
    }

    /// Provider health for the API surface.
    #[must_use]
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                available: p.available(),
                in_backoff: self.in_backoff(p.name()),
            })
            .collect()
    }

    fn in_backoff(&self, name: &str) -> bool {
        self.backoff_until
            .lock()
            .get(name)
            .is_some_and(|until| Instant::now() < *until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: fails the first `fail_first` calls.
    struct FakeProvider {
        name: String,
        available: bool,
        fail_first: usize,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn ok(name: &str) -> Self {
            Self {
                name: name.to_string(),
                available: true,
                fail_first: 0,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail_first: usize::MAX,
                ..Self::ok(name)
            }
        }

        fn unavailable(name: &str) -> Self {
            Self {
                available: false,
                ..Self::ok(name)
            }
        }
    }

    impl TtsProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn voice(&self) -> &str {
            "test-voice"
        }

        fn available(&self) -> bool {
            self.available
        }

        async fn synthesize(&self, text: &str, _preset: VoicePreset) -> Result<Synthesis> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(TtsError::ProviderFailed {
                    provider: self.name.clone(),
                    reason: "scripted".to_string(),
                });
            }
            Ok(Synthesis {
                audio: format!("{}:{}", self.name, text).into_bytes(),
                content_type: "audio/mpeg".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_first_available_provider_wins() {
        let service = TtsService::new(
            vec![
                FakeProvider::unavailable("premium"),
                FakeProvider::ok("cloud_a"),
                FakeProvider::ok("cloud_b"),
            ],
            TtsConfig::default(),
        );
        let out = service
            .synthesize("hello world", Priority::Medium, None)
            .await
            .unwrap();
        assert!(out.audio.starts_with(b"cloud_a:"));
    }

    #[tokio::test]
    async fn test_cascade_on_failure_and_backoff() {
        let service = TtsService::new(
            vec![FakeProvider::failing("premium"), FakeProvider::ok("cloud_a")],
            TtsConfig::default(),
        );

        let out = service
            .synthesize("hello", Priority::High, None)
            .await
            .unwrap();
        assert!(out.audio.starts_with(b"cloud_a:"));

        // The failed provider is now in backoff and is not retried.
        let calls_before = service.providers[0].calls.load(Ordering::SeqCst);
        service
            .synthesize("again", Priority::High, None)
            .await
            .unwrap();
        assert_eq!(service.providers[0].calls.load(Ordering::SeqCst), calls_before);

        let status = service.provider_status();
        assert!(status[0].in_backoff);
        assert!(!status[1].in_backoff);
    }

    #[tokio::test]
    async fn test_all_failed_is_unavailable() {
        let service = TtsService::new(
            vec![FakeProvider::failing("premium"), FakeProvider::failing("cloud_a")],
            TtsConfig::default(),
        );
        assert!(matches!(
            service.synthesize("hello", Priority::Low, None).await,
            Err(TtsError::SynthesisUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_empty_after_sanitize() {
        let service = TtsService::new(vec![FakeProvider::ok("premium")], TtsConfig::default());
        assert!(matches!(
            service.synthesize("🚀🚀", Priority::Low, None).await,
            Err(TtsError::EmptyAfterSanitize)
        ));
    }

    #[tokio::test]
    async fn test_cache_returns_identical_audio() {
        let service = TtsService::new(vec![FakeProvider::ok("premium")], TtsConfig::default());
        let a = service
            .synthesize("BTC alert", Priority::High, None)
            .await
            .unwrap();
        let b = service
            .synthesize("BTC alert", Priority::High, None)
            .await
            .unwrap();
        assert_eq!(a.audio, b.audio);
        assert_eq!(service.providers[0].calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_override() {
        let service = TtsService::new(
            vec![FakeProvider::ok("premium"), FakeProvider::ok("cloud_a")],
            TtsConfig::default(),
        );
        let out = service
            .synthesize("hello", Priority::Medium, Some("cloud_a"))
            .await
            .unwrap();
        assert!(out.audio.starts_with(b"cloud_a:"));
    }
}
