//! Application configuration.
//!
//! Loaded from TOML (`--config`, `ARGUS_CONFIG`, or `config/default.toml`),
//! with serde defaults for every field so a partial file works. Provider
//! secrets are never stored in this file: each section names the
//! environment variable (or credential-file key) that carries the secret.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Poller intervals in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_social_secs")]
    pub social_secs: u64,
    #[serde(default = "default_news_secs")]
    pub news_secs: u64,
    #[serde(default = "default_signals_secs")]
    pub signals_secs: u64,
    #[serde(default = "default_price_secs")]
    pub price_secs: u64,
    #[serde(default = "default_alerts_secs")]
    pub alerts_secs: u64,
    /// Rate-limit interval multiplier cap.
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap: u32,
}

fn default_social_secs() -> u64 {
    300
}

fn default_news_secs() -> u64 {
    300
}

fn default_signals_secs() -> u64 {
    60
}

fn default_price_secs() -> u64 {
    3
}

fn default_alerts_secs() -> u64 {
    30
}

fn default_backoff_cap() -> u32 {
    10
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            social_secs: default_social_secs(),
            news_secs: default_news_secs(),
            signals_secs: default_signals_secs(),
            price_secs: default_price_secs(),
            alerts_secs: default_alerts_secs(),
            backoff_cap: default_backoff_cap(),
        }
    }
}

/// Social source section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSection {
    #[serde(default)]
    pub handles: Vec<String>,
    #[serde(default)]
    pub high_value: Vec<String>,
    #[serde(default = "default_engagement_threshold")]
    pub engagement_threshold: u64,
    #[serde(default = "default_social_url")]
    pub base_url: String,
    /// Env var holding the bearer token.
    #[serde(default = "default_social_token_env")]
    pub token_env: String,
    /// Sentiment freshness window for combined signals (seconds).
    #[serde(default = "default_sentiment_freshness_secs")]
    pub sentiment_freshness_secs: u64,
}

fn default_engagement_threshold() -> u64 {
    1000
}

fn default_social_url() -> String {
    "https://api.social.local".to_string()
}

fn default_social_token_env() -> String {
    "ARGUS_SOCIAL_TOKEN".to_string()
}

fn default_sentiment_freshness_secs() -> u64 {
    1800
}

impl Default for SocialSection {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
            high_value: Vec::new(),
            engagement_threshold: default_engagement_threshold(),
            base_url: default_social_url(),
            token_env: default_social_token_env(),
            sentiment_freshness_secs: default_sentiment_freshness_secs(),
        }
    }
}

/// News source section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSection {
    #[serde(default = "default_news_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_news_language")]
    pub language: String,
    #[serde(default = "default_news_url")]
    pub base_url: String,
    #[serde(default = "default_news_key_env")]
    pub api_key_env: String,
}

fn default_news_categories() -> Vec<String> {
    vec!["cryptocurrency".to_string()]
}

fn default_news_language() -> String {
    "en".to_string()
}

fn default_news_url() -> String {
    "https://api.news.local".to_string()
}

fn default_news_key_env() -> String {
    "ARGUS_NEWS_KEY".to_string()
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            categories: default_news_categories(),
            language: default_news_language(),
            base_url: default_news_url(),
            api_key_env: default_news_key_env(),
        }
    }
}

/// Technical signal generator section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsSection {
    #[serde(default = "default_signal_symbols")]
    pub symbols: Vec<String>,
    #[serde(default = "default_sentiment_min")]
    pub sentiment_min: f64,
}

fn default_signal_symbols() -> Vec<String> {
    vec![
        "BTC/USDT".to_string(),
        "ETH/USDT".to_string(),
        "SOL/USDT".to_string(),
    ]
}

fn default_sentiment_min() -> f64 {
    0.3
}

impl Default for SignalsSection {
    fn default() -> Self {
        Self {
            symbols: default_signal_symbols(),
            sentiment_min: default_sentiment_min(),
        }
    }
}

/// Alert engine section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsSection {
    #[serde(default = "default_emergency_band_pct")]
    pub emergency_band_pct: f64,
    /// When set, triggered alerts rearm after this cool-off. Single-shot
    /// by default.
    #[serde(default)]
    pub rearm_after_secs: Option<u64>,
}

fn default_emergency_band_pct() -> f64 {
    1.0
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            emergency_band_pct: default_emergency_band_pct(),
            rearm_after_secs: None,
        }
    }
}

/// Threat detector section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatSection {
    #[serde(default = "default_critical_dsl_pct")]
    pub critical_dsl_pct: f64,
    #[serde(default = "default_high_dsl_pct")]
    pub high_dsl_pct: f64,
    #[serde(default = "default_critical_velocity_pct")]
    pub critical_velocity_pct: f64,
    #[serde(default = "default_high_velocity_pct")]
    pub high_velocity_pct: f64,
    #[serde(default = "default_hysteresis_secs")]
    pub hysteresis_secs: u64,
}

fn default_critical_dsl_pct() -> f64 {
    0.5
}

fn default_high_dsl_pct() -> f64 {
    2.0
}

fn default_critical_velocity_pct() -> f64 {
    5.0
}

fn default_high_velocity_pct() -> f64 {
    2.0
}

fn default_hysteresis_secs() -> u64 {
    60
}

impl Default for ThreatSection {
    fn default() -> Self {
        Self {
            critical_dsl_pct: default_critical_dsl_pct(),
            high_dsl_pct: default_high_dsl_pct(),
            critical_velocity_pct: default_critical_velocity_pct(),
            high_velocity_pct: default_high_velocity_pct(),
            hysteresis_secs: default_hysteresis_secs(),
        }
    }
}

/// One TTS vendor entry, in fallback order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsVendor {
    pub name: String,
    pub base_url: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Env var holding the API key; falls back to the credential file
    /// under the vendor name.
    pub api_key_env: String,
}

fn default_voice() -> String {
    "default".to_string()
}

/// TTS section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsSection {
    #[serde(default = "default_tts_vendors")]
    pub vendors: Vec<TtsVendor>,
    #[serde(default = "default_tts_cache_cap")]
    pub cache_cap: usize,
    #[serde(default = "default_tts_backoff_secs")]
    pub failure_backoff_secs: u64,
}

fn default_tts_vendors() -> Vec<TtsVendor> {
    vec![
        TtsVendor {
            name: "premium".to_string(),
            base_url: "https://api.premiumvoice.local".to_string(),
            voice: "ava".to_string(),
            api_key_env: "ARGUS_TTS_PREMIUM_KEY".to_string(),
        },
        TtsVendor {
            name: "cloud_a".to_string(),
            base_url: "https://tts.cloud-a.local".to_string(),
            voice: "standard-a".to_string(),
            api_key_env: "ARGUS_TTS_CLOUD_A_KEY".to_string(),
        },
        TtsVendor {
            name: "cloud_b".to_string(),
            base_url: "https://tts.cloud-b.local".to_string(),
            voice: "standard-b".to_string(),
            api_key_env: "ARGUS_TTS_CLOUD_B_KEY".to_string(),
        },
    ]
}

fn default_tts_cache_cap() -> usize {
    512
}

fn default_tts_backoff_secs() -> u64 {
    60
}

impl Default for TtsSection {
    fn default() -> Self {
        Self {
            vendors: default_tts_vendors(),
            cache_cap: default_tts_cache_cap(),
            failure_backoff_secs: default_tts_backoff_secs(),
        }
    }
}

/// Call deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_http_secs")]
    pub http_secs: u64,
    #[serde(default = "default_ai_secs")]
    pub ai_secs: u64,
    #[serde(default = "default_tts_secs")]
    pub tts_secs: u64,
}

fn default_http_secs() -> u64 {
    10
}

fn default_ai_secs() -> u64 {
    15
}

fn default_tts_secs() -> u64 {
    10
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            http_secs: default_http_secs(),
            ai_secs: default_ai_secs(),
            tts_secs: default_tts_secs(),
        }
    }
}

/// Presentation cooldowns in seconds, overridable per priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationConfig {
    #[serde(default = "default_visual_secs")]
    pub visual_secs: u64,
    #[serde(default = "default_cooldown_critical")]
    pub cooldown_critical_secs: u64,
    #[serde(default = "default_cooldown_high")]
    pub cooldown_high_secs: u64,
    #[serde(default = "default_cooldown_medium")]
    pub cooldown_medium_secs: u64,
    #[serde(default = "default_cooldown_low")]
    pub cooldown_low_secs: u64,
    #[serde(default = "default_cooldown_info")]
    pub cooldown_info_secs: u64,
}

fn default_visual_secs() -> u64 {
    5
}

fn default_cooldown_critical() -> u64 {
    0
}

fn default_cooldown_high() -> u64 {
    3
}

fn default_cooldown_medium() -> u64 {
    5
}

fn default_cooldown_low() -> u64 {
    8
}

fn default_cooldown_info() -> u64 {
    10
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            visual_secs: default_visual_secs(),
            cooldown_critical_secs: default_cooldown_critical(),
            cooldown_high_secs: default_cooldown_high(),
            cooldown_medium_secs: default_cooldown_medium(),
            cooldown_low_secs: default_cooldown_low(),
            cooldown_info_secs: default_cooldown_info(),
        }
    }
}

impl PresentationConfig {
    /// Build the fan-out cooldown table.
    #[must_use]
    pub fn cooldowns(&self) -> argus_fanout::Cooldowns {
        argus_fanout::Cooldowns {
            critical: Duration::from_secs(self.cooldown_critical_secs),
            high: Duration::from_secs(self.cooldown_high_secs),
            medium: Duration::from_secs(self.cooldown_medium_secs),
            low: Duration::from_secs(self.cooldown_low_secs),
            info: Duration::from_secs(self.cooldown_info_secs),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_exchange_url")]
    pub exchange_url: String,
    #[serde(default = "default_ai_url")]
    pub ai_url: String,
    #[serde(default = "default_trading_url")]
    pub trading_url: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
    #[serde(default = "default_retention_cap")]
    pub retention_cap: usize,
    #[serde(default)]
    pub intervals: IntervalsConfig,
    #[serde(default)]
    pub social: SocialSection,
    #[serde(default)]
    pub news: NewsSection,
    #[serde(default)]
    pub signals: SignalsSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub threat: ThreatSection,
    #[serde(default)]
    pub tts: TtsSection,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_exchange_url() -> String {
    "https://api.exchange.local".to_string()
}

fn default_ai_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_trading_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

fn default_snapshot_path() -> String {
    "./data/sources.json".to_string()
}

fn default_credentials_path() -> String {
    "./data/credentials.json".to_string()
}

fn default_retention_cap() -> usize {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: Vec::new(),
            exchange_url: default_exchange_url(),
            ai_url: default_ai_url(),
            trading_url: default_trading_url(),
            snapshot_path: default_snapshot_path(),
            credentials_path: default_credentials_path(),
            retention_cap: default_retention_cap(),
            intervals: IntervalsConfig::default(),
            social: SocialSection::default(),
            news: NewsSection::default(),
            signals: SignalsSection::default(),
            alerts: AlertsSection::default(),
            threat: ThreatSection::default(),
            tts: TtsSection::default(),
            timeouts: TimeoutsConfig::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: explicit path, `ARGUS_CONFIG`, or the default
    /// file; missing file falls back to defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var("ARGUS_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(%path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.retention_cap, 10_000);
        assert_eq!(config.intervals.social_secs, 300);
        assert_eq!(config.intervals.price_secs, 3);
        assert_eq!(config.tts.vendors.len(), 3);
        assert!(config.alerts.rearm_after_secs.is_none());
    }

    #[test]
    fn test_partial_toml_gets_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            port = 9999

            [intervals]
            news_secs = 120

            [social]
            handles = ["whale", "trader"]
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.intervals.news_secs, 120);
        assert_eq!(config.intervals.social_secs, 300);
        assert_eq!(config.social.handles.len(), 2);
        assert_eq!(config.social.engagement_threshold, 1000);
    }

    #[test]
    fn test_config_round_trips() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.port, config.port);
        assert_eq!(parsed.presentation.cooldown_low_secs, 8);
    }

    #[test]
    fn test_cooldown_table() {
        let cooldowns = PresentationConfig::default().cooldowns();
        assert_eq!(cooldowns.get(argus_core::Priority::Critical), Duration::ZERO);
        assert_eq!(
            cooldowns.get(argus_core::Priority::Info),
            Duration::from_secs(10)
        );
    }
}
