//! Shared application state for axum handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use argus_alerts::AlertStore;
use argus_enrich::{Enricher, HttpSummarizer};
use argus_fanout::FanoutConfig;
use argus_market::ExchangeClient;
use argus_pollers::PollerHandle;
use argus_store::StoreHandle;
use argus_trading::{PositionsView, TradingClient};
use argus_tts::{HttpTtsProvider, TtsService};

use argus_core::PriceTick;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    /// Allowed CORS origins; empty list means same-origin only.
    pub cors_origins: Vec<String>,
    /// Cadence of `ohlcv_update` frames on market-data sessions.
    pub ohlcv_push_interval: Duration,
    /// Candles per `ohlcv_update` frame.
    pub ohlcv_tail: usize,
    pub fanout: FanoutConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_origins: Vec::new(),
            ohlcv_push_interval: Duration::from_secs(60),
            ohlcv_tail: 50,
            fanout: FanoutConfig::default(),
        }
    }
}

/// Everything the handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
    pub enricher: Arc<Enricher<HttpSummarizer>>,
    pub alerts: Arc<AlertStore>,
    pub tts: Arc<TtsService<HttpTtsProvider>>,
    pub trading: Arc<TradingClient>,
    pub market: Arc<ExchangeClient>,
    pub positions: Arc<PositionsView>,
    pub price_bus: broadcast::Sender<PriceTick>,
    /// Poller handles by source name, for system controls.
    pub pollers: Arc<HashMap<&'static str, PollerHandle>>,
    pub config: GatewayConfig,
    pub started_at: Instant,
}
