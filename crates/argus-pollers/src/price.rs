//! Price-update poller.
//!
//! Refreshes `current_price` for the set of open positions every few
//! seconds and publishes a `PriceTick` per symbol on the price bus. This
//! poller produces events, not notifications; the fan-out price topic and
//! the threat detector are the consumers.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

use argus_core::{NotificationDraft, Position, PriceTick};
use argus_market::MarketData;
use argus_persistence::SnapshotFile;
use argus_trading::{PositionsView, TradingClient, TradingError};

use crate::control::{spawn_poller, PollSource, PollerHandle, PollerRuntimeConfig};
use crate::error::{PollerError, Result};
use crate::source_state::SourceState;

/// Source of open positions (the trading engine, or a fake in tests).
pub trait PositionProvider: Send + Sync + 'static {
    fn fetch_positions(
        &self,
    ) -> impl std::future::Future<Output = std::result::Result<Vec<Position>, TradingError>> + Send;
}

impl PositionProvider for TradingClient {
    async fn fetch_positions(&self) -> std::result::Result<Vec<Position>, TradingError> {
        self.get_positions().await
    }
}

/// Price poller configuration.
#[derive(Debug, Clone)]
pub struct PricePollerConfig {
    pub interval: std::time::Duration,
}

impl Default for PricePollerConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(3),
        }
    }
}

struct PricePoller<M, T> {
    market: Arc<M>,
    trading: Arc<T>,
    view: Arc<PositionsView>,
    bus: broadcast::Sender<PriceTick>,
}

impl<M: MarketData + 'static, T: PositionProvider> PollSource for PricePoller<M, T> {
    fn name(&self) -> &'static str {
        "price-update"
    }

    async fn poll(&mut self, _state: &mut SourceState) -> Result<Vec<NotificationDraft>> {
        // Resync positions; on engine failure keep the last known view.
        match self.trading.fetch_positions().await {
            Ok(positions) => self.view.replace_all(positions),
            Err(e) => {
                warn!(error = %e, "Position resync failed, keeping stale view");
            }
        }

        for symbol in self.view.symbols() {
            let ticker = match self.market.ticker(&symbol).await {
                Ok(t) => t,
                Err(argus_market::MarketError::RateLimited) => {
                    return Err(PollerError::RateLimited)
                }
                Err(e) => {
                    warn!(%symbol, error = %e, "Ticker refresh failed");
                    continue;
                }
            };
            self.view.update_price(&symbol, ticker.last);
            // No receivers is normal when no client subscribed yet.
            let _ = self
                .bus
                .send(PriceTick::new(&symbol, ticker.last, ticker.timestamp));
        }

        Ok(Vec::new())
    }
}

/// Spawn the price-update poller.
#[must_use]
pub fn spawn_price_poller<M: MarketData + 'static, T: PositionProvider>(
    market: Arc<M>,
    trading: Arc<T>,
    view: Arc<PositionsView>,
    bus: broadcast::Sender<PriceTick>,
    config: PricePollerConfig,
    snapshot: Arc<SnapshotFile>,
    drafts: mpsc::Sender<NotificationDraft>,
) -> (PollerHandle, JoinHandle<()>) {
    let poller = PricePoller {
        market,
        trading,
        view,
        bus,
    };
    spawn_poller(
        poller,
        PollerRuntimeConfig {
            interval: config.interval,
            ..Default::default()
        },
        snapshot,
        drafts,
    )
}
