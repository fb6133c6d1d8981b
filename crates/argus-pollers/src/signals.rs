//! Technical signal generator.
//!
//! Computes RSI, MACD and moving-average crossovers over a configured
//! symbol set and emits events on state transitions only (entering an RSI
//! extreme, a MACD histogram sign flip, a 50/200 MA cross). When the
//! social sentiment gauge agrees with the signal direction the event is a
//! `combined_signal`; otherwise a `technical_breakout`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use argus_core::{NotificationDraft, NotificationType, Source};
use argus_market::indicators::{macd, rsi, sma};
use argus_market::{closes, MarketData, Timeframe};

use crate::control::PollSource;
use crate::error::Result;
use crate::sentiment::SentimentGauge;
use crate::source_state::SourceState;

/// Signal generator configuration.
#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Symbols to scan (canonical form).
    pub symbols: Vec<String>,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub timeframe: Timeframe,
    pub ohlcv_limit: usize,
    /// Minimum absolute sentiment score to count as agreement.
    pub sentiment_min: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            timeframe: Timeframe::H1,
            ohlcv_limit: 250,
            sentiment_min: 0.3,
        }
    }
}

/// RSI zone for transition detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RsiZone {
    Oversold,
    Neutral,
    Overbought,
}

/// Last observed indicator state per symbol.
#[derive(Debug, Default, Clone)]
struct SymbolState {
    rsi_zone: Option<RsiZone>,
    macd_bullish: Option<bool>,
    ma_golden: Option<bool>,
}

/// A detected transition, before drafting.
struct SignalEvent {
    label: &'static str,
    /// +1 bullish, -1 bearish.
    direction: i8,
    description: String,
    confidence: f64,
}

/// The signal generator.
pub struct SignalGenerator<M> {
    market: Arc<M>,
    config: SignalConfig,
    sentiment: Arc<SentimentGauge>,
    states: HashMap<String, SymbolState>,
}

impl<M: MarketData> SignalGenerator<M> {
    pub fn new(market: Arc<M>, config: SignalConfig, sentiment: Arc<SentimentGauge>) -> Self {
        Self {
            market,
            config,
            sentiment,
            states: HashMap::new(),
        }
    }

    /// Detect transitions for one symbol against its previous state.
    fn detect(&mut self, symbol: &str, series: &[f64]) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        let overbought = self.config.rsi_overbought;
        let oversold = self.config.rsi_oversold;
        let rsi_period = self.config.rsi_period;
        let state = self.states.entry(symbol.to_string()).or_default();

        if let Some(value) = rsi(series, rsi_period) {
            let zone = if value >= overbought {
                RsiZone::Overbought
            } else if value <= oversold {
                RsiZone::Oversold
            } else {
                RsiZone::Neutral
            };
            let prev = state.rsi_zone.replace(zone);
            if prev.is_some() && prev != Some(zone) {
                match zone {
                    RsiZone::Overbought => events.push(SignalEvent {
                        label: "rsi_overbought",
                        direction: -1,
                        description: format!("RSI entered overbought at {value:.1}"),
                        confidence: (50.0 + (value - overbought) * 2.0).clamp(0.0, 100.0),
                    }),
                    RsiZone::Oversold => events.push(SignalEvent {
                        label: "rsi_oversold",
                        direction: 1,
                        description: format!("RSI entered oversold at {value:.1}"),
                        confidence: (50.0 + (oversold - value) * 2.0).clamp(0.0, 100.0),
                    }),
                    RsiZone::Neutral => {}
                }
            }
        }

        if let Some(m) = macd(series) {
            let bullish = m.histogram > 0.0;
            let prev = state.macd_bullish.replace(bullish);
            if prev.is_some() && prev != Some(bullish) {
                events.push(SignalEvent {
                    label: if bullish { "macd_bull_cross" } else { "macd_bear_cross" },
                    direction: if bullish { 1 } else { -1 },
                    description: format!(
                        "MACD {} crossover (histogram {:.4})",
                        if bullish { "bullish" } else { "bearish" },
                        m.histogram
                    ),
                    confidence: (55.0 + m.histogram.abs() * 10.0).clamp(0.0, 100.0),
                });
            }
        }

        if let (Some(fast), Some(slow)) = (sma(series, 50), sma(series, 200)) {
            let golden = fast > slow;
            let prev = state.ma_golden.replace(golden);
            if prev.is_some() && prev != Some(golden) {
                events.push(SignalEvent {
                    label: if golden { "golden_cross" } else { "death_cross" },
                    direction: if golden { 1 } else { -1 },
                    description: format!(
                        "MA50 crossed {} MA200 ({fast:.2} vs {slow:.2})",
                        if golden { "above" } else { "below" }
                    ),
                    confidence: 60.0,
                });
            }
        }

        events
    }

    fn draft_for(&self, symbol: &str, event: SignalEvent) -> NotificationDraft {
        let now = Utc::now();
        let sentiment = self.sentiment.signal(symbol, now);
        let agrees = sentiment.is_some_and(|s| {
            s.abs() >= self.config.sentiment_min && (s > 0.0) == (event.direction > 0)
        });

        let (kind, source) = if agrees {
            (NotificationType::CombinedSignal, Source::Combined)
        } else {
            (NotificationType::TechnicalBreakout, Source::Technical)
        };

        let side = if event.direction > 0 { "Bullish" } else { "Bearish" };
        let title = format!("{side} signal on {symbol}");
        let message = if agrees {
            format!("{}; social sentiment agrees", event.description)
        } else {
            event.description
        };

        let mut draft = NotificationDraft::new(kind, source, &title, &message);
        draft.symbol = Some(symbol.to_string());
        draft.external_id = Some(format!("{symbol}:{}:{}", event.label, now.timestamp()));
        draft.confidence_score = Some(event.confidence);
        draft
            .metadata
            .insert("signal".to_string(), event.label.into());
        if let Some(s) = sentiment {
            draft.metadata.insert("sentiment".to_string(), s.into());
        }
        draft
    }
}

impl<M: MarketData + 'static> PollSource for SignalGenerator<M> {
    fn name(&self) -> &'static str {
        "signals"
    }

    async fn poll(&mut self, state: &mut SourceState) -> Result<Vec<NotificationDraft>> {
        let mut drafts = Vec::new();
        for symbol in self.config.symbols.clone() {
            let candles = self
                .market
                .ohlcv(&symbol, self.config.timeframe, self.config.ohlcv_limit)
                .await?;
            let series = closes(&candles);

            for event in self.detect(&symbol, &series) {
                debug!(%symbol, signal = event.label, "Technical transition detected");
                let draft = self.draft_for(&symbol, event);
                if let Some(id) = &draft.external_id {
                    state.last_seen_id = Some(id.clone());
                }
                drafts.push(draft);
            }
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_market::{Candle, Ticker};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct FakeMarket {
        closes: Mutex<Vec<f64>>,
    }

    impl FakeMarket {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                closes: Mutex::new(Vec::new()),
            })
        }

        fn set_closes(&self, closes: &[f64]) {
            *self.closes.lock() = closes.to_vec();
        }
    }

    impl MarketData for FakeMarket {
        async fn ticker(&self, symbol: &str) -> argus_market::Result<Ticker> {
            Ok(Ticker {
                symbol: symbol.to_string(),
                last: dec!(1),
                bid: None,
                ask: None,
                volume: None,
                timestamp: Utc::now(),
            })
        }

        async fn ohlcv(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> argus_market::Result<Vec<Candle>> {
            Ok(self
                .closes
                .lock()
                .iter()
                .enumerate()
                .map(|(i, &c)| Candle {
                    timestamp_ms: i as i64 * 60_000,
                    open: Decimal::try_from(c).unwrap(),
                    high: Decimal::try_from(c).unwrap(),
                    low: Decimal::try_from(c).unwrap(),
                    close: Decimal::try_from(c).unwrap(),
                    volume: dec!(1),
                })
                .collect())
        }
    }

    fn generator(
        market: Arc<FakeMarket>,
        sentiment: Arc<SentimentGauge>,
    ) -> SignalGenerator<FakeMarket> {
        SignalGenerator::new(
            market,
            SignalConfig {
                symbols: vec!["BTC/USDT".to_string()],
                ..Default::default()
            },
            sentiment,
        )
    }

    /// Slow decline: RSI pinned oversold, MACD histogram negative.
    fn decline_series() -> Vec<f64> {
        (0..260).map(|i| 200.0 - f64::from(i) * 0.1).collect()
    }

    /// The decline followed by a hard 30-step rally: RSI flips to
    /// overbought (bearish transition) and the MACD histogram turns
    /// positive (bullish transition).
    fn rally_series() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..230).map(|i| 200.0 - f64::from(i) * 0.1).collect();
        let floor = *closes.last().unwrap();
        for i in 0..30 {
            closes.push(floor + f64::from(i + 1) * 3.0);
        }
        closes
    }

    #[tokio::test]
    async fn test_transition_emits_once() {
        let market = FakeMarket::new();
        let sentiment = Arc::new(SentimentGauge::new(Duration::from_secs(600)));
        let mut generator = generator(market.clone(), sentiment);
        let mut state = SourceState::default();

        // First observation only establishes baseline state.
        market.set_closes(&decline_series());
        let first = generator.poll(&mut state).await.unwrap();
        assert!(first.is_empty());

        market.set_closes(&rally_series());
        let second = generator.poll(&mut state).await.unwrap();
        assert!(!second.is_empty());
        assert!(second
            .iter()
            .all(|d| d.kind == Some(NotificationType::TechnicalBreakout)));

        // Same market shape again: no new transitions.
        let third = generator.poll(&mut state).await.unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_agreeing_sentiment_upgrades_to_combined() {
        let market = FakeMarket::new();
        let sentiment = Arc::new(SentimentGauge::new(Duration::from_secs(600)));
        let mut generator = generator(market.clone(), sentiment.clone());
        let mut state = SourceState::default();

        market.set_closes(&decline_series());
        generator.poll(&mut state).await.unwrap();

        // The rally produces a bullish MACD flip; seed strongly bullish
        // sentiment so that event upgrades to a combined signal.
        sentiment.record("BTC/USDT", 1.0, Utc::now());
        market.set_closes(&rally_series());
        let drafts = generator.poll(&mut state).await.unwrap();

        let combined: Vec<_> = drafts
            .iter()
            .filter(|d| d.kind == Some(NotificationType::CombinedSignal))
            .collect();
        assert!(!combined.is_empty());
        assert!(combined.iter().all(|d| d.source == Some(Source::Combined)));
    }
}
