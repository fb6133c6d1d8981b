//! Price and market-data topic sessions.
//!
//! Both are subscription-driven. Ticks older than the last delivered tick
//! for a symbol are dropped, so each session sees prices in timestamp
//! order per symbol.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;

use argus_core::{canonicalize, PriceTick};

use crate::types::OutboundFrame;

/// Session state for the `prices` topic: consolidated symbol->price maps.
#[derive(Default)]
pub struct PriceSession {
    subscriptions: HashSet<String>,
    /// Latest accepted price per symbol.
    latest: BTreeMap<String, Decimal>,
    /// Timestamp (ms) of the last accepted tick per symbol.
    last_ts: HashMap<String, i64>,
}

impl PriceSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the subscription set. Returns the ack frame.
    pub fn subscribe(&mut self, symbols: Vec<String>) -> OutboundFrame {
        self.subscriptions = symbols.iter().map(|s| canonicalize(s)).collect();
        let mut list: Vec<String> = self.subscriptions.iter().cloned().collect();
        list.sort();
        OutboundFrame::Subscribed { symbols: list }
    }

    /// Consume a tick. Returns a consolidated `price_update` frame when
    /// the tick is subscribed and in order.
    pub fn on_tick(&mut self, tick: &PriceTick) -> Option<OutboundFrame> {
        if !self.subscriptions.contains(&tick.symbol) {
            return None;
        }
        let ts = tick.timestamp.timestamp_millis();
        if self.last_ts.get(&tick.symbol).is_some_and(|last| ts <= *last) {
            return None; // out-of-order tick dropped
        }
        self.last_ts.insert(tick.symbol.clone(), ts);
        self.latest.insert(tick.symbol.clone(), tick.price);

        Some(OutboundFrame::PriceMap {
            timestamp: ts,
            prices: self.latest.clone(),
        })
    }
}

/// Session state for the `market-data` topic: per-symbol ticks plus
/// periodic candle tails (fetched by the gateway task).
#[derive(Default)]
pub struct MarketDataSession {
    subscriptions: HashSet<String>,
    last_ts: HashMap<String, i64>,
}

impl MarketDataSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols to the subscription set. Returns the ack frame with
    /// the full current set.
    pub fn subscribe(&mut self, symbols: Vec<String>) -> OutboundFrame {
        for symbol in symbols {
            self.subscriptions.insert(canonicalize(&symbol));
        }
        self.ack()
    }

    /// Remove symbols. Returns the ack frame with the remaining set.
    pub fn unsubscribe(&mut self, symbols: Vec<String>) -> OutboundFrame {
        for symbol in symbols {
            self.subscriptions.remove(&canonicalize(&symbol));
        }
        self.ack()
    }

    fn ack(&self) -> OutboundFrame {
        let mut list: Vec<String> = self.subscriptions.iter().cloned().collect();
        list.sort();
        OutboundFrame::Subscribed { symbols: list }
    }

    /// Symbols needing periodic `ohlcv_update` frames.
    #[must_use]
    pub fn subscribed_symbols(&self) -> Vec<String> {
        let mut list: Vec<String> = self.subscriptions.iter().cloned().collect();
        list.sort();
        list
    }

    /// Consume a tick; per-symbol `price_update` when subscribed and in
    /// order.
    pub fn on_tick(&mut self, tick: &PriceTick) -> Option<OutboundFrame> {
        if !self.subscriptions.contains(&tick.symbol) {
            return None;
        }
        let ts = tick.timestamp.timestamp_millis();
        if self.last_ts.get(&tick.symbol).is_some_and(|last| ts <= *last) {
            return None;
        }
        self.last_ts.insert(tick.symbol.clone(), ts);
        Some(OutboundFrame::PriceSingle {
            symbol: tick.symbol.clone(),
            price: tick.price,
            timestamp: ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal, ts_ms: i64) -> PriceTick {
        PriceTick::new(symbol, price, Utc.timestamp_millis_opt(ts_ms).unwrap())
    }

    #[test]
    fn test_price_session_consolidated_map() {
        let mut session = PriceSession::new();
        session.subscribe(vec!["BTC".to_string(), "ETH/USDT".to_string()]);

        let frame = session.on_tick(&tick("BTC/USDT", dec!(50000), 1)).unwrap();
        match frame {
            OutboundFrame::PriceMap { prices, .. } => {
                assert_eq!(prices.get("BTC/USDT"), Some(&dec!(50000)));
            }
            other => panic!("unexpected frame {other:?}"),
        }

        // Second symbol joins the map.
        let frame = session.on_tick(&tick("ETH/USDT", dec!(3000), 2)).unwrap();
        match frame {
            OutboundFrame::PriceMap { prices, .. } => {
                assert_eq!(prices.len(), 2);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_unsubscribed_symbol_ignored() {
        let mut session = PriceSession::new();
        session.subscribe(vec!["BTC".to_string()]);
        assert!(session.on_tick(&tick("ETH/USDT", dec!(1), 1)).is_none());
    }

    #[test]
    fn test_out_of_order_tick_dropped() {
        let mut session = PriceSession::new();
        session.subscribe(vec!["BTC".to_string()]);
        assert!(session.on_tick(&tick("BTC/USDT", dec!(2), 10)).is_some());
        assert!(session.on_tick(&tick("BTC/USDT", dec!(1), 5)).is_none());
        assert!(session.on_tick(&tick("BTC/USDT", dec!(3), 11)).is_some());
    }

    #[test]
    fn test_market_data_subscribe_unsubscribe() {
        let mut session = MarketDataSession::new();
        session.subscribe(vec!["btc".to_string(), "ETH".to_string()]);
        assert_eq!(session.subscribed_symbols(), vec!["BTC/USDT", "ETH/USDT"]);

        match session.unsubscribe(vec!["BTC/USDT".to_string()]) {
            OutboundFrame::Subscribed { symbols } => assert_eq!(symbols, vec!["ETH/USDT"]),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_market_data_per_symbol_updates() {
        let mut session = MarketDataSession::new();
        session.subscribe(vec!["BTC".to_string()]);

        let frame = session.on_tick(&tick("BTC/USDT", dec!(50000), 7)).unwrap();
        match frame {
            OutboundFrame::PriceSingle { symbol, timestamp, .. } => {
                assert_eq!(symbol, "BTC/USDT");
                assert_eq!(timestamp, 7);
            }
            other => panic!("unexpected frame {other:?}"),
        }
        // Out-of-order drop applies per symbol.
        assert!(session.on_tick(&tick("BTC/USDT", dec!(1), 6)).is_none());
    }
}
