//! Shared read view of open positions.
//!
//! The price-update poller refreshes this view from the engine; the
//! threat detector and the price fan-out read it. Consumers never talk to
//! the poller directly.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use argus_core::Position;

/// Concurrent snapshot of open positions, keyed by position id.
#[derive(Default)]
pub struct PositionsView {
    inner: RwLock<HashMap<String, Position>>,
}

impl PositionsView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole view (engine resync).
    pub fn replace_all(&self, positions: Vec<Position>) {
        let mut guard = self.inner.write();
        guard.clear();
        for p in positions {
            guard.insert(p.id.clone(), p);
        }
    }

    /// Patch `current_price` on every position in `symbol`.
    pub fn update_price(&self, symbol: &str, price: Decimal) {
        let mut guard = self.inner.write();
        for p in guard.values_mut() {
            if p.symbol == symbol {
                p.current_price = price;
            }
        }
    }

    #[must_use]
    pub fn all(&self) -> Vec<Position> {
        self.inner.read().values().cloned().collect()
    }

    /// Positions for one symbol.
    #[must_use]
    pub fn for_symbol(&self, symbol: &str) -> Vec<Position> {
        self.inner
            .read()
            .values()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Distinct symbols across open positions.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .inner
            .read()
            .values()
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::PositionSide;
    use rust_decimal_macros::dec;

    fn position(id: &str, symbol: &str) -> Position {
        Position {
            id: id.to_string(),
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            amount: dec!(1),
            entry_price: dec!(100),
            current_price: dec!(100),
            pnl: dec!(0),
            pnl_percent: 0.0,
            stop_loss: None,
            stop_loss_percent: None,
            trailing_stop: None,
        }
    }

    #[test]
    fn test_replace_and_symbols() {
        let view = PositionsView::new();
        view.replace_all(vec![
            position("p1", "BTC/USDT"),
            position("p2", "ETH/USDT"),
            position("p3", "BTC/USDT"),
        ]);
        assert_eq!(view.len(), 3);
        assert_eq!(view.symbols(), vec!["BTC/USDT", "ETH/USDT"]);
        assert_eq!(view.for_symbol("BTC/USDT").len(), 2);
    }

    #[test]
    fn test_update_price_touches_matching_symbol_only() {
        let view = PositionsView::new();
        view.replace_all(vec![position("p1", "BTC/USDT"), position("p2", "ETH/USDT")]);
        view.update_price("BTC/USDT", dec!(123));
        let btc = view.for_symbol("BTC/USDT");
        assert_eq!(btc[0].current_price, dec!(123));
        let eth = view.for_symbol("ETH/USDT");
        assert_eq!(eth[0].current_price, dec!(100));
    }
}
