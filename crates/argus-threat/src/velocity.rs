//! Per-symbol price velocity over a rolling window.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Rolling tick history per symbol, pruned to the window.
pub struct VelocityTracker {
    window: Duration,
    /// symbol -> (timestamp, price) ring, oldest first.
    history: HashMap<String, VecDeque<(DateTime<Utc>, f64)>>,
}

impl VelocityTracker {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            history: HashMap::new(),
        }
    }

    /// Record a tick and prune entries older than the window.
    pub fn record(&mut self, symbol: &str, price: f64, at: DateTime<Utc>) {
        let ring = self.history.entry(symbol.to_string()).or_default();
        ring.push_back((at, price));
        let cutoff = at - chrono::Duration::from_std(self.window).unwrap_or_default();
        while ring.front().is_some_and(|(t, _)| *t < cutoff) {
            ring.pop_front();
        }
    }

    /// Percent change across the window: positive = price rose.
    ///
    /// Returns `None` with fewer than two ticks in the window.
    #[must_use]
    pub fn velocity_percent(&self, symbol: &str) -> Option<f64> {
        let ring = self.history.get(symbol)?;
        let (_, first) = ring.front()?;
        let (_, last) = ring.back()?;
        if ring.len() < 2 || *first <= 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }

    /// Drop a symbol's history (position closed).
    pub fn forget(&mut self, symbol: &str) {
        self.history.remove(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_over_window() {
        let mut tracker = VelocityTracker::new(Duration::from_secs(300));
        let t0 = Utc::now();
        tracker.record("BTC/USDT", 100.0, t0);
        tracker.record("BTC/USDT", 103.0, t0 + chrono::Duration::seconds(60));
        let v = tracker.velocity_percent("BTC/USDT").unwrap();
        assert!((v - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_old_ticks_pruned() {
        let mut tracker = VelocityTracker::new(Duration::from_secs(300));
        let t0 = Utc::now();
        tracker.record("BTC/USDT", 50.0, t0);
        // Six minutes later the first tick is outside the window.
        tracker.record("BTC/USDT", 100.0, t0 + chrono::Duration::seconds(360));
        tracker.record("BTC/USDT", 101.0, t0 + chrono::Duration::seconds(370));
        let v = tracker.velocity_percent("BTC/USDT").unwrap();
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_tick_no_velocity() {
        let mut tracker = VelocityTracker::new(Duration::from_secs(300));
        tracker.record("BTC/USDT", 100.0, Utc::now());
        assert!(tracker.velocity_percent("BTC/USDT").is_none());
        assert!(tracker.velocity_percent("ETH/USDT").is_none());
    }
}
