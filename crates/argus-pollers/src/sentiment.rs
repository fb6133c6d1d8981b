//! Per-symbol social sentiment gauge.
//!
//! The social poller scores each post with a small keyword lexicon and
//! folds it into an exponential average per symbol. The technical signal
//! generator reads the gauge to decide between `technical_breakout` and
//! `combined_signal`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

const BULLISH: &[&str] = &[
    "moon", "bull", "bullish", "pump", "buy", "long", "breakout", "ath", "rally", "surge",
];
const BEARISH: &[&str] = &[
    "dump", "bear", "bearish", "sell", "short", "crash", "rekt", "capitulation", "rug", "tank",
];

/// Smoothing factor for the running score.
const ALPHA: f64 = 0.3;

/// Shared sentiment state, written by the social poller.
pub struct SentimentGauge {
    freshness: Duration,
    /// symbol -> (smoothed score in [-1, 1], last update).
    scores: DashMap<String, (f64, DateTime<Utc>)>,
}

impl SentimentGauge {
    #[must_use]
    pub fn new(freshness: Duration) -> Self {
        Self {
            freshness,
            scores: DashMap::new(),
        }
    }

    /// Naive lexicon score in [-1, 1].
    #[must_use]
    pub fn score_text(text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let mut score = 0i32;
        let mut hits = 0i32;
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if BULLISH.contains(&token) {
                score += 1;
                hits += 1;
            } else if BEARISH.contains(&token) {
                score -= 1;
                hits += 1;
            }
        }
        if hits == 0 {
            0.0
        } else {
            f64::from(score) / f64::from(hits)
        }
    }

    /// Fold a new observation into the symbol's running score.
    pub fn record(&self, symbol: &str, score: f64, at: DateTime<Utc>) {
        self.scores
            .entry(symbol.to_string())
            .and_modify(|(current, last)| {
                *current = ALPHA * score + (1.0 - ALPHA) * *current;
                *last = at;
            })
            .or_insert((score, at));
    }

    /// Current score if fresh enough, else `None`.
    #[must_use]
    pub fn signal(&self, symbol: &str, now: DateTime<Utc>) -> Option<f64> {
        let entry = self.scores.get(symbol)?;
        let (score, last) = *entry;
        let age = now - last;
        (age <= chrono::Duration::from_std(self.freshness).ok()?).then_some(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_text() {
        assert!(SentimentGauge::score_text("BTC to the moon, huge pump") > 0.0);
        assert!(SentimentGauge::score_text("dump incoming, going short") < 0.0);
        assert_eq!(SentimentGauge::score_text("nothing opinionated here"), 0.0);
    }

    #[test]
    fn test_freshness_window() {
        let gauge = SentimentGauge::new(Duration::from_secs(600));
        let t0 = Utc::now();
        gauge.record("BTC/USDT", 0.8, t0);

        assert!(gauge.signal("BTC/USDT", t0 + chrono::Duration::seconds(60)).is_some());
        assert!(gauge
            .signal("BTC/USDT", t0 + chrono::Duration::seconds(700))
            .is_none());
        assert!(gauge.signal("ETH/USDT", t0).is_none());
    }

    #[test]
    fn test_smoothing_moves_toward_new_score() {
        let gauge = SentimentGauge::new(Duration::from_secs(600));
        let t0 = Utc::now();
        gauge.record("BTC/USDT", 1.0, t0);
        gauge.record("BTC/USDT", -1.0, t0);
        let score = gauge.signal("BTC/USDT", t0).unwrap();
        // Smoothed: 0.3 * -1 + 0.7 * 1 = 0.4.
        assert!((score - 0.4).abs() < 1e-9);
    }
}
