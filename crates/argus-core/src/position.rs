//! Read-only view of an open trading position.
//!
//! Positions are owned by the external trading engine; this core only
//! observes them (threat grading, price refresh).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for PositionSide {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(crate::CoreError::Validation(format!(
                "side must be long or short, got {other}"
            ))),
        }
    }
}

/// An open position as reported by the trading engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    /// Canonical market pair.
    pub symbol: String,
    pub side: PositionSide,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: f64,
    /// Absolute stop-loss price, if set.
    pub stop_loss: Option<Decimal>,
    pub stop_loss_percent: Option<f64>,
    /// Trailing stop distance in percent, if set.
    pub trailing_stop: Option<f64>,
}

impl Position {
    /// Distance from current price to the stop-loss, as a percent of the
    /// current price. `None` when no stop-loss is set or the position is
    /// already through its stop (negative distance clamps to zero).
    #[must_use]
    pub fn distance_to_stop_percent(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;

        let stop = self.stop_loss?;
        let current = self.current_price.to_f64()?;
        let stop = stop.to_f64()?;
        if current <= 0.0 {
            return None;
        }
        let dist = match self.side {
            PositionSide::Long => (current - stop) / current * 100.0,
            PositionSide::Short => (stop - current) / current * 100.0,
        };
        Some(dist.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(side: PositionSide, current: Decimal, stop: Option<Decimal>) -> Position {
        Position {
            id: "p1".to_string(),
            symbol: "BTC/USDT".to_string(),
            side,
            amount: dec!(0.5),
            entry_price: dec!(50000),
            current_price: current,
            pnl: dec!(0),
            pnl_percent: 0.0,
            stop_loss: stop,
            stop_loss_percent: None,
            trailing_stop: None,
        }
    }

    #[test]
    fn test_distance_to_stop_long() {
        let p = position(PositionSide::Long, dec!(50000), Some(dec!(49000)));
        let dsl = p.distance_to_stop_percent().unwrap();
        assert!((dsl - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_stop_short() {
        let p = position(PositionSide::Short, dec!(50000), Some(dec!(51000)));
        let dsl = p.distance_to_stop_percent().unwrap();
        assert!((dsl - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_clamps_at_zero_through_stop() {
        let p = position(PositionSide::Long, dec!(48000), Some(dec!(49000)));
        assert_eq!(p.distance_to_stop_percent(), Some(0.0));
    }

    #[test]
    fn test_no_stop_loss_no_distance() {
        let p = position(PositionSide::Long, dec!(50000), None);
        assert!(p.distance_to_stop_percent().is_none());
    }
}
