//! User-defined alerts on prices and indicators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Alert kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Price,
    Indicator,
}

/// Comparison for price alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceCondition {
    Above,
    Below,
}

/// Indicators an alert may watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorName {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "MACD_crossover")]
    MacdCrossover,
    #[serde(rename = "MA_50")]
    Ma50,
    #[serde(rename = "MA_200")]
    Ma200,
}

/// Comparison for indicator alerts.
///
/// Crossing conditions require two consecutive evaluations: the previous
/// value must sit on the opposite side of the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorCondition {
    Above,
    Below,
    CrossesAbove,
    CrossesBelow,
}

impl IndicatorCondition {
    /// Whether this condition needs the previous evaluation's value.
    #[must_use]
    pub fn is_crossing(&self) -> bool {
        matches!(self, Self::CrossesAbove | Self::CrossesBelow)
    }
}

/// A user-defined alert.
///
/// `triggered=true` is terminal for single-shot alerts; the engine skips
/// triggered alerts on subsequent ticks unless rearm is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    /// Canonical market pair.
    pub symbol: String,
    pub alert_type: AlertType,

    // Price alerts.
    pub price_threshold: Option<Decimal>,
    pub price_condition: Option<PriceCondition>,

    // Indicator alerts.
    pub indicator_name: Option<IndicatorName>,
    pub indicator_condition: Option<IndicatorCondition>,
    pub indicator_value: Option<f64>,

    pub enabled: bool,
    pub triggered: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Validate type-dependent required fields.
    ///
    /// Price alerts need threshold + condition; indicator alerts need
    /// name + condition + value.
    pub fn validate(&self) -> Result<()> {
        match self.alert_type {
            AlertType::Price => {
                if self.price_threshold.is_none() || self.price_condition.is_none() {
                    return Err(CoreError::Validation(
                        "price alert requires price_threshold and price_condition".to_string(),
                    ));
                }
            }
            AlertType::Indicator => {
                if self.indicator_name.is_none()
                    || self.indicator_condition.is_none()
                    || self.indicator_value.is_none()
                {
                    return Err(CoreError::Validation(
                        "indicator alert requires indicator_name, indicator_condition and indicator_value"
                            .to_string(),
                    ));
                }
            }
        }
        if self.symbol.is_empty() {
            return Err(CoreError::Validation("alert requires a symbol".to_string()));
        }
        Ok(())
    }

    /// Mark the alert as triggered now.
    ///
    /// The `triggered_at` timestamp is set iff `triggered` is set.
    pub fn mark_triggered(&mut self, at: DateTime<Utc>) {
        self.triggered = true;
        self.triggered_at = Some(at);
        self.updated_at = at;
    }

    /// Rearm a triggered alert (policy-gated by the engine).
    pub fn rearm(&mut self, at: DateTime<Utc>) {
        self.triggered = false;
        self.triggered_at = None;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price_alert() -> Alert {
        let now = Utc::now();
        Alert {
            id: "a1".to_string(),
            symbol: "BTC/USDT".to_string(),
            alert_type: AlertType::Price,
            price_threshold: Some(dec!(50000)),
            price_condition: Some(PriceCondition::Above),
            indicator_name: None,
            indicator_condition: None,
            indicator_value: None,
            enabled: true,
            triggered: false,
            triggered_at: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_price_alert_validates() {
        assert!(price_alert().validate().is_ok());
    }

    #[test]
    fn test_price_alert_missing_condition_rejected() {
        let mut a = price_alert();
        a.price_condition = None;
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_indicator_alert_requires_all_fields() {
        let mut a = price_alert();
        a.alert_type = AlertType::Indicator;
        a.indicator_name = Some(IndicatorName::Rsi);
        a.indicator_condition = Some(IndicatorCondition::CrossesAbove);
        assert!(a.validate().is_err()); // missing value
        a.indicator_value = Some(70.0);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_triggered_at_set_iff_triggered() {
        let mut a = price_alert();
        assert!(a.triggered_at.is_none());
        a.mark_triggered(Utc::now());
        assert!(a.triggered);
        assert!(a.triggered_at.is_some());
        a.rearm(Utc::now());
        assert!(!a.triggered);
        assert!(a.triggered_at.is_none());
    }

    #[test]
    fn test_indicator_serde_names() {
        assert_eq!(
            serde_json::to_string(&IndicatorName::MacdCrossover).unwrap(),
            "\"MACD_crossover\""
        );
        assert_eq!(
            serde_json::to_string(&IndicatorCondition::CrossesAbove).unwrap(),
            "\"crosses_above\""
        );
    }
}
