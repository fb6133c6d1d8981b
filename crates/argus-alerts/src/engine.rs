//! The alert evaluation engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use argus_core::{
    Alert, AlertType, IndicatorCondition, IndicatorName, NotificationDraft, NotificationType,
    PriceCondition, Priority, Source,
};
use argus_market::indicators::{macd, rsi, sma};
use argus_market::{closes, MarketData, Timeframe};
use argus_telemetry::metrics::ALERT_TRIGGERS_TOTAL;

use crate::store::AlertStore;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct AlertEngineConfig {
    /// Evaluation cadence.
    pub interval: Duration,
    /// Price distance past the threshold (percent) at which a trigger
    /// escalates from high to critical.
    pub emergency_band_pct: f64,
    /// When set, a triggered alert rearms after this cool-off. Default is
    /// single-shot (no rearm).
    pub rearm_after_secs: Option<u64>,
    /// Candle series used for indicator alerts.
    pub ohlcv_timeframe: Timeframe,
    pub ohlcv_limit: usize,
}

impl Default for AlertEngineConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            emergency_band_pct: 1.0,
            rearm_after_secs: None,
            ohlcv_timeframe: Timeframe::H1,
            ohlcv_limit: 250,
        }
    }
}

/// Evaluates alerts against market data.
///
/// Lookups are coalesced: each symbol is fetched at most once per tick
/// (ticker always, OHLCV only when an indicator alert needs it).
pub struct AlertEngine<M> {
    store: Arc<AlertStore>,
    market: Arc<M>,
    config: AlertEngineConfig,
    /// alert id -> previous indicator value, for crossing detection.
    prev_values: HashMap<String, f64>,
}

impl<M: MarketData> AlertEngine<M> {
    pub fn new(store: Arc<AlertStore>, market: Arc<M>, config: AlertEngineConfig) -> Self {
        Self {
            store,
            market,
            config,
            prev_values: HashMap::new(),
        }
    }

    /// One evaluation pass. Returns drafts for alerts that fired.
    pub async fn evaluate_tick(&mut self) -> Vec<NotificationDraft> {
        // Optional rearm of cooled-off alerts.
        if let Some(cooloff) = self.config.rearm_after_secs {
            for id in self.store.rearm_candidates(cooloff) {
                debug!(alert = %id, "Rearming alert after cool-off");
                self.store.rearm(&id);
            }
        }

        let snapshot = self.store.evaluation_snapshot();
        if snapshot.is_empty() {
            return Vec::new();
        }

        let mut by_symbol: HashMap<String, Vec<Alert>> = HashMap::new();
        for alert in snapshot {
            by_symbol.entry(alert.symbol.clone()).or_default().push(alert);
        }

        let mut drafts = Vec::new();
        for (symbol, alerts) in by_symbol {
            // One ticker fetch per symbol per tick.
            let ticker = match self.market.ticker(&symbol).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(%symbol, error = %e, "Ticker fetch failed, skipping symbol this tick");
                    continue;
                }
            };

            // One OHLCV fetch per symbol, only when needed.
            let needs_ohlcv = alerts.iter().any(|a| a.alert_type == AlertType::Indicator);
            let close_series = if needs_ohlcv {
                match self
                    .market
                    .ohlcv(&symbol, self.config.ohlcv_timeframe, self.config.ohlcv_limit)
                    .await
                {
                    Ok(candles) => Some(closes(&candles)),
                    Err(e) => {
                        warn!(%symbol, error = %e, "OHLCV fetch failed, indicator alerts skipped");
                        None
                    }
                }
            } else {
                None
            };

            for alert in alerts {
                let fired = match alert.alert_type {
                    AlertType::Price => self.evaluate_price(&alert, ticker.last),
                    AlertType::Indicator => match &close_series {
                        Some(series) => self.evaluate_indicator(&alert, series),
                        None => None,
                    },
                };
                if let Some(draft) = fired {
                    self.store.mark_triggered(&alert.id);
                    self.prev_values.remove(&alert.id);
                    ALERT_TRIGGERS_TOTAL
                        .with_label_values(&[
                            &alert.symbol,
                            match alert.alert_type {
                                AlertType::Price => "price",
                                AlertType::Indicator => "indicator",
                            },
                        ])
                        .inc();
                    drafts.push(draft);
                }
            }
        }
        drafts
    }

    fn evaluate_price(&self, alert: &Alert, last: Decimal) -> Option<NotificationDraft> {
        let threshold = alert.price_threshold?;
        let condition = alert.price_condition?;
        let fired = match condition {
            PriceCondition::Above => last > threshold,
            PriceCondition::Below => last < threshold,
        };
        if !fired {
            return None;
        }

        // Escalate when price blew well past the threshold.
        let distance_pct = if threshold.is_zero() {
            0.0
        } else {
            ((last - threshold) / threshold * Decimal::from(100))
                .to_f64()
                .map(f64::abs)
                .unwrap_or(0.0)
        };
        let priority = if distance_pct >= self.config.emergency_band_pct {
            Priority::Critical
        } else {
            Priority::High
        };

        let direction = match condition {
            PriceCondition::Above => "above",
            PriceCondition::Below => "below",
        };
        let title = format!("Price alert: {} {direction} {threshold}", alert.symbol);
        let message = format!(
            "{} traded at {last}, {direction} the configured threshold {threshold}",
            alert.symbol
        );
        Some(self.draft(alert, priority, &title, &message, distance_pct))
    }

    fn evaluate_indicator(&mut self, alert: &Alert, series: &[f64]) -> Option<NotificationDraft> {
        let name = alert.indicator_name?;
        let condition = alert.indicator_condition?;
        let threshold = alert.indicator_value?;

        let current = indicator_value(name, series)?;
        let prev = self.prev_values.insert(alert.id.clone(), current);

        if !condition_fired(condition, prev, current, threshold) {
            return None;
        }

        let title = format!("{} {:?} alert on {}", alert.symbol, name, condition_label(condition));
        let message = format!(
            "{} {:?} reads {current:.2} ({} {threshold})",
            alert.symbol,
            name,
            condition_label(condition)
        );
        Some(self.draft(alert, Priority::High, &title, &message, 0.0))
    }

    fn draft(
        &self,
        alert: &Alert,
        priority: Priority,
        title: &str,
        message: &str,
        distance_pct: f64,
    ) -> NotificationDraft {
        let mut draft = NotificationDraft::new(
            NotificationType::TechnicalBreakout,
            Source::Technical,
            title,
            message,
        );
        draft.symbol = Some(alert.symbol.clone());
        draft.priority = Some(priority);
        draft.external_id = Some(format!(
            "alert:{}:{}",
            alert.id,
            chrono::Utc::now().timestamp()
        ));
        draft.urgency_score = Some((50.0 + distance_pct * 10.0).clamp(0.0, 100.0));
        draft
            .metadata
            .insert("alert_id".to_string(), alert.id.clone().into());
        if let Some(description) = &alert.description {
            draft
                .metadata
                .insert("description".to_string(), description.clone().into());
        }
        draft
    }
}

/// Decide whether an indicator condition holds. Crossings need a previous
/// reading on the other side of the threshold; without one they never
/// fire, they only record.
fn condition_fired(
    condition: IndicatorCondition,
    prev: Option<f64>,
    current: f64,
    threshold: f64,
) -> bool {
    match condition {
        IndicatorCondition::Above => current > threshold,
        IndicatorCondition::Below => current < threshold,
        IndicatorCondition::CrossesAbove => {
            prev.map_or(false, |p| p <= threshold && current > threshold)
        }
        IndicatorCondition::CrossesBelow => {
            prev.map_or(false, |p| p >= threshold && current < threshold)
        }
    }
}

fn condition_label(condition: IndicatorCondition) -> &'static str {
    match condition {
        IndicatorCondition::Above => "above",
        IndicatorCondition::Below => "below",
        IndicatorCondition::CrossesAbove => "crosses above",
        IndicatorCondition::CrossesBelow => "crosses below",
    }
}

/// Current value for the requested indicator.
fn indicator_value(name: IndicatorName, series: &[f64]) -> Option<f64> {
    match name {
        IndicatorName::Rsi => rsi(series, 14),
        IndicatorName::Macd => macd(series).map(|m| m.macd),
        // Crossover alerts watch the histogram's sign.
        IndicatorName::MacdCrossover => macd(series).map(|m| m.histogram),
        IndicatorName::Ma50 => sma(series, 50),
        IndicatorName::Ma200 => sma(series, 200),
    }
}

/// Run the evaluation loop until the draft channel closes.
pub async fn run_alert_engine<M: MarketData>(
    mut engine: AlertEngine<M>,
    drafts: mpsc::Sender<NotificationDraft>,
) {
    let interval = engine.config.interval;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(interval_secs = interval.as_secs(), "Alert engine started");

    loop {
        ticker.tick().await;
        for draft in engine.evaluate_tick().await {
            if drafts.send(draft).await.is_err() {
                info!("Enrichment channel closed, alert engine stopping");
                return;
            }
        }
    }
}
