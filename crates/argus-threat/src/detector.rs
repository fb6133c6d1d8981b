//! Threat grading and hysteresis-gated emission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use argus_core::{
    NotificationDraft, NotificationType, Position, PositionSide, PriceTick, Priority, Source,
};
use argus_telemetry::metrics::THREAT_EMITTED_TOTAL;
use argus_trading::PositionsView;

use crate::velocity::VelocityTracker;

/// Threat grade for a position. Anything milder is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatGrade {
    High,
    Critical,
}

impl ThreatGrade {
    #[must_use]
    pub fn priority(&self) -> Priority {
        match self {
            Self::Critical => Priority::Critical,
            Self::High => Priority::High,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
        }
    }
}

/// Detector thresholds.
#[derive(Debug, Clone)]
pub struct ThreatConfig {
    /// Distance-to-stop at or under which the grade is critical (percent).
    pub critical_dsl_pct: f64,
    /// Distance-to-stop at or under which the grade is high (percent).
    pub high_dsl_pct: f64,
    /// Adverse velocity at or over which the grade is critical (percent).
    pub critical_velocity_pct: f64,
    /// Adverse velocity at or over which the grade is high (percent).
    pub high_velocity_pct: f64,
    /// Velocity lookback window.
    pub velocity_window: Duration,
    /// Minimum time out of a band before the same grade re-emits.
    pub hysteresis: Duration,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            critical_dsl_pct: 0.5,
            high_dsl_pct: 2.0,
            critical_velocity_pct: 5.0,
            high_velocity_pct: 2.0,
            velocity_window: Duration::from_secs(300),
            hysteresis: Duration::from_secs(60),
        }
    }
}

/// Per-(position, grade) emission bookkeeping.
#[derive(Debug, Default)]
struct BandState {
    /// Whether the position is currently inside this grade's band.
    in_band: bool,
    /// When the position last left this band.
    left_band_at: Option<DateTime<Utc>>,
    /// Whether this grade has ever been emitted for the position.
    emitted: bool,
}

/// Grades positions against live prices.
///
/// Pure state machine over explicit timestamps: the run loop feeds it
/// ticks, tests feed it a scripted clock.
pub struct ThreatDetector {
    config: ThreatConfig,
    velocity: VelocityTracker,
    /// (position id, grade) -> band state.
    bands: HashMap<(String, ThreatGrade), BandState>,
}

impl ThreatDetector {
    #[must_use]
    pub fn new(config: ThreatConfig) -> Self {
        let velocity = VelocityTracker::new(config.velocity_window);
        Self {
            config,
            velocity,
            bands: HashMap::new(),
        }
    }

    /// Record a tick for velocity tracking.
    pub fn on_tick(&mut self, symbol: &str, price: f64, at: DateTime<Utc>) {
        self.velocity.record(symbol, price, at);
    }

    /// Grade a position from distance-to-stop and adverse velocity.
    #[must_use]
    fn grade(&self, position: &Position) -> Option<ThreatGrade> {
        let dsl = position.distance_to_stop_percent();
        let adverse = self.adverse_velocity(position);

        let critical = dsl.is_some_and(|d| d <= self.config.critical_dsl_pct)
            || adverse.is_some_and(|v| v >= self.config.critical_velocity_pct);
        if critical {
            return Some(ThreatGrade::Critical);
        }

        let high = dsl.is_some_and(|d| d <= self.config.high_dsl_pct)
            || adverse.is_some_and(|v| v >= self.config.high_velocity_pct);
        high.then_some(ThreatGrade::High)
    }

    /// Velocity against the position: price falling hurts longs, price
    /// rising hurts shorts. Returns a non-negative magnitude.
    fn adverse_velocity(&self, position: &Position) -> Option<f64> {
        let v = self.velocity.velocity_percent(&position.symbol)?;
        let adverse = match position.side {
            PositionSide::Long => -v,
            PositionSide::Short => v,
        };
        Some(adverse.max(0.0))
    }

    /// Evaluate one position. Returns a draft when a risk alert should be
    /// emitted now.
    pub fn evaluate(&mut self, position: &Position, now: DateTime<Utc>) -> Option<NotificationDraft> {
        let grade = self.grade(position);

        // Update band occupancy for both grades, then decide emission.
        let mut emit: Option<ThreatGrade> = None;
        for candidate in [ThreatGrade::Critical, ThreatGrade::High] {
            let key = (position.id.clone(), candidate);
            let state = self.bands.entry(key).or_default();
            let in_band_now = grade == Some(candidate);

            if in_band_now && !state.in_band {
                // Entering the band. Emit on first entry, or on re-entry
                // after spending at least the hysteresis window outside.
                let rearmed = match state.left_band_at {
                    None => true,
                    Some(left) => now - left
                        >= chrono::Duration::from_std(self.config.hysteresis)
                            .unwrap_or(chrono::Duration::seconds(60)),
                };
                if !state.emitted || rearmed {
                    state.emitted = true;
                    emit = Some(candidate);
                } else {
                    debug!(position = %position.id, grade = candidate.as_str(),
                        "Band re-entry within hysteresis window, suppressed");
                }
                state.left_band_at = None;
            } else if !in_band_now && state.in_band {
                state.left_band_at = Some(now);
            }
            state.in_band = in_band_now;
        }

        let grade = emit?;
        THREAT_EMITTED_TOTAL
            .with_label_values(&[grade.as_str()])
            .inc();
        Some(self.draft(position, grade, now))
    }

    fn draft(
        &self,
        position: &Position,
        grade: ThreatGrade,
        now: DateTime<Utc>,
    ) -> NotificationDraft {
        let dsl = position.distance_to_stop_percent();
        let velocity = self.velocity.velocity_percent(&position.symbol);

        let title = format!("{} position under threat: {}", grade.as_str(), position.symbol);
        let message = match (dsl, velocity) {
            (Some(d), Some(v)) => format!(
                "{} {} is {:.2}% from its stop-loss with 5m velocity {:.2}%",
                position.side, position.symbol, d, v
            ),
            (Some(d), None) => format!(
                "{} {} is {:.2}% from its stop-loss",
                position.side, position.symbol, d
            ),
            (None, Some(v)) => format!(
                "{} {} moving against the position, 5m velocity {:.2}%",
                position.side, position.symbol, v
            ),
            (None, None) => format!("{} {} under pressure", position.side, position.symbol),
        };

        let mut draft = NotificationDraft::new(
            NotificationType::RiskAlert,
            Source::System,
            &title,
            &message,
        );
        draft.symbol = Some(position.symbol.clone());
        draft.priority = Some(grade.priority());
        draft.external_id = Some(format!(
            "threat:{}:{}:{}",
            position.id,
            grade.as_str(),
            now.timestamp()
        ));
        draft.urgency_score = dsl.map(|d| (100.0 - d * 20.0).clamp(0.0, 100.0));
        draft
            .metadata
            .insert("position_id".to_string(), position.id.clone().into());
        if let Some(pnl) = position.pnl.to_f64() {
            draft.metadata.insert("pnl".to_string(), pnl.into());
        }
        draft.actions = vec![
            argus_core::ActionToken::ClosePosition,
            argus_core::ActionToken::Dismiss,
        ];
        draft
    }

    /// Drop state for positions that no longer exist.
    pub fn retain_positions(&mut self, live_ids: &[String]) {
        self.bands.retain(|(id, _), _| live_ids.iter().any(|l| l == id));
    }
}

/// Run the threat detector loop: consume price ticks, evaluate the
/// affected positions, push drafts to enrichment.
///
/// Infrastructure failures are logged and the loop proceeds to the next
/// tick; the loop ends when the price bus closes.
pub async fn run_threat_detector(
    mut ticks: broadcast::Receiver<PriceTick>,
    positions: Arc<PositionsView>,
    drafts: mpsc::Sender<NotificationDraft>,
    config: ThreatConfig,
) {
    let mut detector = ThreatDetector::new(config);
    info!("Threat detector started");

    loop {
        let tick = match ticks.recv().await {
            Ok(tick) => tick,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Threat detector lagged on price bus");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Price bus closed, threat detector stopping");
                break;
            }
        };

        let price = match tick.price.to_f64() {
            Some(p) if p > 0.0 => p,
            _ => continue,
        };
        detector.on_tick(&tick.symbol, price, tick.timestamp);

        let affected = positions.for_symbol(&tick.symbol);
        let live_ids: Vec<String> = positions.all().into_iter().map(|p| p.id).collect();
        detector.retain_positions(&live_ids);

        for position in affected {
            if let Some(draft) = detector.evaluate(&position, tick.timestamp) {
                if drafts.send(draft).await.is_err() {
                    warn!("Enrichment channel closed, threat detector stopping");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn position(stop: Decimal, current: Decimal) -> Position {
        Position {
            id: "p1".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: PositionSide::Long,
            amount: dec!(1),
            entry_price: dec!(50000),
            current_price: current,
            pnl: dec!(0),
            pnl_percent: 0.0,
            stop_loss: Some(stop),
            stop_loss_percent: None,
            trailing_stop: None,
        }
    }

    /// Position with distance-to-stop of `dsl` percent.
    fn position_at_dsl(dsl: f64) -> Position {
        let current = 50000.0;
        let stop = current * (1.0 - dsl / 100.0);
        position(
            Decimal::try_from(stop).unwrap(),
            Decimal::try_from(current).unwrap(),
        )
    }

    #[test]
    fn test_grades_by_distance_to_stop() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let now = Utc::now();

        let draft = detector.evaluate(&position_at_dsl(0.4), now).unwrap();
        assert_eq!(draft.priority, Some(Priority::Critical));

        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let draft = detector.evaluate(&position_at_dsl(1.5), now).unwrap();
        assert_eq!(draft.priority, Some(Priority::High));

        let mut detector = ThreatDetector::new(ThreatConfig::default());
        assert!(detector.evaluate(&position_at_dsl(5.0), now).is_none());
    }

    #[test]
    fn test_velocity_grades_long_position() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let t0 = Utc::now();
        // 6% drop in five minutes: critical for a long.
        detector.on_tick("BTC/USDT", 50000.0, t0);
        detector.on_tick("BTC/USDT", 47000.0, t0 + chrono::Duration::seconds(240));

        let p = position_at_dsl(10.0); // far from stop; velocity drives it
        let draft = detector
            .evaluate(&p, t0 + chrono::Duration::seconds(240))
            .unwrap();
        assert_eq!(draft.priority, Some(Priority::Critical));
    }

    #[test]
    fn test_rising_price_not_adverse_for_long() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let t0 = Utc::now();
        detector.on_tick("BTC/USDT", 50000.0, t0);
        detector.on_tick("BTC/USDT", 53000.0, t0 + chrono::Duration::seconds(240));

        let p = position_at_dsl(10.0);
        assert!(detector
            .evaluate(&p, t0 + chrono::Duration::seconds(240))
            .is_none());
    }

    #[test]
    fn test_same_grade_not_repeated_while_in_band() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let t0 = Utc::now();
        assert!(detector.evaluate(&position_at_dsl(0.4), t0).is_some());
        // Still in the critical band a tick later: no new emission.
        assert!(detector
            .evaluate(&position_at_dsl(0.45), t0 + chrono::Duration::seconds(3))
            .is_none());
    }

    #[test]
    fn test_hysteresis_reemission_after_recovery() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let t0 = Utc::now();

        // dsl 0.4% -> one critical.
        assert!(detector.evaluate(&position_at_dsl(0.4), t0).is_some());

        // Recovers to 1.5% (high band) for 70 seconds.
        let recovered = detector.evaluate(&position_at_dsl(1.5), t0 + chrono::Duration::seconds(5));
        // Transition into the high band emits a high alert.
        assert_eq!(recovered.unwrap().priority, Some(Priority::High));

        // Back to 0.3% after 70s outside critical: second critical fires.
        let again = detector.evaluate(
            &position_at_dsl(0.3),
            t0 + chrono::Duration::seconds(5 + 70),
        );
        assert_eq!(again.unwrap().priority, Some(Priority::Critical));
    }

    #[test]
    fn test_short_recovery_suppresses_reemission() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let t0 = Utc::now();

        assert!(detector.evaluate(&position_at_dsl(0.4), t0).is_some());
        detector.evaluate(&position_at_dsl(1.5), t0 + chrono::Duration::seconds(5));

        // Only 30 seconds out of the critical band: suppressed.
        assert!(detector
            .evaluate(
                &position_at_dsl(0.3),
                t0 + chrono::Duration::seconds(5 + 30)
            )
            .is_none());
    }

    #[test]
    fn test_draft_carries_actions_and_metadata() {
        let mut detector = ThreatDetector::new(ThreatConfig::default());
        let draft = detector.evaluate(&position_at_dsl(0.4), Utc::now()).unwrap();
        assert_eq!(draft.kind, Some(NotificationType::RiskAlert));
        assert!(draft
            .actions
            .contains(&argus_core::ActionToken::ClosePosition));
        assert_eq!(
            draft.metadata.get("position_id").and_then(|v| v.as_str()),
            Some("p1")
        );
    }
}
