//! Threat detection for open positions.
//!
//! Watches price ticks against open positions and emits graded
//! `risk_alert` notifications when a position closes in on its stop-loss
//! or the market moves against it quickly. Re-emission of the same grade
//! is hysteresis-gated so a position oscillating around a band edge does
//! not spam the operator.

pub mod detector;
pub mod error;
pub mod velocity;

pub use detector::{run_threat_detector, ThreatConfig, ThreatDetector, ThreatGrade};
pub use error::{Result, ThreatError};
pub use velocity::VelocityTracker;
