//! Core domain types for the ARGUS notification hub.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Notification`: the central record flowing from pollers to clients
//! - `Priority`: scheduling order for delivery and presentation
//! - `Alert`: user-defined price/indicator alerts
//! - `Position`: read-only view of an open trading position
//! - Symbol canonicalization and the curated ticker dictionary

pub mod alert;
pub mod error;
pub mod event;
pub mod notification;
pub mod position;
pub mod symbol;

pub use alert::{Alert, AlertType, IndicatorCondition, IndicatorName, PriceCondition};
pub use error::{CoreError, Result};
pub use event::PriceTick;
pub use notification::{
    fnv1a64, ActionToken, MutationEvent, Notification, NotificationDraft, NotificationType,
    Priority, Source,
};
pub use position::{Position, PositionSide};
pub use symbol::{canonicalize, SymbolDictionary};
