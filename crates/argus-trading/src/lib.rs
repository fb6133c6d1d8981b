//! Client for the external trading execution engine.
//!
//! The engine itself is out of scope; this crate pins down the contract
//! ARGUS consumes: balance, positions, open/close, stop-loss and trailing
//! stop adjustments, with typed failure mapping.

pub mod client;
pub mod error;
pub mod view;

pub use client::{Balance, OpenPositionRequest, TradingClient, TradingConfig};
pub use error::{Result, TradingError};
pub use view::PositionsView;
