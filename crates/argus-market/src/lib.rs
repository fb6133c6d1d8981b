//! Exchange/market adapter for ARGUS.
//!
//! Normalizes tickers, OHLCV candles and price ticks from the upstream
//! exchange REST API. All symbols entering this crate are canonicalized to
//! `BASE/QUOTE` form before they reach the wire.

pub mod client;
pub mod error;
pub mod indicators;
pub mod types;

pub use client::{ExchangeClient, ExchangeConfig, MarketData, RetryPolicy};
pub use error::{MarketError, Result};
pub use types::{closes, Candle, Ticker, Timeframe};
