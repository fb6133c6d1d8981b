//! HTTP client for the upstream exchange REST API.
//!
//! Transient failures are retried with capped exponential backoff; a 404 on
//! a symbol maps to `UnknownSymbol` and a 429 maps to `RateLimited`, neither
//! of which is retried.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use argus_core::canonicalize;

use crate::error::{MarketError, Result};
use crate::types::{Candle, Ticker, Timeframe};

/// Default timeout for exchange requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only market data surface consumed by the alert engine, the signal
/// generator and the price poller. Implemented by `ExchangeClient` and by
/// test fakes.
pub trait MarketData: Send + Sync {
    fn ticker(&self, symbol: &str) -> impl std::future::Future<Output = Result<Ticker>> + Send;
    fn ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>>> + Send;
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total attempts including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry attempt `n` (0-based), doubling and capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        doubled.min(self.max_delay)
    }
}

/// Exchange adapter configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Base URL of the exchange REST API.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchange.local".to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Raw ticker payload from the exchange.
#[derive(Debug, Deserialize)]
struct RawTicker {
    last: Decimal,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    volume: Option<Decimal>,
    /// Unix milliseconds.
    timestamp: i64,
}

/// Raw candle payload: `[timestamp_ms, open, high, low, close, volume]`.
#[derive(Debug, Deserialize)]
struct RawCandle(i64, Decimal, Decimal, Decimal, Decimal, Decimal);

/// HTTP client for exchange market data.
pub struct ExchangeClient {
    client: Client,
    config: ExchangeConfig,
}

impl ExchangeClient {
    /// Create a new exchange client.
    pub fn new(config: ExchangeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketError::UpstreamUnavailable(format!("client build failed: {e}")))?;
        Ok(Self { client, config })
    }

    /// Run `op` under the retry policy. Only transient errors are retried.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let policy = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(what, attempt, delay_ms = delay.as_millis() as u64, error = %e,
                        "Transient exchange failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(what, attempts = attempt + 1, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Map an HTTP failure to a typed market error.
    fn classify_status(status: StatusCode, symbol: &str, body: &str) -> MarketError {
        match status {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                MarketError::UnknownSymbol(symbol.to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => MarketError::RateLimited,
            s => MarketError::UpstreamUnavailable(format!("HTTP {s}: {body}")),
        }
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let url = format!("{}/ticker", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| MarketError::UpstreamUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, symbol, &body));
        }

        let raw: RawTicker = response
            .json()
            .await
            .map_err(|e| MarketError::InvalidResponse(format!("ticker parse: {e}")))?;

        let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.timestamp)
            .ok_or_else(|| MarketError::InvalidResponse(format!("bad timestamp {}", raw.timestamp)))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last: raw.last,
            bid: raw.bid,
            ask: raw.ask,
            volume: raw.volume,
            timestamp,
        })
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/ohlcv", self.config.base_url);
        let limit_str = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("timeframe", timeframe.as_str()),
                ("limit", limit_str.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MarketError::UpstreamUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, symbol, &body));
        }

        let raw: Vec<RawCandle> = response
            .json()
            .await
            .map_err(|e| MarketError::InvalidResponse(format!("ohlcv parse: {e}")))?;

        debug!(symbol, %timeframe, candles = raw.len(), "Fetched OHLCV");

        Ok(raw
            .into_iter()
            .map(|RawCandle(ts, open, high, low, close, volume)| Candle {
                timestamp_ms: ts,
                open,
                high,
                low,
                close,
                volume,
            })
            .collect())
    }
}

impl MarketData for ExchangeClient {
    /// Fetch a ticker. The symbol is canonicalized before hitting the wire.
    async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        let symbol = canonicalize(symbol);
        self.with_retry("ticker", || self.fetch_ticker(&symbol)).await
    }

    /// Fetch ordered candles, oldest first.
    async fn ohlcv(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let symbol = canonicalize(symbol);
        self.with_retry("ohlcv", || self.fetch_ohlcv(&symbol, timeframe, limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30)); // capped
        assert_eq!(policy.delay_for(20), Duration::from_secs(30));
    }

    #[test]
    fn test_status_classification() {
        let err = ExchangeClient::classify_status(StatusCode::NOT_FOUND, "FOO/USDT", "");
        assert!(matches!(err, MarketError::UnknownSymbol(_)));

        let err = ExchangeClient::classify_status(StatusCode::TOO_MANY_REQUESTS, "BTC/USDT", "");
        assert!(matches!(err, MarketError::RateLimited));

        let err = ExchangeClient::classify_status(StatusCode::BAD_GATEWAY, "BTC/USDT", "oops");
        assert!(matches!(err, MarketError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_unknown_symbol_not_transient() {
        assert!(!MarketError::UnknownSymbol("FOO/USDT".to_string()).is_transient());
        assert!(!MarketError::RateLimited.is_transient());
        assert!(MarketError::UpstreamUnavailable("x".to_string()).is_transient());
    }
}
