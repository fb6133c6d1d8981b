//! HTTP client for the trading engine.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use argus_core::{Position, PositionSide};

use crate::error::{Result, TradingError};

/// Default timeout for engine requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trading engine configuration.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8600".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Account balance as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub total: Decimal,
    pub available: Decimal,
    pub currency: String,
}

/// Request to open a position.
#[derive(Debug, Clone, Serialize)]
pub struct OpenPositionRequest {
    pub symbol: String,
    pub side: PositionSide,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop_percent: Option<f64>,
}

impl OpenPositionRequest {
    /// Validate before hitting the engine: positive amount, canonical
    /// `BASE/QUOTE` symbol, percents within `[0, 100]`.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(TradingError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }
        let mut parts = self.symbol.split('/');
        let valid_symbol = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(base), Some(quote), None)
                if !base.is_empty()
                    && !quote.is_empty()
                    && base.chars().all(|c| c.is_ascii_alphanumeric())
                    && quote.chars().all(|c| c.is_ascii_alphanumeric())
        );
        if !valid_symbol {
            return Err(TradingError::InvalidInput(format!(
                "symbol must be BASE/QUOTE, got {}",
                self.symbol
            )));
        }
        for (name, value) in [
            ("stop_loss_percent", self.stop_loss_percent),
            ("trailing_stop_percent", self.trailing_stop_percent),
        ] {
            if let Some(v) = value {
                if !(0.0..=100.0).contains(&v) {
                    return Err(TradingError::InvalidInput(format!(
                        "{name} must be within [0, 100], got {v}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StopLossRequest {
    stop_loss_percent: f64,
}

#[derive(Debug, Serialize)]
struct TrailingStopRequest {
    trailing_stop_percent: f64,
}

/// HTTP client for the engine.
pub struct TradingClient {
    client: Client,
    config: TradingConfig,
}

impl TradingClient {
    pub fn new(config: TradingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TradingError::UpstreamUnavailable(format!("client build: {e}")))?;
        Ok(Self { client, config })
    }

    /// Map an engine failure status to the typed error.
    fn classify(status: StatusCode, context: &str) -> TradingError {
        match status {
            StatusCode::BAD_REQUEST => TradingError::InvalidInput(context.to_string()),
            StatusCode::NOT_FOUND => TradingError::NotFound(context.to_string()),
            StatusCode::CONFLICT => TradingError::InsufficientBalance,
            s => TradingError::UpstreamUnavailable(format!("HTTP {s}: {context}")),
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{path}", self.config.base_url);
        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| TradingError::UpstreamUnavailable(format!("request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, &text));
        }
        response
            .json()
            .await
            .map_err(|e| TradingError::UpstreamUnavailable(format!("parse: {e}")))
    }

    pub async fn get_balance(&self) -> Result<Balance> {
        self.request(Method::GET, "/balance", None).await
    }

    pub async fn get_positions(&self) -> Result<Vec<Position>> {
        self.request(Method::GET, "/positions", None).await
    }

    pub async fn open_position(&self, request: &OpenPositionRequest) -> Result<Position> {
        request.validate()?;
        debug!(symbol = %request.symbol, side = %request.side, "Opening position");
        let body = serde_json::to_value(request)
            .map_err(|e| TradingError::InvalidInput(e.to_string()))?;
        self.request(Method::POST, "/positions", Some(body)).await
    }

    pub async fn close_position(&self, id: &str) -> Result<Position> {
        let path = format!("/positions/{}", urlencode(id));
        self.request(Method::DELETE, &path, None).await
    }

    pub async fn set_stop_loss(&self, id: &str, stop_loss_percent: f64) -> Result<Position> {
        if !(0.0..=100.0).contains(&stop_loss_percent) {
            return Err(TradingError::InvalidInput(format!(
                "stop_loss_percent must be within [0, 100], got {stop_loss_percent}"
            )));
        }
        let path = format!("/positions/{}/stop-loss", urlencode(id));
        let body = serde_json::to_value(StopLossRequest { stop_loss_percent })
            .map_err(|e| TradingError::InvalidInput(e.to_string()))?;
        self.request(Method::PATCH, &path, Some(body)).await
    }

    pub async fn set_trailing_stop(
        &self,
        id: &str,
        trailing_stop_percent: f64,
    ) -> Result<Position> {
        if !(0.0..=100.0).contains(&trailing_stop_percent) {
            return Err(TradingError::InvalidInput(format!(
                "trailing_stop_percent must be within [0, 100], got {trailing_stop_percent}"
            )));
        }
        let path = format!("/positions/{}/trailing-stop", urlencode(id));
        let body = serde_json::to_value(TrailingStopRequest {
            trailing_stop_percent,
        })
        .map_err(|e| TradingError::InvalidInput(e.to_string()))?;
        self.request(Method::PATCH, &path, Some(body)).await
    }
}

/// Percent-encode a path segment (position ids may carry `/` or spaces).
fn urlencode(segment: &str) -> String {
    segment
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> OpenPositionRequest {
        OpenPositionRequest {
            symbol: "BTC/USDT".to_string(),
            side: PositionSide::Long,
            amount: dec!(0.5),
            stop_loss_percent: Some(2.0),
            trailing_stop_percent: None,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut r = request();
        r.amount = dec!(0);
        assert!(matches!(r.validate(), Err(TradingError::InvalidInput(_))));
    }

    #[test]
    fn test_bad_symbol_rejected() {
        for symbol in ["BTCUSDT", "BTC/", "/USDT", "BTC/USD/T", "BTC USD"] {
            let mut r = request();
            r.symbol = symbol.to_string();
            assert!(r.validate().is_err(), "symbol {symbol} should be rejected");
        }
    }

    #[test]
    fn test_percent_bounds() {
        let mut r = request();
        r.stop_loss_percent = Some(101.0);
        assert!(r.validate().is_err());
        r.stop_loss_percent = Some(-1.0);
        assert!(r.validate().is_err());
        r.stop_loss_percent = Some(0.0);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_urlencode_path_segment() {
        assert_eq!(urlencode("pos-1"), "pos-1");
        assert_eq!(urlencode("a/b c"), "a%2Fb%20c");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            TradingClient::classify(StatusCode::CONFLICT, ""),
            TradingError::InsufficientBalance
        ));
        assert!(matches!(
            TradingClient::classify(StatusCode::NOT_FOUND, "p1"),
            TradingError::NotFound(_)
        ));
        assert!(matches!(
            TradingClient::classify(StatusCode::SERVICE_UNAVAILABLE, ""),
            TradingError::UpstreamUnavailable(_)
        ));
    }
}
