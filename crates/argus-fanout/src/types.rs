//! Wire frames for the WebSocket topics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use argus_core::{MutationEvent, Notification};

/// WebSocket topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    Notifications,
    Prices,
    MarketData,
}

impl Topic {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Prices => "prices",
            Self::MarketData => "market-data",
        }
    }
}

/// A candle as sent in `ohlcv_update` frames.
#[derive(Debug, Clone, Serialize)]
pub struct CandleFrame {
    pub timestamp_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Server-to-client frames. Serialize-only; two variants deliberately
/// share the `price_update` wire tag (map form on the prices topic,
/// per-symbol form on market-data).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Sent once on connect.
    Connected { session_id: String, topic: Topic },
    Pong,
    /// Liveness probe; clients answer with `ping` or any frame.
    Ping,
    /// A notification being presented on this session.
    Notification { notification: Box<Notification> },
    /// Store mutation for client-side reconciliation.
    Mutation { event: MutationEvent },
    /// Consolidated symbol->price map (prices topic).
    #[serde(rename = "price_update")]
    PriceMap {
        timestamp: i64,
        prices: BTreeMap<String, Decimal>,
    },
    /// Per-symbol tick (market-data topic).
    #[serde(rename = "price_update")]
    PriceSingle {
        symbol: String,
        price: Decimal,
        timestamp: i64,
    },
    /// Rolling candle tail for a subscribed symbol.
    OhlcvUpdate {
        symbol: String,
        timeframe: String,
        candles: Vec<CandleFrame>,
    },
    /// Acknowledges a subscription change.
    Subscribed { symbols: Vec<String> },
    /// The session fell too far behind and will be closed.
    Lagging,
    /// Non-fatal error frame; the connection stays open.
    Error { error_code: String, message: String },
}

impl OutboundFrame {
    /// Whether this frame must never be dropped from a full buffer.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        match self {
            Self::Notification { notification } => {
                notification.priority == argus_core::Priority::Critical
            }
            // Control frames that close or reconcile state must survive.
            Self::Lagging | Self::Connected { .. } => true,
            _ => false,
        }
    }

    /// Serialize for the wire.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"error\"}".to_string())
    }
}

/// Client-to-server frames, shared across topics.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Presentation progress report from the client.
    Ack {
        id: String,
        /// "voice_done" or "dismissed".
        phase: String,
    },
    /// Replay suppression after reconnect: ids the client already
    /// dismissed locally.
    Sync {
        #[serde(default)]
        dismissed_ids: Vec<String>,
    },
    Subscribe {
        #[serde(default)]
        symbols: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        symbols: Vec<String>,
    },
}

impl ClientFrame {
    /// Parse a raw text frame. `ping` and `subscribe:<json array>` are
    /// accepted as line formats for older clients; everything else is a
    /// JSON object.
    pub fn parse(raw: &str) -> crate::Result<Option<Self>> {
        let trimmed = raw.trim();
        if trimmed == "ping" {
            // Handled by the caller with a pong; not a structured frame.
            return Ok(None);
        }
        if let Some(rest) = trimmed.strip_prefix("subscribe:") {
            let symbols: Vec<String> = serde_json::from_str(rest)
                .map_err(|e| crate::FanoutError::BadFrame(e.to_string()))?;
            return Ok(Some(Self::Subscribe { symbols }));
        }
        serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| crate::FanoutError::BadFrame(e.to_string()))
    }
}
