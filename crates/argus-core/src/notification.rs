//! Notification record and its supporting enums.
//!
//! A `Notification` is immutable once appended to the store except for its
//! read/responded status fields. Deduplication is keyed on `dedup_key`,
//! derived from the source plus a stable external id (or a content hash
//! when the provider gives us none).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Delivery priority. Ordering is significant: `Critical` outranks
/// everything and `Info` ranks last, which drives every scheduling
/// comparison in the delivery path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Maximum word count for the AI summary at this priority.
    #[must_use]
    pub fn word_budget(&self) -> usize {
        match self {
            Self::Critical => 15,
            Self::High => 20,
            Self::Medium => 25,
            Self::Low | Self::Info => 30,
        }
    }

    /// Cooldown after a fully presented message of this priority before
    /// another message of equal or lower priority may start.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        match self {
            Self::Critical => Duration::ZERO,
            Self::High => Duration::from_secs(3),
            Self::Medium => Duration::from_secs(5),
            Self::Low => Duration::from_secs(8),
            Self::Info => Duration::from_secs(10),
        }
    }

    /// All priorities, highest first.
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Info,
    ];
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        };
        write!(f, "{s}")
    }
}

/// Notification category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    CombinedSignal,
    TechnicalBreakout,
    SocialSurge,
    NewsEvent,
    RiskAlert,
    SystemStatus,
    TradeExecuted,
    UserActionRequired,
}

/// Origin of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Technical,
    Twitter,
    News,
    Combined,
    System,
    User,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Technical => "technical",
            Self::Twitter => "twitter",
            Self::News => "news",
            Self::Combined => "combined",
            Self::System => "system",
            Self::User => "user",
        };
        write!(f, "{s}")
    }
}

/// Closed set of quick-action tokens a notification may carry.
///
/// Unknown tokens are rejected at validation; there is no runtime
/// action registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionToken {
    Approve,
    Reject,
    Dismiss,
    ClosePosition,
}

impl ActionToken {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Dismiss => "dismiss",
            Self::ClosePosition => "close_position",
        }
    }
}

impl std::str::FromStr for ActionToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "dismiss" => Ok(Self::Dismiss),
            "close_position" => Ok(Self::ClosePosition),
            other => Err(CoreError::InvalidAction(other.to_string())),
        }
    }
}

/// A fully enriched notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Opaque unique id (UUID v4).
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub priority: Priority,
    pub source: Source,
    pub title: String,
    pub message: String,
    /// Short AI-produced form; populated by enrichment (possibly via the
    /// deterministic fallback when the AI collaborator is unavailable).
    pub summarized_message: Option<String>,
    /// Canonical market pair (e.g., `BTC/USDT`).
    pub symbol: Option<String>,
    pub confidence_score: Option<f64>,
    pub urgency_score: Option<f64>,
    pub promise_score: Option<f64>,
    /// Unstructured provider metadata (author, engagement, raw ids).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Quick actions offered to the operator, in display order.
    #[serde(default)]
    pub actions: Vec<ActionToken>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub responded: bool,
    pub response_action: Option<String>,
    /// Stable identity used to reject duplicate submissions.
    pub dedup_key: String,
}

impl Notification {
    /// Mark as read. Idempotent.
    pub fn mark_read(&mut self) {
        self.read = true;
    }

    /// Record an operator response. Responding implies read.
    pub fn respond(&mut self, action: &str) {
        self.responded = true;
        self.read = true;
        self.response_action = Some(action.to_string());
    }
}

/// Raw event produced by a poller or engine, before enrichment.
///
/// Missing fields (`priority`, `symbol`, `summarized_message`) are filled
/// in by the enrichment pipeline.
#[derive(Debug, Clone, Default)]
pub struct NotificationDraft {
    pub kind: Option<NotificationType>,
    pub source: Option<Source>,
    pub title: String,
    pub message: String,
    pub priority: Option<Priority>,
    pub symbol: Option<String>,
    /// Stable provider-side id, when the provider has one.
    pub external_id: Option<String>,
    pub confidence_score: Option<f64>,
    pub urgency_score: Option<f64>,
    pub promise_score: Option<f64>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub actions: Vec<ActionToken>,
}

impl NotificationDraft {
    /// Create a draft with the required fields set.
    #[must_use]
    pub fn new(kind: NotificationType, source: Source, title: &str, message: &str) -> Self {
        Self {
            kind: Some(kind),
            source: Some(source),
            title: title.to_string(),
            message: message.to_string(),
            ..Default::default()
        }
    }

    /// Derive the deduplication key: `source:external_id` when a stable
    /// external id exists, else `source:` + a hash of the content.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        let source = self.source.unwrap_or(Source::System);
        match &self.external_id {
            Some(ext) => format!("{source}:{ext}"),
            None => {
                let mut content = String::with_capacity(self.title.len() + self.message.len() + 1);
                content.push_str(&self.title);
                content.push('\n');
                content.push_str(&self.message);
                format!("{source}:{:016x}", fnv1a64(content.as_bytes()))
            }
        }
    }
}

/// Store mutation event, broadcast so connected clients can reconcile.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MutationEvent {
    Created { notification: Box<Notification> },
    Read { id: String },
    Responded { id: String, action: String },
    Deleted { id: String },
}

/// FNV-1a 64-bit hash. Used for dedup keys and summary-cache keys where a
/// stable, dependency-free hash is enough.
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
