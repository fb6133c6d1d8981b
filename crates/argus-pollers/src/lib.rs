//! Long-running source pollers.
//!
//! Each source (social, news, technical signals, price updates) runs as an
//! independent task driven by a shared runner: wake on interval or kick,
//! call the provider under the market retry policy, filter the dedup ring,
//! hand new drafts to enrichment, persist cursor state. Provider
//! rate-limit responses double the interval (capped at 10x) until the next
//! success.

pub mod control;
pub mod error;
pub mod news;
pub mod price;
pub mod sentiment;
pub mod signals;
pub mod social;
pub mod source_state;

pub use control::{
    spawn_poller, PollSource, PollerHandle, PollerRuntimeConfig, PollerStatus,
};
pub use error::{PollerError, Result};
pub use news::{HttpNewsProvider, NewsConfig, NewsItem, NewsPoller, NewsProvider};
pub use price::{spawn_price_poller, PositionProvider, PricePollerConfig};
pub use sentiment::SentimentGauge;
pub use signals::{SignalConfig, SignalGenerator};
pub use social::{HttpSocialProvider, SocialConfig, SocialItem, SocialPoller, SocialProvider};
pub use source_state::{DedupRing, SourceState};
