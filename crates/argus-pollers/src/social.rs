//! Social feed poller.
//!
//! Watches a configured list of account handles, resolving each to a
//! canonical user id once (cached in provider state), then fetching recent
//! items per user since the last cursor. Mentioned symbols are extracted
//! with the curated dictionary and folded into the sentiment gauge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use argus_core::{NotificationDraft, NotificationType, Priority, Source, SymbolDictionary};

use crate::control::PollSource;
use crate::error::{PollerError, Result};
use crate::sentiment::SentimentGauge;
use crate::source_state::SourceState;

/// One social post.
#[derive(Debug, Clone)]
pub struct SocialItem {
    /// Provider-stable id, monotonically increasing.
    pub id: String,
    pub author_handle: String,
    pub text: String,
    /// Combined engagement count (likes + reposts).
    pub engagement: u64,
    pub created_at: DateTime<Utc>,
}

/// Social API surface.
pub trait SocialProvider: Send + Sync + 'static {
    /// Resolve a handle to its canonical user id.
    fn resolve_user(&self, handle: &str)
        -> impl std::future::Future<Output = Result<String>> + Send;

    /// Recent items for a user, oldest first, strictly after `since_id`.
    fn fetch_since(
        &self,
        user_id: &str,
        since_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<SocialItem>>> + Send;
}

/// Social poller configuration.
#[derive(Debug, Clone, Default)]
pub struct SocialConfig {
    /// Account handles to watch.
    pub handles: Vec<String>,
    /// Handles whose posts are always high priority.
    pub high_value: Vec<String>,
    /// Engagement at or above which a post is high priority.
    pub engagement_threshold: u64,
}

/// The social poller.
pub struct SocialPoller<P> {
    provider: P,
    config: SocialConfig,
    sentiment: Arc<SentimentGauge>,
    dictionary: &'static SymbolDictionary,
}

impl<P: SocialProvider> SocialPoller<P> {
    pub fn new(provider: P, config: SocialConfig, sentiment: Arc<SentimentGauge>) -> Self {
        Self {
            provider,
            config,
            sentiment,
            dictionary: SymbolDictionary::shared(),
        }
    }

    fn priority_for(&self, item: &SocialItem) -> Priority {
        if self
            .config
            .high_value
            .iter()
            .any(|h| h.eq_ignore_ascii_case(&item.author_handle))
            || item.engagement >= self.config.engagement_threshold
        {
            Priority::High
        } else {
            Priority::Medium
        }
    }

    fn draft_for(&self, item: &SocialItem, symbol: Option<String>) -> NotificationDraft {
        let mut draft = NotificationDraft::new(
            NotificationType::SocialSurge,
            Source::Twitter,
            &format!("@{}", item.author_handle),
            &item.text,
        );
        draft.external_id = Some(item.id.clone());
        draft.priority = Some(self.priority_for(item));
        draft.symbol = symbol;
        draft
            .metadata
            .insert("author".to_string(), item.author_handle.clone().into());
        draft
            .metadata
            .insert("engagement".to_string(), item.engagement.into());
        draft
    }
}

impl<P: SocialProvider> PollSource for SocialPoller<P> {
    fn name(&self) -> &'static str {
        "social"
    }

    async fn poll(&mut self, state: &mut SourceState) -> Result<Vec<NotificationDraft>> {
        let mut drafts = Vec::new();
        let now = Utc::now();

        for handle in self.config.handles.clone() {
            // Resolve once; the id is cached in provider state.
            let resolved_key = format!("resolved:{handle}");
            let user_id = match state.provider_str(&resolved_key) {
                Some(id) => id,
                None => match self.provider.resolve_user(&handle).await {
                    Ok(id) => {
                        state.set_provider_str(&resolved_key, &id);
                        id
                    }
                    Err(PollerError::RateLimited) => return Err(PollerError::RateLimited),
                    Err(e) => {
                        warn!(%handle, error = %e, "User resolution failed, skipping handle");
                        continue;
                    }
                },
            };

            let cursor_key = format!("cursor:{handle}");
            let since_id = state.provider_str(&cursor_key);
            let items = match self.provider.fetch_since(&user_id, since_id.as_deref()).await {
                Ok(items) => items,
                Err(PollerError::RateLimited) => return Err(PollerError::RateLimited),
                Err(e) => {
                    warn!(%handle, error = %e, "Fetch failed, skipping handle this cycle");
                    continue;
                }
            };

            for item in items {
                // Cursor advances on every received item; the ring guards
                // against provider replays.
                state.set_provider_str(&cursor_key, &item.id);
                state.last_seen_id = Some(item.id.clone());
                if !state.ring.insert(&item.id) {
                    continue;
                }

                let symbols = self.dictionary.extract(&item.text);
                let score = SentimentGauge::score_text(&item.text);
                for symbol in &symbols {
                    self.sentiment.record(symbol, score, now);
                }

                debug!(%handle, id = %item.id, symbols = symbols.len(), "New social item");
                drafts.push(self.draft_for(&item, symbols.into_iter().next()));
            }
        }

        Ok(drafts)
    }
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    data: ResolveData,
}

#[derive(Debug, Deserialize)]
struct ResolveData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    data: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: String,
    text: String,
    #[serde(default)]
    author_handle: String,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    repost_count: u64,
    created_at: DateTime<Utc>,
}

/// Social provider over HTTP with bearer auth.
pub struct HttpSocialProvider {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpSocialProvider {
    pub fn new(base_url: &str, bearer_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PollerError::Provider(format!("client build: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            bearer_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut builder = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| PollerError::Provider(format!("request: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PollerError::RateLimited);
        }
        if !status.is_success() {
            return Err(PollerError::Provider(format!("HTTP {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| PollerError::InvalidResponse(e.to_string()))
    }
}

impl SocialProvider for HttpSocialProvider {
    async fn resolve_user(&self, handle: &str) -> Result<String> {
        let url = format!("{}/users/by/username/{handle}", self.base_url);
        let body: ResolveResponse = self.get_json(&url).await?;
        Ok(body.data.id)
    }

    async fn fetch_since(&self, user_id: &str, since_id: Option<&str>) -> Result<Vec<SocialItem>> {
        let mut url = format!("{}/users/{user_id}/posts", self.base_url);
        if let Some(since) = since_id {
            url.push_str(&format!("?since_id={since}"));
        }
        let body: ItemsResponse = self.get_json(&url).await?;
        Ok(body
            .data
            .into_iter()
            .map(|raw| SocialItem {
                id: raw.id,
                author_handle: raw.author_handle,
                engagement: raw.like_count + raw.repost_count,
                text: raw.text,
                created_at: raw.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Scripted provider with per-user item queues.
    struct FakeProvider {
        users: HashMap<String, String>,
        items: Mutex<HashMap<String, Vec<SocialItem>>>,
        resolve_calls: Mutex<usize>,
    }

    impl FakeProvider {
        fn new() -> Self {
            let mut users = HashMap::new();
            users.insert("whale".to_string(), "u-1".to_string());
            Self {
                users,
                items: Mutex::new(HashMap::new()),
                resolve_calls: Mutex::new(0),
            }
        }

        fn push_item(&self, user_id: &str, id: &str, text: &str, engagement: u64) {
            self.items.lock().entry(user_id.to_string()).or_default().push(SocialItem {
                id: id.to_string(),
                author_handle: "whale".to_string(),
                text: text.to_string(),
                engagement,
                created_at: Utc::now(),
            });
        }
    }

    impl SocialProvider for &'static FakeProvider {
        async fn resolve_user(&self, handle: &str) -> Result<String> {
            *self.resolve_calls.lock() += 1;
            self.users
                .get(handle)
                .cloned()
                .ok_or_else(|| PollerError::Provider("unknown handle".to_string()))
        }

        async fn fetch_since(
            &self,
            user_id: &str,
            since_id: Option<&str>,
        ) -> Result<Vec<SocialItem>> {
            let items = self.items.lock();
            let all = items.get(user_id).cloned().unwrap_or_default();
            Ok(all
                .into_iter()
                .filter(|i| since_id.map_or(true, |s| i.id.as_str() > s))
                .collect())
        }
    }

    fn poller(provider: &'static FakeProvider) -> SocialPoller<&'static FakeProvider> {
        SocialPoller::new(
            provider,
            SocialConfig {
                handles: vec!["whale".to_string()],
                high_value: vec![],
                engagement_threshold: 1000,
            },
            Arc::new(SentimentGauge::new(Duration::from_secs(600))),
        )
    }

    fn leaked_provider() -> &'static FakeProvider {
        Box::leak(Box::new(FakeProvider::new()))
    }

    #[tokio::test]
    async fn test_resolution_cached_across_polls() {
        let provider = leaked_provider();
        provider.push_item("u-1", "10", "BTC looking strong", 10);
        let mut poller = poller(provider);
        let mut state = SourceState::default();

        poller.poll(&mut state).await.unwrap();
        provider.push_item("u-1", "11", "more BTC", 10);
        poller.poll(&mut state).await.unwrap();

        assert_eq!(*provider.resolve_calls.lock(), 1);
        assert_eq!(state.provider_str("resolved:whale").as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_cursor_and_ring_dedup() {
        let provider = leaked_provider();
        provider.push_item("u-1", "10", "BTC breakout incoming", 10);
        let mut poller = poller(provider);
        let mut state = SourceState::default();

        let first = poller.poll(&mut state).await.unwrap();
        assert_eq!(first.len(), 1);

        // Same items again: cursor filters them out.
        let second = poller.poll(&mut state).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_priority_promotion_by_engagement() {
        let provider = leaked_provider();
        provider.push_item("u-1", "10", "quiet take", 10);
        provider.push_item("u-1", "11", "viral take", 5000);
        let mut poller = poller(provider);
        let mut state = SourceState::default();

        let drafts = poller.poll(&mut state).await.unwrap();
        assert_eq!(drafts[0].priority, Some(Priority::Medium));
        assert_eq!(drafts[1].priority, Some(Priority::High));
    }

    #[tokio::test]
    async fn test_symbol_extraction_and_sentiment() {
        let provider = leaked_provider();
        provider.push_item("u-1", "10", "SOL about to pump, very bullish", 10);
        let sentiment = Arc::new(SentimentGauge::new(Duration::from_secs(600)));
        let mut poller = SocialPoller::new(
            provider,
            SocialConfig {
                handles: vec!["whale".to_string()],
                ..Default::default()
            },
            sentiment.clone(),
        );
        let mut state = SourceState::default();

        let drafts = poller.poll(&mut state).await.unwrap();
        assert_eq!(drafts[0].symbol.as_deref(), Some("SOL/USDT"));
        assert!(sentiment.signal("SOL/USDT", Utc::now()).unwrap() > 0.0);
    }
}
