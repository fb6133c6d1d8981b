//! News feed poller.
//!
//! Fetches items by category/language filter. Priority is left unset on
//! the drafts; enrichment classifies by keyword rules.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use argus_core::{NotificationDraft, NotificationType, Source};

use crate::control::PollSource;
use crate::error::{PollerError, Result};
use crate::source_state::SourceState;

/// One news article.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub source_name: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// News API surface.
pub trait NewsProvider: Send + Sync + 'static {
    /// Items after `since_id`, oldest first.
    fn fetch(
        &self,
        categories: &[String],
        language: &str,
        since_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<NewsItem>>> + Send;
}

/// News poller configuration.
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub categories: Vec<String>,
    pub language: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            categories: vec!["cryptocurrency".to_string()],
            language: "en".to_string(),
        }
    }
}

/// The news poller.
pub struct NewsPoller<P> {
    provider: P,
    config: NewsConfig,
}

impl<P: NewsProvider> NewsPoller<P> {
    pub fn new(provider: P, config: NewsConfig) -> Self {
        Self { provider, config }
    }
}

impl<P: NewsProvider> PollSource for NewsPoller<P> {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn poll(&mut self, state: &mut SourceState) -> Result<Vec<NotificationDraft>> {
        let items = self
            .provider
            .fetch(
                &self.config.categories,
                &self.config.language,
                state.last_seen_id.as_deref(),
            )
            .await?;

        let mut drafts = Vec::new();
        for item in items {
            state.last_seen_id = Some(item.id.clone());
            if !state.ring.insert(&item.id) {
                continue;
            }

            let mut draft = NotificationDraft::new(
                NotificationType::NewsEvent,
                Source::News,
                &item.title,
                &item.body,
            );
            draft.external_id = Some(item.id.clone());
            if let Some(url) = &item.url {
                draft.metadata.insert("url".to_string(), url.clone().into());
            }
            if let Some(source_name) = &item.source_name {
                draft
                    .metadata
                    .insert("source_name".to_string(), source_name.clone().into());
            }
            debug!(id = %item.id, "New news item");
            drafts.push(draft);
        }
        Ok(drafts)
    }
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    id: String,
    title: String,
    #[serde(default)]
    body: String,
    url: Option<String>,
    source: Option<String>,
    published_at: DateTime<Utc>,
}

/// News provider over HTTP with an optional API key header.
pub struct HttpNewsProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpNewsProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PollerError::Provider(format!("client build: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }
}

impl NewsProvider for HttpNewsProvider {
    async fn fetch(
        &self,
        categories: &[String],
        language: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<NewsItem>> {
        let url = format!("{}/news", self.base_url);
        let categories = categories.join(",");
        let mut query: Vec<(&str, &str)> =
            vec![("categories", categories.as_str()), ("language", language)];
        if let Some(since) = since_id {
            query.push(("since_id", since));
        }

        let mut builder = self.client.get(&url).query(&query);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
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

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| PollerError::InvalidResponse(e.to_string()))?;

        Ok(body
            .articles
            .into_iter()
            .map(|raw| NewsItem {
                id: raw.id,
                title: raw.title,
                body: raw.body,
                url: raw.url,
                source_name: raw.source,
                published_at: raw.published_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeProvider {
        items: Mutex<Vec<NewsItem>>,
    }

    impl FakeProvider {
        fn with_items(items: Vec<NewsItem>) -> &'static Self {
            Box::leak(Box::new(Self {
                items: Mutex::new(items),
            }))
        }
    }

    impl NewsProvider for &'static FakeProvider {
        async fn fetch(
            &self,
            _categories: &[String],
            _language: &str,
            since_id: Option<&str>,
        ) -> Result<Vec<NewsItem>> {
            Ok(self
                .items
                .lock()
                .iter()
                .filter(|i| since_id.map_or(true, |s| i.id.as_str() > s))
                .cloned()
                .collect())
        }
    }

    fn item(id: &str, title: &str) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            title: title.to_string(),
            body: "body".to_string(),
            url: Some("https://example.com".to_string()),
            source_name: Some("wire".to_string()),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_new_items_become_drafts() {
        let provider = FakeProvider::with_items(vec![item("n-1", "Exchange hacked")]);
        let mut poller = NewsPoller::new(provider, NewsConfig::default());
        let mut state = SourceState::default();

        let drafts = poller.poll(&mut state).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, Some(NotificationType::NewsEvent));
        // Priority left for enrichment's keyword rules.
        assert!(drafts[0].priority.is_none());
        assert_eq!(state.last_seen_id.as_deref(), Some("n-1"));
    }

    #[tokio::test]
    async fn test_cursor_suppresses_replay() {
        let provider = FakeProvider::with_items(vec![item("n-1", "a"), item("n-2", "b")]);
        let mut poller = NewsPoller::new(provider, NewsConfig::default());
        let mut state = SourceState::default();

        assert_eq!(poller.poll(&mut state).await.unwrap().len(), 2);
        assert!(poller.poll(&mut state).await.unwrap().is_empty());

        provider.items.lock().push(item("n-3", "c"));
        let drafts = poller.poll(&mut state).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].external_id.as_deref(), Some("n-3"));
    }

    #[tokio::test]
    async fn test_empty_response_keeps_cursor() {
        let provider = FakeProvider::with_items(vec![]);
        let mut poller = NewsPoller::new(provider, NewsConfig::default());
        let mut state = SourceState::default();
        state.last_seen_id = Some("n-5".to_string());

        let drafts = poller.poll(&mut state).await.unwrap();
        assert!(drafts.is_empty());
        assert_eq!(state.last_seen_id.as_deref(), Some("n-5"));
    }
}
