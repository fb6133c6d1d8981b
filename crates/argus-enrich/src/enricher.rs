//! The enrichment service.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use argus_core::{canonicalize, fnv1a64, Notification, NotificationDraft, SymbolDictionary};
use argus_store::{AppendOutcome, StoreHandle};
use argus_telemetry::metrics::{
    DEDUP_HITS_TOTAL, NOTIFICATIONS_TOTAL, SUMMARIZER_FAILURES_TOTAL, SUMMARY_CACHE_HITS_TOTAL,
};

use crate::error::{EnrichError, Result};
use crate::priority;
use crate::summarizer::{fallback_summary, truncate_words, Summarizer};

/// Enrichment configuration.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Summary cache entries before the cache is reset.
    pub summary_cache_cap: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            summary_cache_cap: 4096,
        }
    }
}

/// Turns raw drafts into stored notifications.
///
/// The summarizer runs under its own deadline (configured on the
/// implementation); a failure or timeout downgrades to the deterministic
/// fallback so the store append is never stalled by the assistant.
pub struct Enricher<S> {
    store: StoreHandle,
    summarizer: Arc<S>,
    dictionary: &'static SymbolDictionary,
    /// content-hash -> summary. Avoids repeat assistant calls for
    /// identical content.
    summary_cache: DashMap<u64, String>,
    config: EnrichConfig,
}

impl<S: Summarizer> Enricher<S> {
    pub fn new(store: StoreHandle, summarizer: Arc<S>, config: EnrichConfig) -> Self {
        Self {
            store,
            summarizer,
            dictionary: SymbolDictionary::shared(),
            summary_cache: DashMap::new(),
            config,
        }
    }

    /// Enrich a draft and append it to the store.
    ///
    /// Duplicate drafts (same dedup key) return the existing notification
    /// without calling the assistant.
    pub async fn enrich(&self, draft: NotificationDraft) -> Result<AppendOutcome> {
        let kind = draft
            .kind
            .ok_or_else(|| EnrichError::InvalidDraft("missing type".to_string()))?;
        let source = draft
            .source
            .ok_or_else(|| EnrichError::InvalidDraft("missing source".to_string()))?;
        if draft.title.trim().is_empty() && draft.message.trim().is_empty() {
            return Err(EnrichError::InvalidDraft(
                "draft has neither title nor message".to_string(),
            ));
        }

        // 1. Dedup short-circuit against the store.
        let dedup_key = draft.dedup_key();
        if let Some(existing) = self.store.get_by_dedup(&dedup_key).await? {
            DEDUP_HITS_TOTAL.inc();
            debug!(%dedup_key, "Duplicate draft, returning existing notification");
            return Ok(AppendOutcome::Duplicate(existing));
        }

        // 2. Symbol: explicit wins, else first unambiguous dictionary hit.
        let symbol = draft
            .symbol
            .as_deref()
            .map(canonicalize)
            .or_else(|| self.dictionary.extract_first(&draft.message))
            .or_else(|| self.dictionary.extract_first(&draft.title));

        // 3. Priority: producer's choice wins, else per-type heuristics.
        let priority = draft
            .priority
            .unwrap_or_else(|| priority::default_for(kind, &draft.title, &draft.message));

        // 4/5. Summary with cache.
        let budget = priority.word_budget();
        let cache_key = {
            let payload = format!("{kind:?}|{priority}|{}|{}", draft.title, draft.message);
            fnv1a64(payload.as_bytes())
        };
        let summarized_message = if let Some(hit) = self.summary_cache.get(&cache_key) {
            SUMMARY_CACHE_HITS_TOTAL.inc();
            hit.clone()
        } else {
            let summary = match self
                .summarizer
                .summarize(kind, priority, &draft.title, &draft.message, budget)
                .await
            {
                // Clamp to the budget even if the assistant overruns.
                Ok(s) => truncate_words(&s, budget),
                Err(e) => {
                    SUMMARIZER_FAILURES_TOTAL.inc();
                    warn!(error = %e, "Summarizer unavailable, using fallback");
                    fallback_summary(&draft.title, &draft.message, budget)
                }
            };
            if self.summary_cache.len() >= self.config.summary_cache_cap {
                self.summary_cache.clear();
            }
            self.summary_cache.insert(cache_key, summary.clone());
            summary
        };

        // 6. Append; the store broadcasts the Created event to fan-out.
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind,
            priority,
            source,
            title: draft.title,
            message: draft.message,
            summarized_message: Some(summarized_message),
            symbol,
            confidence_score: draft.confidence_score,
            urgency_score: draft.urgency_score,
            promise_score: draft.promise_score,
            metadata: draft.metadata,
            actions: draft.actions,
            created_at: Utc::now(),
            read: false,
            responded: false,
            response_action: None,
            dedup_key,
        };

        let outcome = self.store.append(notification).await?;
        match &outcome {
            AppendOutcome::Created(n) => {
                NOTIFICATIONS_TOTAL
                    .with_label_values(&[&n.source.to_string(), &n.priority.to_string()])
                    .inc();
            }
            AppendOutcome::Duplicate(_) => DEDUP_HITS_TOTAL.inc(),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{NotificationType, Priority, Source};
    use argus_store::{spawn_store, StoreConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted assistant: counts calls, optionally fails.
    struct FakeSummarizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeSummarizer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    impl Summarizer for FakeSummarizer {
        async fn summarize(
            &self,
            _kind: NotificationType,
            _priority: Priority,
            title: &str,
            _message: &str,
            _max_words: usize,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EnrichError::SummarizerFailed("scripted".to_string()))
            } else {
                Ok(format!("summary of {title}"))
            }
        }

        async fn chat(
            &self,
            _history: &[(String, String)],
            _context: &str,
            _prompt: &str,
        ) -> Result<String> {
            Ok(String::new())
        }
    }

    fn draft(external_id: &str) -> NotificationDraft {
        let mut d = NotificationDraft::new(
            NotificationType::NewsEvent,
            Source::News,
            "Exchange lists SHIB",
            "SHIB spot pairs go live tomorrow",
        );
        d.external_id = Some(external_id.to_string());
        d
    }

    #[tokio::test]
    async fn test_enrich_fills_symbol_priority_summary() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let enricher = Enricher::new(store, FakeSummarizer::new(false), EnrichConfig::default());

        let outcome = enricher.enrich(draft("n1")).await.unwrap();
        let n = outcome.notification();
        assert_eq!(n.symbol.as_deref(), Some("SHIB/USDT"));
        // "lists" hits the listing keyword rule.
        assert_eq!(n.priority, Priority::Medium);
        assert!(n.summarized_message.as_deref().unwrap().starts_with("summary of"));
    }

    #[tokio::test]
    async fn test_duplicate_skips_summarizer() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let summarizer = FakeSummarizer::new(false);
        let enricher = Enricher::new(store, summarizer.clone(), EnrichConfig::default());

        let first = enricher.enrich(draft("same")).await.unwrap();
        assert!(!first.is_duplicate());
        let second = enricher.enrich(draft("same")).await.unwrap();
        assert!(second.is_duplicate());
        assert_eq!(first.notification().id, second.notification().id);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_summarizer_failure_falls_back() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let enricher = Enricher::new(store, FakeSummarizer::new(true), EnrichConfig::default());

        let outcome = enricher.enrich(draft("n2")).await.unwrap();
        let n = outcome.notification();
        // Fallback truncates the title.
        assert_eq!(n.summarized_message.as_deref(), Some("Exchange lists SHIB"));
    }

    #[tokio::test]
    async fn test_summary_respects_word_budget() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let enricher = Enricher::new(store, FakeSummarizer::new(false), EnrichConfig::default());

        let mut d = NotificationDraft::new(
            NotificationType::RiskAlert,
            Source::System,
            &"word ".repeat(40),
            "body",
        );
        d.external_id = Some("long".to_string());
        let outcome = enricher.enrich(d).await.unwrap();
        let n = outcome.notification();
        let words = n.summarized_message.as_deref().unwrap().split_whitespace().count();
        assert!(words <= n.priority.word_budget());
    }

    #[tokio::test]
    async fn test_identical_content_uses_cache() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let summarizer = FakeSummarizer::new(false);
        let enricher = Enricher::new(store, summarizer.clone(), EnrichConfig::default());

        // Different external ids, identical content: second hit comes from
        // the summary cache.
        enricher.enrich(draft("a")).await.unwrap();
        enricher.enrich(draft("b")).await.unwrap();
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_draft_rejected() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let enricher = Enricher::new(store, FakeSummarizer::new(false), EnrichConfig::default());

        let d = NotificationDraft::new(NotificationType::NewsEvent, Source::News, " ", "");
        assert!(matches!(
            enricher.enrich(d).await,
            Err(EnrichError::InvalidDraft(_))
        ));
    }
}
