//! Notification store actor.
//!
//! Single-threaded actor owning the notification log and its secondary
//! indexes (dedup key, symbol, source). Mutations are processed in arrival
//! order; each emits a `MutationEvent` on the broadcast channel.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use argus_core::{MutationEvent, Notification, Priority, Source};
use argus_telemetry::metrics::STORE_SIZE;

use crate::error::{Result, StoreError};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum retained notifications; oldest are evicted first.
    pub retention_cap: usize,
    /// Broadcast buffer for mutation events.
    pub event_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_cap: 10_000,
            event_buffer: 256,
        }
    }
}

/// Outcome of an append.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// Newly stored.
    Created(Notification),
    /// A notification with the same dedup key already exists; the
    /// existing record is returned and nothing is stored.
    Duplicate(Notification),
}

impl AppendOutcome {
    /// The stored notification, whether new or pre-existing.
    #[must_use]
    pub fn notification(&self) -> &Notification {
        match self {
            Self::Created(n) | Self::Duplicate(n) => n,
        }
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Read query for listing notifications.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Maximum results (newest first). `None` = all.
    pub limit: Option<usize>,
    pub unread_only: bool,
    /// Restrict to one canonical symbol (secondary index).
    pub symbol: Option<String>,
}

/// Counters returned by `stats`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub unread_count: usize,
    pub responded_count: usize,
    pub total_by_priority: HashMap<String, usize>,
    pub total_by_source: HashMap<String, usize>,
}

/// Messages for the store actor.
enum StoreMsg {
    Append {
        notification: Notification,
        reply: oneshot::Sender<AppendOutcome>,
    },
    Get {
        id: String,
        reply: oneshot::Sender<Option<Notification>>,
    },
    GetByDedup {
        dedup_key: String,
        reply: oneshot::Sender<Option<Notification>>,
    },
    List {
        query: ListQuery,
        reply: oneshot::Sender<Vec<Notification>>,
    },
    MarkRead {
        id: String,
        reply: oneshot::Sender<Result<Notification>>,
    },
    Respond {
        id: String,
        action: String,
        custom_message: Option<String>,
        reply: oneshot::Sender<Result<Notification>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Stats {
        reply: oneshot::Sender<StoreStats>,
    },
    Shutdown,
}

/// Store actor task state.
struct StoreTask {
    rx: mpsc::Receiver<StoreMsg>,
    events: broadcast::Sender<MutationEvent>,
    config: StoreConfig,

    /// id -> notification.
    items: HashMap<String, Notification>,
    /// Insertion order, oldest first. Appends are monotonic in
    /// `created_at`, so reverse iteration is presentation (newest) order.
    order: VecDeque<String>,
    /// dedup_key -> id.
    by_dedup: HashMap<String, String>,
    /// canonical symbol -> ids.
    by_symbol: HashMap<String, Vec<String>>,
    /// source -> ids.
    by_source: HashMap<Source, Vec<String>>,
}

impl StoreTask {
    fn new(
        rx: mpsc::Receiver<StoreMsg>,
        events: broadcast::Sender<MutationEvent>,
        config: StoreConfig,
    ) -> Self {
        Self {
            rx,
            events,
            config,
            items: HashMap::new(),
            order: VecDeque::new(),
            by_dedup: HashMap::new(),
            by_symbol: HashMap::new(),
            by_source: HashMap::new(),
        }
    }

    async fn run(mut self) {
        info!(cap = self.config.retention_cap, "Notification store started");
        while let Some(msg) = self.rx.recv().await {
            match msg {
                StoreMsg::Append {
                    notification,
                    reply,
                } => {
                    let outcome = self.append(notification);
                    let _ = reply.send(outcome);
                }
                StoreMsg::Get { id, reply } => {
                    let _ = reply.send(self.items.get(&id).cloned());
                }
                StoreMsg::GetByDedup { dedup_key, reply } => {
                    let found = self
                        .by_dedup
                        .get(&dedup_key)
                        .and_then(|id| self.items.get(id))
                        .cloned();
                    let _ = reply.send(found);
                }
                StoreMsg::List { query, reply } => {
                    let _ = reply.send(self.list(&query));
                }
                StoreMsg::MarkRead { id, reply } => {
                    let _ = reply.send(self.mark_read(&id));
                }
                StoreMsg::Respond {
                    id,
                    action,
                    custom_message,
                    reply,
                } => {
                    let _ = reply.send(self.respond(&id, &action, custom_message));
                }
                StoreMsg::Delete { id, reply } => {
                    let _ = reply.send(self.delete(&id));
                }
                StoreMsg::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                StoreMsg::Shutdown => {
                    info!(retained = self.items.len(), "Notification store shutting down");
                    break;
                }
            }
        }
    }

    fn append(&mut self, notification: Notification) -> AppendOutcome {
        // Duplicate submission returns the existing notification.
        if let Some(existing_id) = self.by_dedup.get(&notification.dedup_key) {
            if let Some(existing) = self.items.get(existing_id) {
                debug!(dedup_key = %notification.dedup_key, "Duplicate append short-circuited");
                return AppendOutcome::Duplicate(existing.clone());
            }
        }

        let id = notification.id.clone();
        self.by_dedup
            .insert(notification.dedup_key.clone(), id.clone());
        if let Some(symbol) = &notification.symbol {
            self.by_symbol
                .entry(symbol.clone())
                .or_default()
                .push(id.clone());
        }
        self.by_source
            .entry(notification.source)
            .or_default()
            .push(id.clone());
        self.order.push_back(id.clone());
        self.items.insert(id, notification.clone());

        self.evict_over_cap();
        STORE_SIZE.set(self.items.len() as i64);

        let _ = self.events.send(MutationEvent::Created {
            notification: Box::new(notification.clone()),
        });
        AppendOutcome::Created(notification)
    }

    /// Oldest-first eviction down to the retention cap.
    fn evict_over_cap(&mut self) {
        while self.items.len() > self.config.retention_cap {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.items.remove(&oldest) {
                self.unindex(&evicted);
                debug!(id = %evicted.id, "Evicted over retention cap");
            }
        }
    }

    fn unindex(&mut self, n: &Notification) {
        self.by_dedup.remove(&n.dedup_key);
        if let Some(symbol) = &n.symbol {
            if let Some(ids) = self.by_symbol.get_mut(symbol) {
                ids.retain(|id| id != &n.id);
                if ids.is_empty() {
                    self.by_symbol.remove(symbol);
                }
            }
        }
        if let Some(ids) = self.by_source.get_mut(&n.source) {
            ids.retain(|id| id != &n.id);
        }
    }

    fn list(&self, query: &ListQuery) -> Vec<Notification> {
        let limit = query.limit.unwrap_or(usize::MAX);

        // Symbol queries walk the secondary index instead of the log.
        if let Some(symbol) = &query.symbol {
            let Some(ids) = self.by_symbol.get(symbol) else {
                return Vec::new();
            };
            return ids
                .iter()
                .rev()
                .filter_map(|id| self.items.get(id))
                .filter(|n| !query.unread_only || !n.read)
                .take(limit)
                .cloned()
                .collect();
        }

        self.order
            .iter()
            .rev()
            .filter_map(|id| self.items.get(id))
            .filter(|n| !query.unread_only || !n.read)
            .take(limit)
            .cloned()
            .collect()
    }

    fn mark_read(&mut self, id: &str) -> Result<Notification> {
        let n = self
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let already_read = n.read;
        n.mark_read();
        let result = n.clone();
        // Idempotent: only the first transition emits an event.
        if !already_read {
            let _ = self.events.send(MutationEvent::Read { id: id.to_string() });
        }
        Ok(result)
    }

    fn respond(
        &mut self,
        id: &str,
        action: &str,
        custom_message: Option<String>,
    ) -> Result<Notification> {
        let n = self
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        n.respond(action);
        if let Some(message) = custom_message {
            n.metadata
                .insert("response_message".to_string(), message.into());
        }
        let result = n.clone();
        let _ = self.events.send(MutationEvent::Responded {
            id: id.to_string(),
            action: action.to_string(),
        });
        Ok(result)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let n = self
            .items
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.order.retain(|o| o != id);
        self.unindex(&n);
        STORE_SIZE.set(self.items.len() as i64);
        let _ = self
            .events
            .send(MutationEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.items.len(),
            ..Default::default()
        };
        for priority in Priority::ALL {
            stats.total_by_priority.insert(priority.to_string(), 0);
        }
        // Source counts come straight off the secondary index.
        for (source, ids) in &self.by_source {
            if !ids.is_empty() {
                stats.total_by_source.insert(source.to_string(), ids.len());
            }
        }
        for n in self.items.values() {
            if !n.read {
                stats.unread_count += 1;
            }
            if n.responded {
                stats.responded_count += 1;
            }
            *stats
                .total_by_priority
                .entry(n.priority.to_string())
                .or_insert(0) += 1;
        }
        stats
    }
}

/// Handle to the store actor.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreMsg>,
    events: broadcast::Sender<MutationEvent>,
}

impl StoreHandle {
    /// Subscribe to mutation events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreMsg,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        rx.await.map_err(|_| StoreError::Unavailable)
    }

    /// Append a notification. Duplicates by dedup key return the existing
    /// record.
    pub async fn append(&self, notification: Notification) -> Result<AppendOutcome> {
        self.request(|reply| StoreMsg::Append {
            notification,
            reply,
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Notification>> {
        self.request(|reply| StoreMsg::Get {
            id: id.to_string(),
            reply,
        })
        .await
    }

    pub async fn get_by_dedup(&self, dedup_key: &str) -> Result<Option<Notification>> {
        self.request(|reply| StoreMsg::GetByDedup {
            dedup_key: dedup_key.to_string(),
            reply,
        })
        .await
    }

    pub async fn list(&self, query: ListQuery) -> Result<Vec<Notification>> {
        self.request(|reply| StoreMsg::List { query, reply }).await
    }

    /// Idempotent.
    pub async fn mark_read(&self, id: &str) -> Result<Notification> {
        self.request(|reply| StoreMsg::MarkRead {
            id: id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn respond(
        &self,
        id: &str,
        action: &str,
        custom_message: Option<String>,
    ) -> Result<Notification> {
        self.request(|reply| StoreMsg::Respond {
            id: id.to_string(),
            action: action.to_string(),
            custom_message,
            reply,
        })
        .await?
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.request(|reply| StoreMsg::Delete {
            id: id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.request(|reply| StoreMsg::Stats { reply }).await
    }

    /// Request graceful shutdown. Pending messages ahead of the shutdown
    /// are still processed.
    pub async fn shutdown(&self) {
        if self.tx.send(StoreMsg::Shutdown).await.is_err() {
            warn!("Store already stopped");
        }
    }
}

/// Spawn the store actor. Returns the handle and the task join handle.
#[must_use]
pub fn spawn_store(config: StoreConfig) -> (StoreHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let (events, _) = broadcast::channel(config.event_buffer);
    let task = StoreTask::new(rx, events.clone(), config);
    let join = tokio::spawn(task.run());
    (StoreHandle { tx, events }, join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::{NotificationDraft, NotificationType};
    use chrono::Utc;

    fn notification(dedup: &str, priority: Priority) -> Notification {
        let draft = NotificationDraft::new(
            NotificationType::NewsEvent,
            Source::News,
            "title",
            "message",
        );
        Notification {
            id: uuid::Uuid::new_v4().to_string(),
            kind: NotificationType::NewsEvent,
            priority,
            source: Source::News,
            title: draft.title,
            message: draft.message,
            summarized_message: None,
            symbol: Some("BTC/USDT".to_string()),
            confidence_score: None,
            urgency_score: None,
            promise_score: None,
            metadata: Default::default(),
            actions: Vec::new(),
            created_at: Utc::now(),
            read: false,
            responded: false,
            response_action: None,
            dedup_key: dedup.to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_and_dedup() {
        let (store, _join) = spawn_store(StoreConfig::default());

        let first = store
            .append(notification("news:abc123", Priority::Medium))
            .await
            .unwrap();
        assert!(!first.is_duplicate());

        let second = store
            .append(notification("news:abc123", Priority::Medium))
            .await
            .unwrap();
        assert!(second.is_duplicate());
        assert_eq!(
            second.notification().id,
            first.notification().id,
            "duplicate returns the original record"
        );

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.total_by_source.get("news"), Some(&1));
    }

    #[tokio::test]
    async fn test_mark_read_idempotent() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let mut events = store.subscribe();

        let n = store
            .append(notification("news:1", Priority::Low))
            .await
            .unwrap();
        let id = n.notification().id.clone();

        // Consume the Created event.
        assert!(matches!(
            events.recv().await.unwrap(),
            MutationEvent::Created { .. }
        ));

        store.mark_read(&id).await.unwrap();
        let again = store.mark_read(&id).await.unwrap();
        assert!(again.read);

        // Only one Read event for two mark_read calls.
        assert!(matches!(
            events.recv().await.unwrap(),
            MutationEvent::Read { .. }
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_respond_sets_read() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let n = store
            .append(notification("news:2", Priority::High))
            .await
            .unwrap();
        let id = n.notification().id.clone();

        let responded = store
            .respond(&id, "approve", Some("looks good".to_string()))
            .await
            .unwrap();
        assert!(responded.responded);
        assert!(responded.read);
        assert_eq!(responded.response_action.as_deref(), Some("approve"));
    }

    #[tokio::test]
    async fn test_list_unread_only_and_limit() {
        let (store, _join) = spawn_store(StoreConfig::default());
        for i in 0..5 {
            store
                .append(notification(&format!("news:{i}"), Priority::Medium))
                .await
                .unwrap();
        }
        let all = store.list(ListQuery::default()).await.unwrap();
        assert_eq!(all.len(), 5);
        // Newest first.
        assert_eq!(all[0].dedup_key, "news:4");

        let first_id = all[4].id.clone();
        store.mark_read(&first_id).await.unwrap();

        let unread = store
            .list(ListQuery {
                limit: Some(10),
                unread_only: true,
                symbol: None,
            })
            .await
            .unwrap();
        assert_eq!(unread.len(), 4);

        let limited = store
            .list(ListQuery {
                limit: Some(2),
                unread_only: false,
                symbol: None,
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_symbol_index_lookup() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let mut eth = notification("news:eth", Priority::Medium);
        eth.symbol = Some("ETH/USDT".to_string());
        store.append(eth).await.unwrap();
        store
            .append(notification("news:btc", Priority::Medium))
            .await
            .unwrap();

        let btc = store
            .list(ListQuery {
                symbol: Some("BTC/USDT".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(btc.len(), 1);
        assert_eq!(btc[0].dedup_key, "news:btc");

        let none = store
            .list(ListQuery {
                symbol: Some("DOGE/USDT".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_oldest_first() {
        let (store, _join) = spawn_store(StoreConfig {
            retention_cap: 3,
            event_buffer: 64,
        });
        for i in 0..5 {
            store
                .append(notification(&format!("news:{i}"), Priority::Info))
                .await
                .unwrap();
        }
        let all = store.list(ListQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        // The two oldest are gone; their dedup keys are reusable again.
        assert!(store.get_by_dedup("news:0").await.unwrap().is_none());
        assert!(store.get_by_dedup("news:4").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_and_not_found() {
        let (store, _join) = spawn_store(StoreConfig::default());
        let n = store
            .append(notification("news:del", Priority::Medium))
            .await
            .unwrap();
        let id = n.notification().id.clone();

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
