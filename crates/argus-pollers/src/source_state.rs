//! Per-source polling state: cursor + bounded dedup ring.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use argus_persistence::SourceSnapshot;

/// Default dedup ring capacity.
const RING_CAP: usize = 100;

/// Bounded ring of recently seen external ids.
#[derive(Debug, Clone)]
pub struct DedupRing {
    cap: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl Default for DedupRing {
    fn default() -> Self {
        Self::new(RING_CAP)
    }
}

impl DedupRing {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            order: VecDeque::with_capacity(cap),
            seen: HashSet::with_capacity(cap),
        }
    }

    /// Record an id. Returns `false` when it was already in the ring.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids oldest-first, for snapshotting.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }
}

/// Live state for one source, snapshot-convertible.
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    pub last_seen_id: Option<String>,
    pub ring: DedupRing,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Opaque provider-specific state (resolved user ids, per-user
    /// cursors).
    pub provider_state: HashMap<String, serde_json::Value>,
}

impl SourceState {
    /// Rehydrate from a persisted snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &SourceSnapshot) -> Self {
        let mut ring = DedupRing::default();
        for id in &snapshot.seen_ids {
            ring.insert(id);
        }
        Self {
            last_seen_id: snapshot.last_seen_id.clone(),
            ring,
            last_poll_at: snapshot.last_poll_at,
            last_error: snapshot.last_error.clone(),
            provider_state: snapshot.provider_state.clone(),
        }
    }

    #[must_use]
    pub fn to_snapshot(&self) -> SourceSnapshot {
        SourceSnapshot {
            last_seen_id: self.last_seen_id.clone(),
            seen_ids: self.ring.ids(),
            last_poll_at: self.last_poll_at,
            last_error: self.last_error.clone(),
            provider_state: self.provider_state.clone(),
        }
    }

    /// Read a string value from provider state.
    #[must_use]
    pub fn provider_str(&self, key: &str) -> Option<String> {
        self.provider_state
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Write a string value into provider state.
    pub fn set_provider_str(&mut self, key: &str, value: &str) {
        self.provider_state
            .insert(key.to_string(), value.to_string().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_dedups() {
        let mut ring = DedupRing::new(10);
        assert!(ring.insert("a"));
        assert!(!ring.insert("a"));
        assert!(ring.contains("a"));
    }

    #[test]
    fn test_ring_bounded() {
        let mut ring = DedupRing::new(3);
        for id in ["a", "b", "c", "d"] {
            ring.insert(id);
        }
        assert_eq!(ring.len(), 3);
        // Oldest fell out; it may be seen again.
        assert!(!ring.contains("a"));
        assert!(ring.contains("d"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = SourceState::default();
        state.last_seen_id = Some("n-9".to_string());
        state.ring.insert("n-8");
        state.ring.insert("n-9");
        state.set_provider_str("resolved:whale", "u-1");

        let restored = SourceState::from_snapshot(&state.to_snapshot());
        assert_eq!(restored.last_seen_id.as_deref(), Some("n-9"));
        assert!(restored.ring.contains("n-8"));
        assert_eq!(restored.provider_str("resolved:whale").as_deref(), Some("u-1"));
    }
}
