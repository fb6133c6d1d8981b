//! Bounded LRU cache for synthesized audio.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::provider::Synthesis;

/// Cache key: provider + voice + sanitized text + preset tag.
pub type CacheKey = (String, String, String, String);

/// Small LRU over a HashMap and a recency deque. Sized for audio blobs,
/// so the cap counts entries, not bytes.
pub struct AudioCache {
    entries: HashMap<CacheKey, Synthesis>,
    recency: VecDeque<CacheKey>,
    cap: usize,
}

impl AudioCache {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(cap.min(64)),
            recency: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
        }
    }

    /// Look up and promote to most-recently-used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Synthesis> {
        let hit = self.entries.get(key)?.clone();
        self.touch(key);
        Some(hit)
    }

    /// Insert, evicting the least-recently-used entry over the cap.
    pub fn insert(&mut self, key: CacheKey, value: Synthesis) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.recency.push_back(key);
        } else {
            self.touch(&key);
        }
        while self.entries.len() > self.cap {
            if let Some(oldest) = self.recency.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> CacheKey {
        (
            "premium".to_string(),
            "ava".to_string(),
            text.to_string(),
            "r1.00p1.00v1.00".to_string(),
        )
    }

    fn audio(tag: u8) -> Synthesis {
        Synthesis {
            audio: vec![tag; 4],
            content_type: "audio/mpeg".to_string(),
        }
    }

    #[test]
    fn test_hit_returns_identical_bytes() {
        let mut cache = AudioCache::new(8);
        cache.insert(key("hello"), audio(1));
        let hit = cache.get(&key("hello")).unwrap();
        assert_eq!(hit.audio, vec![1; 4]);
    }

    #[test]
    fn test_eviction_is_lru() {
        let mut cache = AudioCache::new(2);
        cache.insert(key("a"), audio(1));
        cache.insert(key("b"), audio(2));
        // Touch "a" so "b" is the LRU.
        cache.get(&key("a"));
        cache.insert(key("c"), audio(3));
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn test_reinsert_updates() {
        let mut cache = AudioCache::new(2);
        cache.insert(key("a"), audio(1));
        cache.insert(key("a"), audio(9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a")).unwrap().audio, vec![9; 4]);
    }
}
