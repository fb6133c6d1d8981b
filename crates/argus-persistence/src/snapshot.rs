//! Source-tracking snapshot file.
//!
//! One JSON document holding the polling cursor, bounded seen-id ring and
//! last error per source. Written after each successful poll and on
//! shutdown; loaded once at startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Persisted state for one external source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSnapshot {
    /// Polling cursor (`last_seen_id` / `since_id`).
    pub last_seen_id: Option<String>,
    /// Bounded ring of recently seen external ids, oldest first.
    #[serde(default)]
    pub seen_ids: Vec<String>,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Opaque provider-specific state (e.g., resolved user ids).
    #[serde(default)]
    pub provider_state: HashMap<String, serde_json::Value>,
}

/// Snapshot file containing all sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotContents {
    #[serde(default)]
    pub sources: HashMap<String, SourceSnapshot>,
}

/// Reader/writer for the snapshot file.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Create a snapshot file handle, creating the parent directory if
    /// needed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(?e, "Failed to create snapshot directory: {}", parent.display());
            }
        }
        Self { path }
    }

    /// Path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. A missing file yields empty contents; a corrupt
    /// file is logged and treated as empty (pollers replay a window).
    pub fn load(&self) -> SnapshotContents {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(contents) => {
                    debug!(path = %self.path.display(), "Loaded source snapshot");
                    contents
                }
                Err(e) => {
                    warn!(?e, path = %self.path.display(), "Corrupt snapshot, starting empty");
                    SnapshotContents::default()
                }
            },
            Err(_) => {
                info!(path = %self.path.display(), "No snapshot file, starting empty");
                SnapshotContents::default()
            }
        }
    }

    /// Write the snapshot atomically: serialize to a sibling tmp file and
    /// rename over the target.
    pub fn store(&self, contents: &SnapshotContents) -> PersistenceResult<()> {
        let json = serde_json::to_string_pretty(contents)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), sources = contents.sources.len(), "Snapshot written");
        Ok(())
    }

    /// Update a single source and write the full snapshot.
    pub fn store_source(&self, name: &str, source: SourceSnapshot) -> PersistenceResult<()> {
        let mut contents = self.load();
        contents.sources.insert(name.to_string(), source);
        self.store(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("argus-snapshot-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let file = SnapshotFile::new(temp_path("missing").join("state.json"));
        assert!(file.load().sources.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let dir = temp_path("roundtrip");
        let file = SnapshotFile::new(dir.join("state.json"));

        let mut contents = SnapshotContents::default();
        contents.sources.insert(
            "news".to_string(),
            SourceSnapshot {
                last_seen_id: Some("n-42".to_string()),
                seen_ids: vec!["n-41".to_string(), "n-42".to_string()],
                last_poll_at: Some(Utc::now()),
                last_error: None,
                provider_state: HashMap::new(),
            },
        );
        file.store(&contents).unwrap();

        let loaded = file.load();
        let news = loaded.sources.get("news").unwrap();
        assert_eq!(news.last_seen_id.as_deref(), Some("n-42"));
        assert_eq!(news.seen_ids.len(), 2);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = temp_path("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let file = SnapshotFile::new(&path);
        assert!(file.load().sources.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_store_source_merges() {
        let dir = temp_path("merge");
        let file = SnapshotFile::new(dir.join("state.json"));

        file.store_source("news", SourceSnapshot::default()).unwrap();
        file.store_source("social", SourceSnapshot::default()).unwrap();

        assert_eq!(file.load().sources.len(), 2);
        std::fs::remove_dir_all(dir).ok();
    }
}
