//! Opaque provider credential snapshot.
//!
//! Credentials are a flat key-value map of provider secrets, loaded once at
//! startup and read-only afterwards. Values are never logged; the Debug
//! impl redacts them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PersistenceResult;

/// Read-only credential store.
pub struct CredentialStore {
    values: HashMap<String, String>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Build from an in-memory map (tests, env-derived credentials).
    #[must_use]
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Load from a JSON file of `{"key": "secret"}` pairs. A missing file
    /// yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No credential file, starting empty");
            return Ok(Self {
                values: HashMap::new(),
            });
        }
        let raw = fs::read_to_string(path)?;
        let values: HashMap<String, String> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), keys = values.len(), "Credentials loaded");
        Ok(Self { values })
    }

    /// Write the store to disk atomically. Used by the OAuth-style token
    /// refresh path; contents are opaque to the rest of the system.
    pub fn persist(&self, path: impl Into<PathBuf>) -> PersistenceResult<()> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.values)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Fetch a credential by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether a credential is present and non-empty.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_values() {
        let mut map = HashMap::new();
        map.insert("tts_api_key".to_string(), "super-secret".to_string());
        let store = CredentialStore::from_map(map);
        let debug = format!("{store:?}");
        assert!(debug.contains("tts_api_key"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = CredentialStore::load("/nonexistent/creds.json").unwrap();
        assert!(!store.has("anything"));
    }

    #[test]
    fn test_has_rejects_empty_values() {
        let mut map = HashMap::new();
        map.insert("empty".to_string(), String::new());
        let store = CredentialStore::from_map(map);
        assert!(!store.has("empty"));
    }
}
