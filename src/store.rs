//! Flat key-value persistence
//!
//! Every durable record (credentials, share tokens, progress, preferences)
//! lives under a single string key. `FileStore` keeps the whole map in one JSON
//! file; `MemoryStore` backs the tests.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Store write failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Minimal persisted key-value contract
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Shared handle passed to every store-backed component
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read a JSON value, treating missing or malformed data as absent
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "discarding malformed persisted value");
            None
        }
    }
}

/// Serialize and write a JSON value
pub fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

// =============================================================================
// File backend
// =============================================================================

/// JSON-file store at `<data_dir>/limestream/store.json`
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Default location under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("limestream")
            .join("store.json")
    }

    /// Open (or lazily create) the store file; a corrupt file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file is corrupt, starting empty");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Memory only changes once the file write succeeded
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

// =============================================================================
// Memory backend
// =============================================================================

/// Volatile store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor returning a shared handle
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path);
        store.set("region", "UK3").unwrap();
        set_json(&store, "numbers", &vec![1, 2, 3]).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get("region").as_deref(), Some("UK3"));
        let numbers: Vec<u32> = get_json(&reopened, "numbers").unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = FileStore::open(blocker.join("store.json"));
        assert!(store.set("region", "UK3").is_err());
        assert!(store.get("region").is_none());
    }

    #[test]
    fn test_failed_remove_keeps_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path);
        store.set("region", "UK3").unwrap();

        // Replace the file with a directory so the rewrite fails
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.remove("region").is_err());
        assert_eq!(store.get("region").as_deref(), Some("UK3"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_malformed_json_value_reads_as_none() {
        let store = MemoryStore::new();
        store.set("list", "[1, 2,").unwrap();
        let parsed: Option<Vec<u32>> = get_json(&store, "list");
        assert!(parsed.is_none());
    }

    #[test]
    fn test_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").is_none());
    }
}
