//! Persistent key-value storage behind the entity cache.
//!
//! `KeyValueStore` is the raw backend (files on disk, or memory in tests).
//! `StorageAdapter` wraps a backend and never fails: reads of broken data come
//! back as absent, and writes report success as a plain `bool` so a full disk
//! degrades caching instead of breaking a refresh.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// `ENOSPC` on Linux and macOS.
const ENOSPC: i32 = 28;

/// File extension for entries written by `FileStore`.
const ENTRY_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded writing {key} ({needed} bytes needed, limit {limit})")]
    QuotaExceeded { key: String, needed: u64, limit: u64 },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Raw string-keyed storage with a capacity limit.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// Memory backend
// ============================================================================

/// In-memory backend. Capacity counts key and value bytes.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    fn used_bytes(entries: &HashMap<String, String>, excluding: &str) -> u64 {
        entries
            .iter()
            .filter(|(k, _)| k.as_str() != excluding)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(limit) = self.capacity {
            let needed = Self::used_bytes(&entries, key) + (key.len() + value.len()) as u64;
            if needed > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// File backend
// ============================================================================

/// One file per key under a cache directory.
///
/// The quota is checked against the total size of all entry files, so it
/// behaves like a browser storage limit rather than a disk limit.
pub struct FileStore {
    cache_dir: PathBuf,
    quota_bytes: Option<u64>,
    // Serializes writes so the quota check and the write see the same total.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(cache_dir: PathBuf, quota_bytes: Option<u64>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            quota_bytes,
            write_lock: Mutex::new(()),
        })
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.cache_dir.join(format!("{}.{}", key, ENTRY_EXTENSION)))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    fn used_bytes(&self, excluding: &Path) -> Result<u64, StoreError> {
        let mut total = 0;
        for path in self.entry_files()? {
            if path != excluding {
                total += std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(total)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        if let Some(limit) = self.quota_bytes {
            let needed = self.used_bytes(&path)? + value.len() as u64;
            if needed > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }

        std::fs::write(&path, value).map_err(|e| {
            if e.raw_os_error() == Some(ENOSPC) {
                StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed: value.len() as u64,
                    limit: self.quota_bytes.unwrap_or(0),
                }
            } else {
                StoreError::Io(e)
            }
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry. A file that cannot be removed does not stop the
    /// rest; the last failure is returned.
    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut last_error = None;
        for path in self.entry_files()? {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Failed to remove cache entry");
                last_error = Some(StoreError::Io(e));
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .entry_files()?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Never-failing handle over a storage backend.
/// Clone is cheap - the backend is shared through an `Arc`.
pub struct StorageAdapter<S: KeyValueStore> {
    backend: Arc<S>,
}

impl<S: KeyValueStore> Clone for StorageAdapter<S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<S: KeyValueStore> StorageAdapter<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Storage read failed");
                None
            }
        }
    }

    /// Write a value, returning whether it was persisted.
    ///
    /// A quota failure removes the key so a stale copy does not outlive the
    /// write that was meant to replace it.
    pub fn write(&self, key: &str, value: &str) -> bool {
        match self.backend.set(key, value) {
            Ok(()) => true,
            Err(StoreError::QuotaExceeded { needed, limit, .. }) => {
                warn!(key, needed, limit, "Storage full, dropping cache entry");
                if let Err(e) = self.backend.remove(key) {
                    debug!(key, error = %e, "Failed to remove entry after quota error");
                }
                false
            }
            Err(e) => {
                warn!(key, error = %e, "Storage write failed");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(key, error = %e, "Storage remove failed");
        }
    }

    pub fn clear_all(&self) {
        if let Err(e) = self.backend.clear() {
            warn!(error = %e, "Storage clear failed");
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.backend.keys().unwrap_or_else(|e| {
            warn!(error = %e, "Storage key listing failed");
            Vec::new()
        })
    }

    /// Read and parse a JSON entry. Corrupt JSON reads as absent.
    pub fn read_json(&self, key: &str) -> Option<Value> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Ignoring unparseable cache entry");
                None
            }
        }
    }

    pub fn write_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.write(key, &raw),
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.set("appClients", "[]").unwrap();
        assert_eq!(store.get("appClients").unwrap().as_deref(), Some("[]"));
        store.remove("appClients").unwrap();
        assert_eq!(store.get("appClients").unwrap(), None);
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_capacity_bytes(16);
        store.set("a", "1234").unwrap();
        let err = store.set("b", "0123456789abcdef").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        // Replacing an existing key only counts the new value
        store.set("a", "123456789").unwrap();
    }

    #[test]
    fn test_adapter_write_reports_quota_failure() {
        let adapter = StorageAdapter::new(MemoryStore::with_capacity_bytes(24));
        assert!(adapter.write("appSafes", "[1]"));
        assert!(!adapter.write("appSafes", &"x".repeat(64)));
        // The stale value is gone rather than left behind
        assert_eq!(adapter.read("appSafes"), None);
    }

    #[test]
    fn test_adapter_read_json_ignores_corrupt_entry() {
        let adapter = StorageAdapter::new(MemoryStore::new());
        assert!(adapter.write("appUsers", "{not json"));
        assert_eq!(adapter.read_json("appUsers"), None);
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().to_path_buf(), None).unwrap();
        store.set("appClients", "[{\"id\":1}]").unwrap();
        store.set("companyName", "acme").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["appClients", "companyName"]);
        assert_eq!(store.get("companyName").unwrap().as_deref(), Some("acme"));

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(store.get("appClients").unwrap(), None);
    }

    #[test]
    fn test_file_store_clear_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().to_path_buf(), None).unwrap();
        store.set("appClients", "[]").unwrap();
        store.set("appUsers", "[]").unwrap();
        store.set("session", "{}").unwrap();
        // A directory with an entry name cannot be removed as a file
        std::fs::create_dir(dir.path().join("blocker.json")).unwrap();

        assert!(store.clear().is_err());
        assert_eq!(store.keys().unwrap(), vec!["blocker"]);
    }

    #[test]
    fn test_file_store_quota() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().to_path_buf(), Some(10)).unwrap();
        store.set("small", "12345").unwrap();
        let err = store.set("large", "1234567890").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().to_path_buf(), None).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
    }
}
