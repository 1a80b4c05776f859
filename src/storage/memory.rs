use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{KeyValueStore, StorageError, StorageResult};

/// Process-local store with the same quota rules as [`super::SqliteStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<IndexMap<String, String>>,
    quota_bytes: Option<u64>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Makes every subsequent operation fail as if storage were disabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful `set` calls since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store disabled".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_available()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let used = (others + key.len() + value.len()) as u64;
            if used > quota {
                return Err(StorageError::QuotaExceeded { used, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        self.entries.lock().shift_remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.check_available()?;
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
