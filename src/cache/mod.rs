//! Crash-safe snapshots of in-progress entries, keyed per editor slot.
//!
//! Every storage fault is logged and absorbed here; callers only ever see
//! "no cache" or a [`PutOutcome`].

use time::macros::format_description;
use time::OffsetDateTime;

use crate::storage::{KeyValueStore, StorageError};

mod codec;
mod emptiness;

pub use codec::{CacheSlot, EntryFields, EntrySnapshot, StateDigest, CACHE_KEY_PREFIX};
pub use emptiness::{is_blank_entry, is_document_empty};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// The first attempt hit the quota; the namespace was swept and the retry succeeded.
    WrittenAfterSweep,
    Dropped,
}

impl PutOutcome {
    pub fn is_written(self) -> bool {
        !matches!(self, PutOutcome::Dropped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PutOutcome::Written => "written",
            PutOutcome::WrittenAfterSweep => "written_after_sweep",
            PutOutcome::Dropped => "dropped",
        }
    }
}

pub struct LocalCacheStore<S> {
    backend: S,
}

impl<S: KeyValueStore> LocalCacheStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn put(&self, snapshot: &EntrySnapshot) -> PutOutcome {
        let slot = snapshot.slot();
        let key = slot.storage_key();
        let encoded = snapshot.encode();
        match self.backend.set(&key, &encoded) {
            Ok(()) => {
                tracing::trace!(%slot, bytes = encoded.len(), "cached snapshot");
                PutOutcome::Written
            }
            Err(err) if err.is_quota() => {
                tracing::warn!(%slot, %err, "cache quota exceeded, clearing cached snapshots");
                self.remove_all();
                match self.backend.set(&key, &encoded) {
                    Ok(()) => PutOutcome::WrittenAfterSweep,
                    Err(err) => {
                        tracing::warn!(%slot, %err, "dropping snapshot after sweep");
                        PutOutcome::Dropped
                    }
                }
            }
            Err(err) => {
                log_failure("write", slot, &err);
                PutOutcome::Dropped
            }
        }
    }

    pub fn get(&self, slot: CacheSlot) -> Option<EntrySnapshot> {
        let raw = match self.backend.get(&slot.storage_key()) {
            Ok(raw) => raw?,
            Err(err) => {
                log_failure("read", slot, &err);
                return None;
            }
        };
        let snapshot = EntrySnapshot::decode(&raw);
        if snapshot.is_none() {
            tracing::debug!(%slot, "cached value is not loadable");
        }
        snapshot
    }

    /// The new-entry snapshot when it has content, otherwise the newest editing snapshot.
    pub fn get_any_latest(&self) -> Option<EntrySnapshot> {
        if let Some(new) = self.get(CacheSlot::New).filter(|s| !s.is_empty()) {
            return Some(new);
        }
        self.list_editing().into_iter().next()
    }

    /// Loadable editing snapshots, newest first.
    pub fn list_editing(&self) -> Vec<EntrySnapshot> {
        let mut snapshots: Vec<EntrySnapshot> = self
            .namespace_keys()
            .into_iter()
            .filter_map(|key| CacheSlot::from_storage_key(&key))
            .filter(|slot| !slot.is_new())
            .filter_map(|slot| self.get(slot))
            .collect();
        snapshots.sort_by(|a, b| {
            b.cached_at
                .cmp(&a.cached_at)
                .then_with(|| b.entry_id.cmp(&a.entry_id))
        });
        snapshots
    }

    pub fn has_any(&self) -> bool {
        self.get(CacheSlot::New).is_some() || !self.list_editing().is_empty()
    }

    pub fn remove(&self, slot: CacheSlot) {
        match self.backend.remove(&slot.storage_key()) {
            Ok(()) => tracing::debug!(%slot, "removed cached snapshot"),
            Err(err) => log_failure("remove", slot, &err),
        }
    }

    /// Deletes every key under the cache prefix, including unparsable ones.
    pub fn remove_all(&self) -> usize {
        let mut removed = 0;
        for key in self.namespace_keys() {
            match self.backend.remove(&key) {
                Ok(()) => removed += 1,
                Err(err) => tracing::warn!(%key, %err, "failed to remove cached snapshot"),
            }
        }
        tracing::debug!(removed, "cleared cached snapshots");
        removed
    }

    fn namespace_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|key| key.starts_with(CACHE_KEY_PREFIX))
                .collect(),
            Err(err) => {
                tracing::warn!(%err, "listing cache keys failed");
                Vec::new()
            }
        }
    }
}

fn log_failure(op: &str, slot: CacheSlot, err: &StorageError) {
    tracing::warn!(%slot, %err, op, "cache storage failure ignored");
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Human-relative age of a snapshot, falling back to a UTC date after a week.
pub fn format_cache_time(cached_at_ms: i64, now_ms: i64) -> String {
    let minutes = (now_ms - cached_at_ms).max(0) / 60_000;
    let hours = minutes / 60;
    let days = hours / 24;
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "min")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 7 {
        plural(days, "day")
    } else {
        absolute_time(cached_at_ms)
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

fn absolute_time(cached_at_ms: i64) -> String {
    let format = format_description!("[month repr:short] [day padding:none], [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(cached_at_ms) * 1_000_000)
        .ok()
        .and_then(|ts| ts.format(&format).ok())
        .unwrap_or_else(|| "unknown".to_string())
}
