use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::{CacheOptions, ConfigPaths};

mod memory;
mod schema;

pub use memory::MemoryStore;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {used} of {quota} bytes")]
    QuotaExceeded { used: u64, quota: u64 },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Durable string-to-string storage shared by whichever editor is mounted.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
    fn keys(&self) -> StorageResult<Vec<String>>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        (**self).keys()
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<CacheOptions>,
}

impl SqliteStore {
    pub fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn quota_bytes(&self) -> Option<u64> {
        match self.options.quota_bytes {
            0 => None,
            quota => Some(quota),
        }
    }

    /// Total bytes held by keys and values, as counted against the quota.
    pub fn used_bytes(&self) -> StorageResult<u64> {
        self.with_connection(|conn| {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
                 FROM kv_entries",
                [],
                |row| row.get(0),
            )?;
            Ok(used.max(0) as u64)
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let quota = self.quota_bytes();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        if let Some(quota) = quota {
            let others: i64 = tx.query_row(
                "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
                 FROM kv_entries
                 WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )?;
            let used = others.max(0) as u64 + (key.len() + value.len()) as u64;
            if used > quota {
                return Err(StorageError::QuotaExceeded { used, quota });
            }
        }
        let now = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let keys = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }
}

pub fn init(paths: &ConfigPaths, options: &CacheOptions) -> anyhow::Result<SqliteStore> {
    let db_path = &paths.cache_db_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening cache database {}", db_path.display()))?;
    prepare_connection(&conn, options).context("preparing cache database connection")?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "cache database ready");
    Ok(SqliteStore {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(options.clone()),
    })
}

fn prepare_connection(conn: &Connection, options: &CacheOptions) -> StorageResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        options.wal_autocheckpoint.to_string(),
    )?;
    conn.busy_timeout(std::time::Duration::from_millis(options.busy_timeout_ms))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheOptions, ConfigPaths};
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            cache_db_path: data_dir.join("cache.db"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    fn init_store(quota_bytes: u64) -> anyhow::Result<(TempDir, SqliteStore)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let options = CacheOptions {
            quota_bytes,
            ..CacheOptions::default()
        };
        let store = init(&paths, &options)?;
        Ok((temp, store))
    }

    #[test]
    fn set_get_remove_round_trip() -> anyhow::Result<()> {
        let (_temp, store) = init_store(0)?;
        store.set("alpha", "one")?;
        store.set("alpha", "two")?;
        assert_eq!(store.get("alpha")?.as_deref(), Some("two"));
        assert_eq!(store.keys()?, vec!["alpha".to_string()]);

        store.remove("alpha")?;
        assert_eq!(store.get("alpha")?, None);
        store.remove("alpha")?;
        Ok(())
    }

    #[test]
    fn quota_rejects_oversized_write_and_keeps_previous_value() -> anyhow::Result<()> {
        let (_temp, store) = init_store(32)?;
        store.set("k", "small")?;

        let err = store.set("k", &"x".repeat(64)).unwrap_err();
        assert!(err.is_quota(), "expected quota error, got {err:?}");
        assert_eq!(store.get("k")?.as_deref(), Some("small"));
        Ok(())
    }

    #[test]
    fn quota_counts_replaced_value_once() -> anyhow::Result<()> {
        let (_temp, store) = init_store(20)?;
        store.set("key", &"a".repeat(15))?;
        // 3 + 17 = 20 bytes fits because the old value is replaced, not added.
        store.set("key", &"b".repeat(17))?;
        assert_eq!(store.used_bytes()?, 20);
        Ok(())
    }

    #[test]
    fn data_survives_reopen() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let options = CacheOptions::default();
        {
            let store = init(&paths, &options)?;
            store.set("persist", "value")?;
        }
        let reopened = init(&paths, &options)?;
        assert_eq!(reopened.get("persist")?.as_deref(), Some("value"));
        Ok(())
    }
}
