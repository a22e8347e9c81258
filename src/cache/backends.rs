//! Physical substrates for cache entries.

use crate::cache::{CacheBackend, CacheEntry};
use crate::error::Result;
use crate::kv::KeyValueStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix applied to cache keys inside a shared key-value store.
pub const CACHE_KEY_PREFIX: &str = "cache_";

/// Cache entries stored as JSON strings in a [`KeyValueStore`].
///
/// Keys are namespaced with [`CACHE_KEY_PREFIX`] so the cache can share a
/// store with task and metadata records.
pub struct KeyValueCacheBackend {
    kv: Arc<dyn KeyValueStore + Send + Sync>,
}

impl KeyValueCacheBackend {
    /// Create a cache backend over `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore + Send + Sync>) -> Self {
        Self { kv }
    }

    fn storage_key(key: &str) -> String {
        format!("{CACHE_KEY_PREFIX}{key}")
    }
}

impl CacheBackend for KeyValueCacheBackend {
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(json) = self.kv.get_item(&Self::storage_key(key))? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // Unreadable entries are treated as absent and dropped.
                tracing::warn!(key, error = %e, "discarding malformed cache entry");
                self.kv.remove_item(&Self::storage_key(key))?;
                Ok(None)
            }
        }
    }

    fn put_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        self.kv.set_item(&Self::storage_key(key), &json)
    }

    fn remove_entry(&self, key: &str) -> Result<()> {
        self.kv.remove_item(&Self::storage_key(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(CACHE_KEY_PREFIX).map(str::to_string))
            .collect())
    }
}

/// Cache entries stored in a `cache_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteCacheBackend {
    db_path: PathBuf,
}

impl SqliteCacheBackend {
    /// Create a cache backend in the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let backend = Self { db_path: db_path.as_ref().to_path_buf() };
        backend.init_schema()?;
        Ok(backend)
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.db_path)?)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

impl CacheBackend for SqliteCacheBackend {
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.open()?;
        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT value, created_at, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((value, created_at, expires_at)) = row else {
            return Ok(None);
        };
        match serde_json::from_str(&value) {
            Ok(value) => Ok(Some(CacheEntry { value, created_at, expires_at })),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed cache entry");
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
                Ok(None)
            }
        }
    }

    fn put_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, serde_json::to_string(&entry.value)?, entry.created_at, entry.expires_at],
        )?;
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT key FROM cache_entries ORDER BY key")?;
        let keys = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(value: serde_json::Value) -> CacheEntry {
        CacheEntry { value, created_at: 1, expires_at: 2 }
    }

    fn exercise(backend: &dyn CacheBackend) {
        assert!(backend.get_entry("a").unwrap().is_none());

        backend.put_entry("a", &entry(json!([1, 2]))).unwrap();
        backend.put_entry("b", &entry(json!("x"))).unwrap();
        assert_eq!(backend.get_entry("a").unwrap(), Some(entry(json!([1, 2]))));
        assert_eq!(backend.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

        backend.put_entry("a", &entry(json!(3))).unwrap();
        assert_eq!(backend.get_entry("a").unwrap().unwrap().value, json!(3));

        backend.remove_entry("a").unwrap();
        backend.remove_entry("a").unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_key_value_backend() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set_item("tasks", "[]").unwrap();
        let backend = KeyValueCacheBackend::new(kv.clone());
        exercise(&backend);

        // Non-cache keys are neither listed nor touched.
        assert_eq!(kv.get_item("tasks").unwrap().as_deref(), Some("[]"));
        assert!(kv.get_item("cache_b").unwrap().is_some());
    }

    #[test]
    fn test_key_value_backend_drops_malformed_entry() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.set_item("cache_bad", "{oops").unwrap();
        let backend = KeyValueCacheBackend::new(kv.clone());

        assert!(backend.get_entry("bad").unwrap().is_none());
        assert!(kv.get_item("cache_bad").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_backend() {
        let dir = TempDir::new().unwrap();
        let backend = SqliteCacheBackend::new(dir.path().join("tasks.sqlite3")).unwrap();
        exercise(&backend);
    }

    #[test]
    fn test_sqlite_backend_shares_task_database() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tasks.sqlite3");
        let tasks = crate::tasks::SqliteTaskStore::new(&db_path).unwrap();
        let backend = SqliteCacheBackend::new(&db_path).unwrap();

        backend.put_entry("k", &entry(json!(1))).unwrap();
        assert!(crate::tasks::TaskStore::get_all_tasks(&tasks).unwrap().is_empty());
        assert!(backend.get_entry("k").unwrap().is_some());
    }
}
