//! Metadata persistence: user preferences and the onboarding flag.
//!
//! Metadata follows the same two-substrate pattern as tasks but is
//! independent of them: it is never cached and never touches the task
//! records.

use crate::error::Result;
use crate::kv::KeyValueStore;
use crate::tasks::Priority;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix applied to metadata keys inside a shared key-value store.
pub const METADATA_KEY_PREFIX: &str = "meta_";

const ONBOARDING_KEY: &str = "onboarding_complete";
const PREFERENCES_KEY: &str = "preferences";

/// User preferences shown and edited by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Display name used in greetings.
    pub display_name: Option<String>,
    /// Priority preselected for new tasks.
    pub default_priority: Priority,
    /// Whether completed tasks stay visible in lists.
    pub show_completed: bool,
    /// Whether due-date reminders are enabled.
    pub notifications_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            display_name: None,
            default_priority: Priority::Medium,
            show_completed: true,
            notifications_enabled: false,
        }
    }
}

/// Trait for metadata storage.
#[allow(clippy::missing_errors_doc)]
pub trait MetadataStore {
    /// Read a raw value.
    fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, replacing any previous one.
    fn set_value(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove_value(&self, key: &str) -> Result<()>;

    /// Whether the user finished onboarding. Defaults to false.
    fn onboarding_complete(&self) -> Result<bool> {
        Ok(self.get_value(ONBOARDING_KEY)?.is_some_and(|v| v == "true"))
    }

    /// Record whether onboarding is finished.
    fn set_onboarding_complete(&self, complete: bool) -> Result<()> {
        self.set_value(ONBOARDING_KEY, if complete { "true" } else { "false" })
    }

    /// Stored preferences, or defaults if none were saved.
    ///
    /// Unreadable stored preferences are logged and replaced by defaults.
    fn preferences(&self) -> Result<Preferences> {
        let Some(json) = self.get_value(PREFERENCES_KEY)? else {
            return Ok(Preferences::default());
        };
        match serde_json::from_str(&json) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                tracing::warn!(error = %e, "stored preferences unreadable, using defaults");
                Ok(Preferences::default())
            }
        }
    }

    /// Save preferences.
    fn set_preferences(&self, preferences: &Preferences) -> Result<()> {
        self.set_value(PREFERENCES_KEY, &serde_json::to_string(preferences)?)
    }
}

/// Metadata kept in a `metadata` table of the task database.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db_path: PathBuf,
}

impl SqliteMetadataStore {
    /// Create a metadata store in the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be created.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf() };
        let conn = store.open()?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.db_path)?)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        let value = conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM metadata WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Metadata kept in a [`KeyValueStore`] under [`METADATA_KEY_PREFIX`].
pub struct KeyValueMetadataStore {
    kv: Arc<dyn KeyValueStore + Send + Sync>,
}

impl std::fmt::Debug for KeyValueMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueMetadataStore").finish_non_exhaustive()
    }
}

impl KeyValueMetadataStore {
    /// Create a metadata store over `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore + Send + Sync>) -> Self {
        Self { kv }
    }

    fn storage_key(key: &str) -> String {
        format!("{METADATA_KEY_PREFIX}{key}")
    }
}

impl MetadataStore for KeyValueMetadataStore {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.kv.get_item(&Self::storage_key(key))
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.kv.set_item(&Self::storage_key(key), value)
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        self.kv.remove_item(&Self::storage_key(key))
    }
}
