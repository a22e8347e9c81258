//! Backend selection and process wiring.
//!
//! The storage backend is chosen once per process and never revisited.
//! [`Planner::open`] turns that decision into a ready [`TaskReconciler`]
//! with the matching cache and metadata substrates.

use crate::cache::{
    CacheBackend, CachedTaskStore, KeyValueCacheBackend, SqliteCacheBackend, TaskQueryCache,
    TtlCache,
};
use crate::config::{BackendPreference, PlannerConfig};
use crate::error::Result;
use crate::kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use crate::metadata::{KeyValueMetadataStore, MetadataStore, SqliteMetadataStore};
use crate::paths::DataPaths;
use crate::reconciler::TaskReconciler;
use crate::tasks::{KeyValueTaskStore, SqliteTaskStore, TaskStore, UnavailableTaskStore};
use std::sync::{Arc, OnceLock};

/// The runtime environment the process finds itself in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// A full OS process that can host an embedded database.
    Native,
    /// A sandbox with only key-value storage.
    Sandboxed,
}

impl Environment {
    /// Detect the current environment from the compilation target.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Self::Sandboxed
        } else {
            Self::Native
        }
    }
}

/// The physical backend in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded `SQLite` database.
    Sqlite,
    /// Key-value store serialized as JSON.
    KeyValue,
}

impl BackendKind {
    /// Whether this is the native persistent-storage backend.
    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(self, Self::Sqlite)
    }

    /// Short name for display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::KeyValue => "key_value",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a preference and environment to a backend.
///
/// A sandbox cannot host the database, so it always gets the key-value
/// backend whatever was asked for.
#[must_use]
pub const fn select_backend(preference: BackendPreference, environment: Environment) -> BackendKind {
    match (environment, preference) {
        (Environment::Sandboxed, _) | (Environment::Native, BackendPreference::KeyValue) => {
            BackendKind::KeyValue
        }
        (Environment::Native, BackendPreference::Auto | BackendPreference::Native) => {
            BackendKind::Sqlite
        }
    }
}

static SELECTED: OnceLock<BackendKind> = OnceLock::new();

/// The process-wide backend decision.
#[derive(Debug, Clone, Copy)]
pub struct BackendSelector;

impl BackendSelector {
    /// Decide the backend for this process, or return the earlier decision.
    ///
    /// Only the first call's arguments matter.
    pub fn frozen(preference: BackendPreference, environment: Environment) -> BackendKind {
        *SELECTED.get_or_init(|| {
            let kind = select_backend(preference, environment);
            tracing::info!(backend = %kind, ?preference, ?environment, "storage backend selected");
            kind
        })
    }

    /// The decision, if one was made.
    #[must_use]
    pub fn get() -> Option<BackendKind> {
        SELECTED.get().copied()
    }
}

/// Open the task store for `kind`.
///
/// A `SQLite` store that fails to open yields an [`UnavailableTaskStore`];
/// the key-value backend is never substituted.
///
/// # Errors
///
/// Returns an error if the key-value file cannot be opened. A stored task
/// list that cannot be parsed is not an error here.
pub fn open_task_store(
    kind: BackendKind,
    paths: &DataPaths,
) -> Result<Box<dyn TaskStore + Send + Sync>> {
    match kind {
        BackendKind::Sqlite => match SqliteTaskStore::new(paths.database()) {
            Ok(store) => Ok(Box::new(store)),
            Err(e) => {
                tracing::warn!(path = %paths.database().display(), error = %e, "native backend failed to initialize");
                Ok(Box::new(UnavailableTaskStore::new(e.to_string())))
            }
        },
        BackendKind::KeyValue => {
            let kv = open_key_value(paths)?;
            Ok(Box::new(KeyValueTaskStore::new(kv)))
        }
    }
}

fn open_key_value(paths: &DataPaths) -> Result<Arc<dyn KeyValueStore + Send + Sync>> {
    Ok(Arc::new(FileKeyValueStore::open(paths.key_value_file())?))
}

/// A storage stack ready for the presentation layer.
pub struct Planner {
    backend: BackendKind,
    reconciler: TaskReconciler,
    metadata: Option<Box<dyn MetadataStore + Send + Sync>>,
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("backend", &self.backend)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl Planner {
    /// Open the planner using the process-wide backend decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value file cannot be opened. A failing
    /// `SQLite` database does not fail here; its operations report
    /// [`Error::BackendUnavailable`](crate::error::Error::BackendUnavailable)
    /// instead.
    pub fn open(config: &PlannerConfig) -> Result<Self> {
        let kind = BackendSelector::frozen(config.effective_backend(), Environment::detect());
        Self::open_with(kind, config)
    }

    /// Open the planner with an explicit backend, bypassing the process-wide
    /// selector.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with(kind: BackendKind, config: &PlannerConfig) -> Result<Self> {
        let paths = config.data_paths();

        let (tasks, cache_backend, metadata): (
            Box<dyn TaskStore + Send + Sync>,
            Box<dyn CacheBackend + Send + Sync>,
            Option<Box<dyn MetadataStore + Send + Sync>>,
        ) = match kind {
            BackendKind::Sqlite => {
                let tasks = open_task_store(kind, &paths)?;
                let db = paths.database();
                match (SqliteCacheBackend::new(&db), SqliteMetadataStore::new(&db)) {
                    (Ok(cache), Ok(meta)) => (tasks, Box::new(cache), Some(Box::new(meta))),
                    (cache, meta) => {
                        if let Some(e) = cache.err().or(meta.err()) {
                            tracing::warn!(error = %e, "database unavailable for cache and metadata");
                        }
                        // The task store reports the failure on every call.
                        let scratch = Arc::new(MemoryKeyValueStore::new());
                        (tasks, Box::new(KeyValueCacheBackend::new(scratch)), None)
                    }
                }
            }
            BackendKind::KeyValue => {
                // One store instance per file: each instance rewrites the whole file.
                let kv = open_key_value(&paths)?;
                (
                    Box::new(KeyValueTaskStore::new(Arc::clone(&kv))),
                    Box::new(KeyValueCacheBackend::new(Arc::clone(&kv))),
                    Some(Box::new(KeyValueMetadataStore::new(kv))),
                )
            }
        };

        let cache = TtlCache::from_boxed(cache_backend)
            .with_default_ttl(config.cache_ttl())
            .with_max_entries(config.cache_max_entries);
        let store = CachedTaskStore::new(tasks, TaskQueryCache::new(cache));

        let mut reconciler = TaskReconciler::new(store);
        reconciler.load_tasks();
        tracing::debug!(backend = %kind, tasks = reconciler.tasks().len(), "planner opened");

        Ok(Self { backend: kind, reconciler, metadata })
    }

    /// The backend in use.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// The task reconciler.
    #[must_use]
    pub const fn tasks(&self) -> &TaskReconciler {
        &self.reconciler
    }

    /// The task reconciler, for mutations.
    pub fn tasks_mut(&mut self) -> &mut TaskReconciler {
        &mut self.reconciler
    }

    /// The metadata store, if its substrate could be opened.
    #[must_use]
    pub fn metadata(&self) -> Option<&(dyn MetadataStore + Send + Sync)> {
        self.metadata.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tasks::TaskInput;
    use serial_test::serial;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> PlannerConfig {
        PlannerConfig { data_dir: Some(dir.path().to_path_buf()), ..PlannerConfig::default() }
    }

    #[test]
    fn test_select_backend_matrix() {
        use BackendPreference::{Auto, KeyValue, Native};
        assert_eq!(select_backend(Auto, Environment::Native), BackendKind::Sqlite);
        assert_eq!(select_backend(Native, Environment::Native), BackendKind::Sqlite);
        assert_eq!(select_backend(KeyValue, Environment::Native), BackendKind::KeyValue);
        assert_eq!(select_backend(Auto, Environment::Sandboxed), BackendKind::KeyValue);
        assert_eq!(select_backend(Native, Environment::Sandboxed), BackendKind::KeyValue);
    }

    #[test]
    fn test_detect_native_off_wasm() {
        assert_eq!(Environment::detect(), Environment::Native);
    }

    #[test]
    #[serial]
    fn test_selector_is_frozen() {
        let first = BackendSelector::frozen(BackendPreference::Auto, Environment::Native);
        let second = BackendSelector::frozen(BackendPreference::KeyValue, Environment::Sandboxed);
        assert_eq!(first, second);
        assert_eq!(BackendSelector::get(), Some(first));
    }

    #[test]
    fn test_failed_sqlite_is_unavailable_not_fallback() {
        let dir = TempDir::new().unwrap();
        // A directory where the database file should be makes the open fail.
        let paths = DataPaths::new(dir.path());
        std::fs::create_dir_all(paths.database()).unwrap();

        let store = open_task_store(BackendKind::Sqlite, &paths).unwrap();
        let err = store.get_all_tasks().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(!paths.key_value_file().exists());
    }

    #[test]
    fn test_planner_sqlite_roundtrip() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let mut planner = Planner::open_with(BackendKind::Sqlite, &config).unwrap();
        assert!(planner.backend().is_native());
        planner.tasks_mut().add_task(TaskInput::new("Buy milk")).unwrap();
        planner.metadata().unwrap().set_onboarding_complete(true).unwrap();
        drop(planner);

        let planner = Planner::open_with(BackendKind::Sqlite, &config).unwrap();
        assert_eq!(planner.tasks().tasks().len(), 1);
        assert!(planner.metadata().unwrap().onboarding_complete().unwrap());
    }

    #[test]
    fn test_planner_key_value_shares_one_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let mut planner = Planner::open_with(BackendKind::KeyValue, &config).unwrap();
        planner.tasks_mut().add_task(TaskInput::new("a")).unwrap();
        planner.tasks_mut().load_tasks();
        planner.metadata().unwrap().set_onboarding_complete(true).unwrap();

        let kv = FileKeyValueStore::open(dir.path().join("storage.json")).unwrap();
        let keys = kv.keys().unwrap();
        assert!(keys.contains(&"tasks".to_string()));
        assert!(keys.contains(&"meta_onboarding_complete".to_string()));
        assert!(keys.iter().any(|k| k.starts_with("cache_tasks:")));
        assert!(!dir.path().join("tasks.sqlite3").exists());
    }

    #[test]
    fn test_planner_with_broken_database_reports_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tasks.sqlite3")).unwrap();

        let mut planner = Planner::open_with(BackendKind::Sqlite, &config_in(&dir)).unwrap();
        assert!(planner.tasks().tasks().is_empty());
        assert!(planner.metadata().is_none());
        let err = planner.tasks_mut().add_task(TaskInput::new("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_planner_opens_over_corrupt_task_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let config = config_in(&dir);

        std::fs::write(&path, r#"{"tasks":"[{\"id\":1,\"title\":5}]"}"#).unwrap();
        let mut planner = Planner::open_with(BackendKind::KeyValue, &config).unwrap();
        assert!(planner.tasks().tasks().is_empty());
        assert_eq!(planner.tasks_mut().add_task(TaskInput::new("fresh")).unwrap(), Some(2));
        drop(planner);

        std::fs::write(&path, r#"{"tasks":"not json"}"#).unwrap();
        let mut planner = Planner::open_with(BackendKind::KeyValue, &config).unwrap();
        assert!(planner.tasks().tasks().is_empty());
        let err = planner.tasks_mut().add_task(TaskInput::new("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
