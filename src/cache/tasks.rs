//! Task-query caching.
//!
//! [`TaskQueryCache`] memoizes the two list queries of a task store. Every
//! method is best-effort: failures are logged and then behave like a miss
//! (for reads) or a no-op (for writes), never an error.

use crate::cache::TtlCache;
use crate::error::Result;
use crate::tasks::{RawTask, TaskInput, TaskStore};

/// Namespace shared by every task-query cache key.
pub const TASKS_CACHE_PREFIX: &str = "tasks:";

const ALL_TASKS_KEY: &str = "tasks:all";

fn date_key(date: &str) -> String {
    format!("{TASKS_CACHE_PREFIX}date:{date}")
}

/// Read-through cache for task list queries.
#[derive(Debug)]
pub struct TaskQueryCache {
    cache: TtlCache,
}

impl TaskQueryCache {
    /// Wrap a TTL cache.
    #[must_use]
    pub const fn new(cache: TtlCache) -> Self {
        Self { cache }
    }

    /// The underlying TTL cache.
    #[must_use]
    pub const fn inner(&self) -> &TtlCache {
        &self.cache
    }

    fn get_list(&self, key: &str) -> Option<Vec<RawTask>> {
        let value = match self.cache.get(key) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(tasks) => Some(tasks),
            Err(e) => {
                tracing::warn!(key, error = %e, "cached task list unreadable");
                None
            }
        }
    }

    fn put_list(&self, key: &str, tasks: &[RawTask]) {
        let result = serde_json::to_value(tasks)
            .map_err(crate::error::Error::from)
            .and_then(|value| self.cache.set(key, value, None));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }

    /// Cached result of the "all tasks" query.
    pub fn get_cached_tasks(&self) -> Option<Vec<RawTask>> {
        self.get_list(ALL_TASKS_KEY)
    }

    /// Remember the result of the "all tasks" query.
    pub fn cache_tasks(&self, tasks: &[RawTask]) {
        self.put_list(ALL_TASKS_KEY, tasks);
    }

    /// Cached result of the "tasks by date" query for `date`.
    pub fn get_cached_tasks_by_date(&self, date: &str) -> Option<Vec<RawTask>> {
        self.get_list(&date_key(date))
    }

    /// Remember the result of the "tasks by date" query for `date`.
    pub fn cache_tasks_by_date(&self, date: &str, tasks: &[RawTask]) {
        self.put_list(&date_key(date), tasks);
    }

    /// Drop every task-query entry, whatever record or query it was for.
    pub fn invalidate_tasks_cache(&self) {
        match self.cache.remove_prefix(TASKS_CACHE_PREFIX) {
            Ok(removed) => tracing::debug!(removed, "task cache invalidated"),
            Err(e) => tracing::warn!(error = %e, "task cache invalidation failed"),
        }
    }
}

/// A [`TaskStore`] decorator that serves list queries through a
/// [`TaskQueryCache`] and invalidates it after every successful mutation.
#[derive(Debug)]
pub struct CachedTaskStore<S> {
    inner: S,
    cache: TaskQueryCache,
}

impl<S: TaskStore> CachedTaskStore<S> {
    /// Wrap `inner` with `cache`.
    pub const fn new(inner: S, cache: TaskQueryCache) -> Self {
        Self { inner, cache }
    }

    /// The wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The query cache.
    pub const fn cache(&self) -> &TaskQueryCache {
        &self.cache
    }
}

impl<S: TaskStore> TaskStore for CachedTaskStore<S> {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        let task = self.inner.add_task(input)?;
        self.cache.invalidate_tasks_cache();
        Ok(task)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        self.inner.update_task(id, input)?;
        self.cache.invalidate_tasks_cache();
        Ok(())
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        self.inner.remove_task(id)?;
        self.cache.invalidate_tasks_cache();
        Ok(())
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        self.inner.get_task_by_id(id)
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        if let Some(tasks) = self.cache.get_cached_tasks() {
            return Ok(tasks);
        }
        let tasks = self.inner.get_all_tasks()?;
        self.cache.cache_tasks(&tasks);
        Ok(tasks)
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        if let Some(tasks) = self.cache.get_cached_tasks_by_date(date) {
            return Ok(tasks);
        }
        let tasks = self.inner.get_tasks_by_date(date)?;
        self.cache.cache_tasks_by_date(date, &tasks);
        Ok(tasks)
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        self.inner.delete_task(id)?;
        self.cache.invalidate_tasks_cache();
        Ok(())
    }
}
