//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit and integration tests.

#![allow(dead_code)]

use crate::cache::Clock;
use crate::error::{Error, Result};
use crate::tasks::{RawTask, TaskInput, TaskStore};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start_millis`.
    #[must_use]
    pub const fn new(start_millis: i64) -> Self {
        Self { now: AtomicI64::new(start_millis) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the clock to an absolute reading.
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Counts list queries that reach the wrapped store.
#[derive(Debug)]
pub struct CountingTaskStore<S> {
    inner: S,
    list_reads: AtomicUsize,
}

impl<S> CountingTaskStore<S> {
    /// Wrap `inner`.
    pub const fn new(inner: S) -> Self {
        Self { inner, list_reads: AtomicUsize::new(0) }
    }

    /// Number of `get_all_tasks` and `get_tasks_by_date` calls so far.
    pub fn list_reads(&self) -> usize {
        self.list_reads.load(Ordering::SeqCst)
    }
}

impl<S: TaskStore> TaskStore for CountingTaskStore<S> {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        self.inner.add_task(input)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        self.inner.update_task(id, input)
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        self.inner.remove_task(id)
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        self.inner.get_task_by_id(id)
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all_tasks()
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_tasks_by_date(date)
    }
}

/// Switches controlling which operations a [`FlakyTaskStore`] fails.
#[derive(Debug, Default)]
pub struct FailureSwitches {
    /// Fail `get_all_tasks`, `get_tasks_by_date` and `get_task_by_id`.
    pub reads: AtomicBool,
    /// Fail `add_task` and `update_task`.
    pub writes: AtomicBool,
    /// Fail `remove_task`.
    pub deletes: AtomicBool,
    /// Make `remove_task` report success without removing anything.
    pub ignore_deletes: AtomicBool,
}

impl FailureSwitches {
    /// Turn read failures on or off.
    pub fn fail_reads(&self, on: bool) {
        self.reads.store(on, Ordering::SeqCst);
    }

    /// Turn write failures on or off.
    pub fn fail_writes(&self, on: bool) {
        self.writes.store(on, Ordering::SeqCst);
    }

    /// Turn delete failures on or off.
    pub fn fail_deletes(&self, on: bool) {
        self.deletes.store(on, Ordering::SeqCst);
    }

    /// Turn silently-ignored deletes on or off.
    pub fn ignore_deletes(&self, on: bool) {
        self.ignore_deletes.store(on, Ordering::SeqCst);
    }
}

fn injected(operation: &str) -> Error {
    Error::Io(std::io::Error::other(format!("injected {operation} failure")))
}

/// A store that fails on demand.
#[derive(Debug)]
pub struct FlakyTaskStore<S> {
    inner: S,
    switches: Arc<FailureSwitches>,
}

impl<S> FlakyTaskStore<S> {
    /// Wrap `inner`; nothing fails until a switch is flipped.
    pub fn new(inner: S) -> Self {
        Self { inner, switches: Arc::new(FailureSwitches::default()) }
    }

    /// A handle to the failure switches that stays valid after the store is
    /// moved into a reconciler.
    pub fn switches(&self) -> Arc<FailureSwitches> {
        Arc::clone(&self.switches)
    }
}

impl<S: TaskStore> TaskStore for FlakyTaskStore<S> {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        if self.switches.writes.load(Ordering::SeqCst) {
            return Err(injected("add"));
        }
        self.inner.add_task(input)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        if self.switches.writes.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }
        self.inner.update_task(id, input)
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        if self.switches.deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        if self.switches.ignore_deletes.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.remove_task(id)
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        if self.switches.reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.get_task_by_id(id)
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        if self.switches.reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.get_all_tasks()
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        if self.switches.reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        self.inner.get_tasks_by_date(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use crate::tasks::KeyValueTaskStore;

    fn flaky() -> FlakyTaskStore<KeyValueTaskStore> {
        FlakyTaskStore::new(KeyValueTaskStore::new(Arc::new(MemoryKeyValueStore::new())))
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(Duration::from_millis(5));
        assert_eq!(clock.now_millis(), 15);
        clock.set(3);
        assert_eq!(clock.now_millis(), 3);
    }

    #[test]
    fn test_flaky_store_switches() {
        let store = flaky();
        let switches = store.switches();

        store.add_task(TaskInput::new("ok")).unwrap();
        switches.fail_writes(true);
        assert!(store.add_task(TaskInput::new("no")).is_err());
        switches.fail_writes(false);

        switches.fail_reads(true);
        assert!(store.get_all_tasks().is_err());
        switches.fail_reads(false);
        assert_eq!(store.get_all_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_ignored_delete_is_consistency_error() {
        let store = flaky();
        store.add_task(TaskInput::new("sticky")).unwrap();
        store.switches().ignore_deletes(true);

        assert!(matches!(store.delete_task(1), Err(Error::Consistency(1))));
    }
}
