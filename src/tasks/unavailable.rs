//! Stand-in store for a native backend that failed to initialize.

use crate::error::{Error, Result};
use crate::tasks::models::{RawTask, TaskInput};
use crate::tasks::store::TaskStore;

/// A [`TaskStore`] whose every operation fails with
/// [`Error::BackendUnavailable`].
///
/// Installed when the native backend was selected but could not be opened,
/// so callers see the failure on each call instead of a silent switch to the
/// key-value backend.
#[derive(Debug, Clone)]
pub struct UnavailableTaskStore {
    reason: String,
}

impl UnavailableTaskStore {
    /// Create a store that reports `reason` on every call.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Why the backend is unavailable.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn unavailable<T>(&self) -> Result<T> {
        Err(Error::BackendUnavailable(self.reason.clone()))
    }
}

impl TaskStore for UnavailableTaskStore {
    fn add_task(&self, _input: TaskInput) -> Result<RawTask> {
        self.unavailable()
    }

    fn update_task(&self, _id: i64, _input: TaskInput) -> Result<()> {
        self.unavailable()
    }

    fn remove_task(&self, _id: i64) -> Result<()> {
        self.unavailable()
    }

    fn get_task_by_id(&self, _id: i64) -> Result<Option<RawTask>> {
        self.unavailable()
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        self.unavailable()
    }

    fn get_tasks_by_date(&self, _date: &str) -> Result<Vec<RawTask>> {
        self.unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_every_operation_is_unavailable() {
        let store = UnavailableTaskStore::new("disk on fire");
        assert_eq!(store.reason(), "disk on fire");

        let kinds = [
            store.add_task(TaskInput::new("x")).map(|_| ()).unwrap_err().kind(),
            store.update_task(1, TaskInput::new("x")).unwrap_err().kind(),
            store.delete_task(1).unwrap_err().kind(),
            store.get_task_by_id(1).map(|_| ()).unwrap_err().kind(),
            store.get_all_tasks().map(|_| ()).unwrap_err().kind(),
            store.get_tasks_by_date("2024").map(|_| ()).unwrap_err().kind(),
        ];
        assert!(kinds.iter().all(|k| *k == ErrorKind::BackendUnavailable));
    }

    #[test]
    fn test_error_message_carries_reason() {
        let err = UnavailableTaskStore::new("locked").get_all_tasks().unwrap_err();
        assert_eq!(err.to_string(), "Storage backend unavailable: locked");
    }
}
