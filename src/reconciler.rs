//! The in-memory task list the presentation layer reads from.
//!
//! [`TaskReconciler`] owns the canonical, normalized, newest-first list of
//! tasks and is the only way the presentation layer reaches storage.
//!
//! Failure policy:
//! - [`load_tasks`](TaskReconciler::load_tasks) never fails; a backend error
//!   leaves an empty list and is only logged.
//! - Every mutation propagates backend errors to the caller.
//! - [`delete_task`](TaskReconciler::delete_task) is optimistic and restores
//!   the previous list when the backend delete fails.

use crate::error::{Error, Result};
use crate::tasks::models::sort_newest_first;
use crate::tasks::{normalize, RawTask, Task, TaskInput, TaskPatch, TaskStore};

/// A callback invoked with the current list after each state change.
pub type Listener = Box<dyn Fn(&[Task]) + Send + Sync>;

/// Holds the authoritative in-memory task list and applies mutations to it
/// and to the backing store.
pub struct TaskReconciler {
    store: Box<dyn TaskStore + Send + Sync>,
    tasks: Vec<Task>,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for TaskReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskReconciler")
            .field("tasks", &self.tasks)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

fn normalize_logged(raw: RawTask) -> Option<Task> {
    let id = raw.id.clone();
    let task = normalize(raw);
    if task.is_none() {
        tracing::warn!(id = %id, "dropping task record without a numeric id");
    }
    task
}

fn sort_tasks(tasks: &mut [Task]) {
    sort_newest_first(tasks, |task| (task.created_at.as_str(), task.id));
}

impl TaskReconciler {
    /// Create a reconciler over `store` with an empty list.
    ///
    /// Call [`load_tasks`](Self::load_tasks) to populate it.
    pub fn new(store: impl TaskStore + Send + Sync + 'static) -> Self {
        Self { store: Box::new(store), tasks: Vec::new(), listeners: Vec::new() }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }

    /// The current list, newest first.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look up a task in the in-memory list.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Tasks in the in-memory list whose due date starts with `prefix`.
    #[must_use]
    pub fn tasks_for_date(&self, prefix: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.due_date.as_deref().is_some_and(|due| due.starts_with(prefix)))
            .collect()
    }

    /// Register a callback run after every change to the list.
    pub fn subscribe(&mut self, listener: impl Fn(&[Task]) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener(&self.tasks);
        }
    }

    /// Replace the list with the store's current contents.
    ///
    /// Records whose ID is not numeric are dropped. If the store fails, the
    /// list becomes empty and the error is logged.
    pub fn load_tasks(&mut self) {
        match self.store.get_all_tasks() {
            Ok(raw) => {
                let mut tasks: Vec<Task> = raw.into_iter().filter_map(normalize_logged).collect();
                sort_tasks(&mut tasks);
                tracing::debug!(count = tasks.len(), "tasks loaded");
                self.tasks = tasks;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load tasks");
                self.tasks.clear();
            }
        }
        self.notify();
    }

    /// Persist a new task and insert it into the list.
    ///
    /// Returns the new ID, or `None` if the stored record could not be
    /// normalized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty title, or the store's error.
    pub fn add_task(&mut self, input: TaskInput) -> Result<Option<i64>> {
        let input = input.validated()?;
        let raw = self.store.add_task(input)?;
        let Some(task) = normalize_logged(raw) else {
            return Ok(None);
        };

        let id = task.id;
        self.tasks.retain(|existing| existing.id != id);
        self.tasks.push(task);
        sort_tasks(&mut self.tasks);
        self.notify();
        Ok(Some(id))
    }

    /// Apply `patch` to the task with `id`.
    ///
    /// The patch is merged onto the in-memory copy, the merged fields are
    /// written, and the persisted record is read back into the list. The list
    /// is unchanged if the write fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not in the list,
    /// [`Error::Validation`] if the merged title is empty, or the store's
    /// error.
    pub fn update_task(&mut self, id: i64, patch: &TaskPatch) -> Result<()> {
        let current = self.get(id).ok_or(Error::NotFound(id))?;
        let merged = patch.apply_to(current).validated()?;

        self.store.update_task(id, merged)?;

        match self.store.get_task_by_id(id)?.and_then(normalize_logged) {
            Some(updated) => {
                if let Some(slot) = self.tasks.iter_mut().find(|task| task.id == id) {
                    *slot = updated;
                }
                sort_tasks(&mut self.tasks);
                self.notify();
            }
            None => tracing::debug!(task_id = id, "updated task not found on re-read"),
        }
        Ok(())
    }

    /// Remove the task with `id`, optimistically.
    ///
    /// The task leaves the list before the store is called. If the store
    /// fails, the previous list is restored. Deleting an unknown ID succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Consistency`] if the record survived the delete, or
    /// the store's error.
    pub fn delete_task(&mut self, id: i64) -> Result<()> {
        let snapshot = self.tasks.clone();
        self.tasks.retain(|task| task.id != id);
        self.notify();

        if let Err(e) = self.store.delete_task(id) {
            tracing::warn!(task_id = id, error = %e, "delete failed, restoring task list");
            self.tasks = snapshot;
            self.notify();
            return Err(e);
        }
        Ok(())
    }

    /// Flip the completion flag of the task with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not in the list, or the store's
    /// error.
    pub fn toggle_task(&mut self, id: i64) -> Result<()> {
        let completed = self.get(id).ok_or(Error::NotFound(id))?.completed;
        self.update_task(id, &TaskPatch::completed(!completed))
    }
}
