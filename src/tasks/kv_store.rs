//! Key-value task store.
//!
//! Used where no embedded database exists. The whole task list is kept as a
//! single JSON array under [`TASKS_KEY`]; every mutation is a synchronous
//! read-modify-write of that array.

use crate::error::{Error, Result};
use crate::kv::KeyValueStore;
use crate::tasks::id::{coerce_id, IdAllocator};
use crate::tasks::models::{iso_now, sort_newest_first, RawTask, TaskInput};
use crate::tasks::store::TaskStore;
use serde_json::Value;
use std::sync::Arc;

/// Storage key holding the serialized task list.
pub const TASKS_KEY: &str = "tasks";

/// Task store backed by a [`KeyValueStore`].
pub struct KeyValueTaskStore {
    kv: Arc<dyn KeyValueStore + Send + Sync>,
    ids: IdAllocator,
}

impl std::fmt::Debug for KeyValueTaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueTaskStore").field("next_id", &self.ids.peek()).finish()
    }
}

impl KeyValueTaskStore {
    /// Open a task store over `kv`, deriving the ID counter from the records
    /// already stored.
    ///
    /// Opening never fails. An unreadable list is logged here and reported
    /// again by the first read, so the caller's load decides what to do.
    /// IDs are recovered even from records that cannot otherwise be parsed.
    pub fn new(kv: Arc<dyn KeyValueStore + Send + Sync>) -> Self {
        let values = load_values(kv.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored task list is unreadable");
            Vec::new()
        });
        let ids = IdAllocator::from_existing(
            values.iter().filter_map(|value| value.get("id")).filter_map(coerce_id),
        );
        tracing::debug!(records = values.len(), next_id = ids.peek(), "key-value task store opened");
        Self { kv, ids }
    }

    fn load(&self) -> Result<Vec<RawTask>> {
        load(self.kv.as_ref())
    }

    fn save(&self, tasks: &[RawTask]) -> Result<()> {
        let json = serde_json::to_string(tasks)?;
        self.kv.set_item(TASKS_KEY, &json)
    }
}

fn load_values(kv: &dyn KeyValueStore) -> Result<Vec<Value>> {
    match kv.get_item(TASKS_KEY)? {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(Vec::new()),
    }
}

/// Parse the stored list element by element; unreadable records are skipped
/// and disappear on the next write.
fn load(kv: &dyn KeyValueStore) -> Result<Vec<RawTask>> {
    let tasks = load_values(kv)?
        .into_iter()
        .filter_map(|value| {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            serde_json::from_value(value)
                .map_err(|e| tracing::warn!(id = %id, error = %e, "skipping unreadable task record"))
                .ok()
        })
        .collect();
    Ok(tasks)
}

fn newest_first(mut tasks: Vec<RawTask>) -> Vec<RawTask> {
    sort_newest_first(&mut tasks, |task| {
        (task.created_at.as_str(), task.numeric_id().unwrap_or(i64::MIN))
    });
    tasks
}

impl TaskStore for KeyValueTaskStore {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        let input = input.validated()?;
        let mut tasks = self.load()?;

        let now = iso_now();
        let task = RawTask::from_input(self.ids.allocate(), &input, &now, &now);
        tasks.push(task.clone());
        self.save(&tasks)?;

        tracing::debug!(task_id = %task.id, "task stored");
        Ok(task)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        let input = input.validated()?;
        let mut tasks = self.load()?;

        let existing = tasks
            .iter_mut()
            .find(|task| task.numeric_id() == Some(id))
            .ok_or(Error::NotFound(id))?;
        *existing = RawTask::from_input(id, &input, &existing.created_at, &iso_now());

        self.save(&tasks)
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        let mut tasks = self.load()?;
        let before = tasks.len();
        tasks.retain(|task| task.numeric_id() != Some(id));
        if tasks.len() != before {
            self.save(&tasks)?;
        }
        Ok(())
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        Ok(self.load()?.into_iter().find(|task| task.numeric_id() == Some(id)))
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        Ok(newest_first(self.load()?))
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        let tasks = self
            .load()?
            .into_iter()
            .filter(|task| task.due_date.as_deref().is_some_and(|due| due.starts_with(date)))
            .collect();
        Ok(newest_first(tasks))
    }
}
