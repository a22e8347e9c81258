//! Task store trait and `SQLite` implementation.

use crate::error::{Error, Result};
use crate::tasks::models::{iso_now, RawTask, TaskInput};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Trait for task storage operations.
///
/// Both physical backends implement this contract with the same semantics,
/// with one tolerated difference: updating a missing ID is an error for the
/// key-value backend and a silent no-op for the `SQLite` backend.
///
/// Records are returned as [`RawTask`]s; normalizing them is the caller's job.
#[allow(clippy::missing_errors_doc)]
pub trait TaskStore {
    /// Persist a new task, assigning its ID and timestamps.
    fn add_task(&self, input: TaskInput) -> Result<RawTask>;

    /// Overwrite every mutable field of the task with `id`.
    fn update_task(&self, id: i64, input: TaskInput) -> Result<()>;

    /// Physically remove the task with `id`. Missing IDs are not an error.
    ///
    /// Callers should use [`delete_task`](Self::delete_task), which verifies
    /// the removal.
    fn remove_task(&self, id: i64) -> Result<()>;

    /// Get a task by ID.
    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>>;

    /// All tasks, newest first.
    fn get_all_tasks(&self) -> Result<Vec<RawTask>>;

    /// Tasks whose due date starts with `date`, newest first.
    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>>;

    /// Delete a task and confirm it is gone.
    ///
    /// Idempotent: deleting a missing ID succeeds. Fails with
    /// [`Error::Consistency`] if the record can still be read afterwards.
    fn delete_task(&self, id: i64) -> Result<()> {
        self.remove_task(id)?;
        if self.get_task_by_id(id)?.is_some() {
            tracing::warn!(task_id = id, "task still present after delete");
            return Err(Error::Consistency(id));
        }
        Ok(())
    }
}

impl<T: TaskStore + ?Sized> TaskStore for Box<T> {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        (**self).add_task(input)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        (**self).update_task(id, input)
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        (**self).remove_task(id)
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        (**self).get_task_by_id(id)
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        (**self).get_all_tasks()
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        (**self).get_tasks_by_date(date)
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        (**self).delete_task(id)
    }
}

const TASK_COLUMNS: &str = "id, title, description, completed, due_date, priority, \
                            calendar_event_id, created_at, updated_at";

/// SQLite-based task store.
///
/// Each operation opens a new connection to the database file, so every
/// call is a single self-contained statement sequence.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    db_path: PathBuf,
}

impl SqliteTaskStore {
    /// Create a new `SQLite` task store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let store = Self { db_path: db_path.as_ref().to_path_buf() };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                completed INTEGER NOT NULL DEFAULT 0,
                due_date TEXT,
                priority TEXT NOT NULL DEFAULT 'medium',
                calendar_event_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
            ",
        )?;

        Ok(())
    }

    /// Parse a task from a row.
    ///
    /// `completed` is read as whatever `SQLite` holds (normally 0/1) and kept
    /// in that form.
    fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<RawTask> {
        let id: i64 = row.get(0)?;
        let completed: rusqlite::types::Value = row.get(3)?;

        Ok(RawTask {
            id: Value::from(id),
            title: row.get(1)?,
            description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            completed: sql_to_json(completed),
            due_date: row.get(4)?,
            priority: row.get(5)?,
            calendar_event_id: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

fn sql_to_json(value: rusqlite::types::Value) -> Value {
    use rusqlite::types::Value as Sql;
    match value {
        Sql::Integer(i) => Value::from(i),
        Sql::Real(f) => Value::from(f),
        Sql::Text(s) => Value::String(s),
        Sql::Null | Sql::Blob(_) => Value::Null,
    }
}

impl TaskStore for SqliteTaskStore {
    fn add_task(&self, input: TaskInput) -> Result<RawTask> {
        let input = input.validated()?;
        let conn = self.open()?;
        let now = iso_now();

        conn.execute(
            "INSERT INTO tasks (title, description, completed, due_date, priority,
                                calendar_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                input.title,
                input.description,
                i64::from(input.completed),
                input.due_date,
                input.priority.as_str(),
                input.calendar_event_id,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let task = conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            Self::parse_task,
        )?;

        tracing::debug!(task_id = id, "task inserted");
        Ok(task)
    }

    fn update_task(&self, id: i64, input: TaskInput) -> Result<()> {
        let input = input.validated()?;
        let conn = self.open()?;

        let rows = conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, completed = ?3, due_date = ?4,
                              priority = ?5, calendar_event_id = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                input.title,
                input.description,
                i64::from(input.completed),
                input.due_date,
                input.priority.as_str(),
                input.calendar_event_id,
                iso_now(),
                id,
            ],
        )?;

        if rows == 0 {
            tracing::debug!(task_id = id, "update matched no rows");
        }
        Ok(())
    }

    fn remove_task(&self, id: i64) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn get_task_by_id(&self, id: i64) -> Result<Option<RawTask>> {
        let conn = self.open()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    fn get_all_tasks(&self) -> Result<Vec<RawTask>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC, id DESC"
        ))?;
        let tasks = stmt.query_map([], Self::parse_task)?.collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    fn get_tasks_by_date(&self, date: &str) -> Result<Vec<RawTask>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE substr(due_date, 1, length(?1)) = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        // Exact, case-sensitive prefix match; `LIKE` would fold ASCII case.
        let tasks = stmt
            .query_map(params![date], Self::parse_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }
}
