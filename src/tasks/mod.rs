//! Task persistence.
//!
//! This module provides the task record types and the two interchangeable
//! storage backends:
//! - [`SqliteTaskStore`] for native environments with an embedded database
//! - [`KeyValueTaskStore`] for sandboxed environments with only key-value storage
//!
//! Both implement [`TaskStore`], as do [`UnavailableTaskStore`] (a native
//! backend that failed to open) and the [`CachedTaskStore`] decorator.
//! Records leave a store as [`RawTask`]s and become [`Task`]s only through
//! [`normalize`].
//!
//! # Example
//!
//! ```no_run
//! use task_planner::tasks::{normalize, SqliteTaskStore, TaskInput, TaskStore};
//!
//! let store = SqliteTaskStore::new("/tmp/tasks.sqlite3").unwrap();
//! let raw = store.add_task(TaskInput::new("Buy milk")).unwrap();
//! let task = normalize(raw).unwrap();
//! assert!(!task.completed);
//! ```

pub mod id;
pub mod kv_store;
pub mod models;
pub mod store;
pub mod unavailable;

pub use kv_store::KeyValueTaskStore;
pub use models::{
    is_truthy_completed, iso_now, normalize, InvalidPriority, Priority, RawTask, Task, TaskInput,
    TaskPatch,
};
pub use store::{SqliteTaskStore, TaskStore};
pub use unavailable::UnavailableTaskStore;

pub use crate::cache::CachedTaskStore;
