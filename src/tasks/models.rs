//! Task model types and normalization.

use crate::error::{Error, Result};
use crate::tasks::id::coerce_id;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority (default).
    #[default]
    Medium,
    /// High priority.
    High,
}

impl Priority {
    /// Parse a priority from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid priority.
    pub fn parse(s: &str) -> std::result::Result<Self, InvalidPriority> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(InvalidPriority(s.to_string())),
        }
    }

    /// Parse a priority, falling back to [`Priority::Medium`] when the value
    /// is absent or unrecognized.
    #[must_use]
    pub fn parse_lenient(s: Option<&str>) -> Self {
        s.and_then(|s| Self::parse(s).ok()).unwrap_or_default()
    }

    /// Get the string representation of the priority.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid priority string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPriority(pub String);

impl std::fmt::Display for InvalidPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid priority: '{}' (must be one of: low, medium, high)", self.0)
    }
}

impl std::error::Error for InvalidPriority {}

/// Current time as an ISO 8601 timestamp with millisecond precision.
#[must_use]
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn lenient_priority<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Priority, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(Priority::parse_lenient(value.as_ref().and_then(Value::as_str)))
}

fn string_or_default<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// A normalized task, as held by the reconciler and shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Backend-assigned identifier.
    pub id: i64,
    /// Short title, never empty.
    pub title: String,
    /// Longer description, possibly empty.
    pub description: String,
    /// Whether the task is done.
    pub completed: bool,
    /// Due date, conventionally `YYYY-MM-DD`.
    pub due_date: Option<String>,
    /// Priority level.
    pub priority: Priority,
    /// Opaque identifier of a linked calendar event.
    pub calendar_event_id: Option<String>,
    /// ISO 8601 timestamp when the task was created.
    pub created_at: String,
    /// ISO 8601 timestamp when the task was last updated.
    pub updated_at: String,
}

/// The full set of mutable task fields, as written to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Title (required).
    pub title: String,
    /// Description.
    #[serde(default, deserialize_with = "string_or_default")]
    pub description: String,
    /// Completion flag.
    #[serde(default)]
    pub completed: bool,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Priority; absent or unrecognized values become medium.
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Priority,
    /// Linked calendar event.
    #[serde(default)]
    pub calendar_event_id: Option<String>,
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl TaskInput {
    /// Create an input with the given title and defaults for everything else.
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the due date.
    #[must_use]
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the calendar event ID.
    #[must_use]
    pub fn with_calendar_event_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_event_id = Some(id.into());
        self
    }

    /// Set the completion flag.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Trim every string field and reject an empty title.
    ///
    /// Empty due dates and calendar event IDs become `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the title is empty after trimming.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        Ok(Self {
            title,
            description: self.description.trim().to_string(),
            completed: self.completed,
            due_date: trimmed_or_none(self.due_date),
            priority: self.priority,
            calendar_event_id: trimmed_or_none(self.calendar_event_id),
        })
    }
}

/// A partial update. `None` leaves the field unchanged.
///
/// `due_date` and `calendar_event_id` are doubly optional so that a caller
/// can clear them: `Some(None)` sets the field to null.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New completion flag.
    pub completed: Option<bool>,
    /// New due date (or `Some(None)` to clear it).
    pub due_date: Option<Option<String>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New calendar event ID (or `Some(None)` to clear it).
    pub calendar_event_id: Option<Option<String>>,
}

impl TaskPatch {
    /// A patch that only sets the completion flag.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self { completed: Some(completed), ..Self::default() }
    }

    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.calendar_event_id.is_none()
    }

    /// Merge this patch onto `task`, producing the full field set to persist.
    #[must_use]
    pub fn apply_to(&self, task: &Task) -> TaskInput {
        TaskInput {
            title: self.title.clone().unwrap_or_else(|| task.title.clone()),
            description: self.description.clone().unwrap_or_else(|| task.description.clone()),
            completed: self.completed.unwrap_or(task.completed),
            due_date: self.due_date.clone().unwrap_or_else(|| task.due_date.clone()),
            priority: self.priority.unwrap_or(task.priority),
            calendar_event_id: self
                .calendar_event_id
                .clone()
                .unwrap_or_else(|| task.calendar_event_id.clone()),
        }
    }
}

/// A task record as it crosses the backend boundary.
///
/// `id` and `completed` keep whatever representation the backend produced
/// (integers, `"0"`/`"1"`, `"true"`, booleans); [`normalize`] turns the record
/// into a [`Task`]. Every field is always serialized, nulls included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    /// Identifier in backend representation.
    #[serde(default)]
    pub id: Value,
    /// Title.
    #[serde(default, deserialize_with = "string_or_default")]
    pub title: String,
    /// Description.
    #[serde(default, deserialize_with = "string_or_default")]
    pub description: String,
    /// Completion flag in backend representation.
    #[serde(default)]
    pub completed: Value,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<String>,
    /// Priority name as stored.
    #[serde(default)]
    pub priority: Option<String>,
    /// Linked calendar event.
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, deserialize_with = "string_or_default")]
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default, deserialize_with = "string_or_default")]
    pub updated_at: String,
}

impl RawTask {
    /// Build a record from validated input.
    #[must_use]
    pub fn from_input(id: i64, input: &TaskInput, created_at: &str, updated_at: &str) -> Self {
        Self {
            id: Value::from(id),
            title: input.title.clone(),
            description: input.description.clone(),
            completed: Value::Bool(input.completed),
            due_date: input.due_date.clone(),
            priority: Some(input.priority.as_str().to_string()),
            calendar_event_id: input.calendar_event_id.clone(),
            created_at: created_at.to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    /// The record's ID, if it coerces to an integer.
    #[must_use]
    pub fn numeric_id(&self) -> Option<i64> {
        coerce_id(&self.id)
    }
}

/// Whether a boundary `completed` value means "done".
///
/// Truthy values are exactly: `true`, the number `1`, the string `"1"`, and
/// the string `"true"` in any letter case. Everything else is false.
#[must_use]
pub fn is_truthy_completed(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| (f - 1.0).abs() < f64::EPSILON),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Convert a boundary record into a [`Task`].
///
/// Returns `None` when the ID cannot be coerced to a number; such records
/// are dropped, not repaired.
#[must_use]
pub fn normalize(raw: RawTask) -> Option<Task> {
    let id = raw.numeric_id()?;
    Some(Task {
        id,
        completed: is_truthy_completed(&raw.completed),
        priority: Priority::parse_lenient(raw.priority.as_deref()),
        calendar_event_id: raw.calendar_event_id.filter(|s| !s.is_empty()),
        title: raw.title,
        description: raw.description,
        due_date: raw.due_date,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

/// Order tasks newest first, breaking `created_at` ties by descending ID.
pub fn sort_newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (&str, i64)) {
    items.sort_by(|a, b| {
        let (a_created, a_id) = key(a);
        let (b_created, b_id) = key(b);
        b_created.cmp(a_created).then_with(|| b_id.cmp(&a_id))
    });
}
