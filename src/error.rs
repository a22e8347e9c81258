//! Error types for `task_planner`.

/// Errors that can occur in the task persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mutation was rejected because its input is invalid (empty title).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced task does not exist.
    #[error("Task not found: {0}")]
    NotFound(i64),

    /// A delete reported success but the record is still present.
    #[error("Task {0} still exists after delete")]
    Consistency(i64),

    /// The native backend was selected but could not be initialized.
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse classification of [`Error`], for callers that only care which
/// failure class they hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty title or other rejected input.
    Validation,
    /// Mutating a record that is not known.
    NotFound,
    /// Post-delete verification failed.
    Consistency,
    /// Native backend failed to initialize.
    BackendUnavailable,
    /// Any other storage failure (I/O, serialization, database).
    Storage,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) | Self::Database(_) => ErrorKind::Storage,
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
