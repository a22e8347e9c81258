//! Path utilities for determining data storage locations.
//!
//! All planner data lives in a single directory: the platform data directory
//! joined with `task-planner` (for example `~/.local/share/task-planner` on
//! Linux), or `./.task-planner` when no data directory is known.

use std::path::{Path, PathBuf};

/// The directory name for task-planner data.
const DATA_DIR_NAME: &str = "task-planner";

/// Fallback directory used when the platform has no data directory.
const FALLBACK_DATA_DIR: &str = ".task-planner";

/// The relational database filename (native backend).
pub const DATABASE_FILENAME: &str = "tasks.sqlite3";

/// The key-value storage filename (sandboxed backend).
pub const KV_FILENAME: &str = "storage.json";

/// The configuration filename.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Get the default data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map_or_else(|| PathBuf::from(FALLBACK_DATA_DIR), |base| base.join(DATA_DIR_NAME))
}

/// Resolved file locations for one planner instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Use `root` as the data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use the default data directory.
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(data_dir())
    }

    /// The data directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `SQLite` database file.
    #[must_use]
    pub fn database(&self) -> PathBuf {
        self.root.join(DATABASE_FILENAME)
    }

    /// Path of the JSON key-value file.
    #[must_use]
    pub fn key_value_file(&self) -> PathBuf {
        self.root.join(KV_FILENAME)
    }

    /// Path of the YAML config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_ends_with_name() {
        let dir = data_dir();
        let name = dir.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(name == DATA_DIR_NAME || name == FALLBACK_DATA_DIR);
    }

    #[test]
    fn test_data_paths_files() {
        let paths = DataPaths::new("/tmp/planner");
        assert_eq!(paths.root(), Path::new("/tmp/planner"));
        assert_eq!(paths.database(), PathBuf::from("/tmp/planner/tasks.sqlite3"));
        assert_eq!(paths.key_value_file(), PathBuf::from("/tmp/planner/storage.json"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/planner/config.yaml"));
    }
}
