//! Configuration management for task-planner.
//!
//! Settings live in `config.yaml` inside the data directory. A missing file
//! means "use defaults"; a file that exists but does not parse is an error.

use crate::error::Result;
use crate::paths::DataPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the configured backend preference.
pub const BACKEND_ENV_VAR: &str = "TASK_PLANNER_BACKEND";

/// Default cache time-to-live (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default informational maximum number of cache entries.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

/// Which storage backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Decide from the runtime environment.
    #[default]
    Auto,
    /// Embedded relational engine.
    Native,
    /// Synchronous key-value store serialized as JSON.
    KeyValue,
}

impl BackendPreference {
    /// Parse a preference name, as used by [`BACKEND_ENV_VAR`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "native" | "sqlite" => Some(Self::Native),
            "key_value" | "key-value" | "kv" => Some(Self::KeyValue),
            _ => None,
        }
    }
}

/// Planner configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Backend preference.
    #[serde(default)]
    pub backend: BackendPreference,

    /// Cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cache entries kept after a write sweep.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Override for the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

const fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            data_dir: None,
        }
    }
}

impl PlannerConfig {
    /// Load config from the given data directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(paths: &DataPaths) -> Result<Option<Self>> {
        let config_path = paths.config_file();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config from the given data directory, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(paths: &DataPaths) -> Result<Self> {
        Ok(Self::load_from(paths)?.unwrap_or_default())
    }

    /// Save config into the given data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, paths: &DataPaths) -> Result<()> {
        std::fs::create_dir_all(paths.root())?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// The data directory this config points at.
    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        self.data_dir.clone().map_or_else(DataPaths::default_location, DataPaths::new)
    }

    /// The backend preference after applying [`BACKEND_ENV_VAR`].
    ///
    /// The environment only decides when the file says `auto`; an explicit
    /// file choice stands. An unrecognized environment value is ignored.
    #[must_use]
    pub fn effective_backend(&self) -> BackendPreference {
        if self.backend != BackendPreference::Auto {
            return self.backend;
        }
        std::env::var(BACKEND_ENV_VAR)
            .ok()
            .and_then(|value| BackendPreference::parse(&value))
            .unwrap_or(self.backend)
    }

    /// Cache TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_secs)
    }
}
