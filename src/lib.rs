//! # `task_planner`
//!
//! Task persistence and cache coherency for a personal task planner.
//!
//! The presentation layer talks only to a [`TaskReconciler`], usually built
//! by [`Planner::open`]. Beneath it sit a TTL query cache and one of two
//! storage backends, chosen once per process.

pub mod backend;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod kv;
pub mod metadata;
pub mod paths;
pub mod reconciler;
pub mod tasks;
pub mod testing;

pub use backend::{BackendKind, Planner};
pub use error::{Error, ErrorKind, Result};
pub use reconciler::TaskReconciler;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
