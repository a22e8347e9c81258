//! Command-line front end for the task planner.
//!
//! A thin stand-in for the presentation layer: every command goes through
//! the [`TaskReconciler`](crate::reconciler::TaskReconciler) and prints JSON.

mod run;

#[cfg(test)]
mod tests;

pub use run::{execute, run, CliOutput};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable holding the log filter for the binary.
pub const LOG_ENV_VAR: &str = "TASK_PLANNER_LOG";

/// Personal task planner.
///
/// Tasks are stored in `SQLite` on native platforms, or in a JSON key-value
/// file when `TASK_PLANNER_BACKEND=key_value` is set.
#[derive(Parser, Debug)]
#[command(name = "task-planner")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks, newest first.
    List {
        /// Only tasks whose due date starts with this prefix (e.g. 2024-05)
        #[arg(long)]
        date: Option<String>,
    },

    /// Add a task.
    Add {
        /// Title (required, must not be blank)
        title: String,

        /// Longer description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        /// Priority: low, medium, high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Linked calendar event ID
        #[arg(long)]
        calendar_event: Option<String>,
    },

    /// Update fields of a task. Unspecified fields are left unchanged.
    Update {
        /// Task ID
        id: i64,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New due date
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// New priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Mark completed (true) or open (false)
        #[arg(long)]
        completed: Option<bool>,
    },

    /// Flip a task between open and completed.
    Toggle {
        /// Task ID
        id: i64,
    },

    /// Delete a task. Deleting an unknown ID succeeds.
    Delete {
        /// Task ID
        id: i64,
    },

    /// Show which storage backend is active.
    Backend,
}
