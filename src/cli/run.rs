//! Command execution for the CLI.

use crate::backend::Planner;
use crate::cli::{Cli, Command};
use crate::config::PlannerConfig;
use crate::error::Error;
use crate::paths::DataPaths;
use crate::tasks::{Priority, TaskInput, TaskPatch};
use serde::Serialize;
use std::process::ExitCode;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Load configuration, open the planner, and run the command.
pub fn run(cli: Cli) -> CliOutput {
    let paths = cli.data_dir.map_or_else(DataPaths::default_location, DataPaths::new);
    let mut config = match PlannerConfig::load_or_default(&paths) {
        Ok(config) => config,
        Err(e) => return error_output(format!("Error loading config: {e}")),
    };
    if config.data_dir.is_none() {
        config.data_dir = Some(paths.root().to_path_buf());
    }

    let mut planner = match Planner::open(&config) {
        Ok(planner) => planner,
        Err(e) => return error_output(format!("Error opening task storage: {e}")),
    };
    execute(cli.command, &mut planner)
}

/// Run a command against an open planner.
pub fn execute(command: Command, planner: &mut Planner) -> CliOutput {
    match command {
        Command::List { date } => run_list(planner, date.as_deref()),
        Command::Add { title, description, due, priority, calendar_event } => {
            run_add(planner, title, description, due, &priority, calendar_event)
        }
        Command::Update { id, title, description, due, clear_due, priority, completed } => {
            let priority = match priority.as_deref().map(Priority::parse).transpose() {
                Ok(priority) => priority,
                Err(e) => return error_output(e.to_string()),
            };
            let due_date = if clear_due { Some(None) } else { due.map(Some) };
            let patch = TaskPatch {
                title,
                description,
                completed,
                due_date,
                priority,
                calendar_event_id: None,
            };
            run_update(planner, id, &patch)
        }
        Command::Toggle { id } => {
            let result = planner.tasks_mut().toggle_task(id);
            task_output(planner, id, result)
        }
        Command::Delete { id } => match planner.tasks_mut().delete_task(id) {
            Ok(()) => json_output(&serde_json::json!({ "deleted": id })),
            Err(e) => task_error(&e),
        },
        Command::Backend => json_output(&BackendInfo {
            backend: planner.backend().as_str(),
            native: planner.backend().is_native(),
            tasks: planner.tasks().tasks().len(),
        }),
    }
}

fn run_list(planner: &Planner, date: Option<&str>) -> CliOutput {
    let reconciler = planner.tasks();
    match date {
        Some(prefix) => json_output(&reconciler.tasks_for_date(prefix)),
        None => json_output(&reconciler.tasks()),
    }
}

fn run_add(
    planner: &mut Planner,
    title: String,
    description: String,
    due: Option<String>,
    priority: &str,
    calendar_event: Option<String>,
) -> CliOutput {
    let priority = match Priority::parse(priority) {
        Ok(p) => p,
        Err(e) => return error_output(e.to_string()),
    };
    let input = TaskInput {
        title,
        description,
        completed: false,
        due_date: due,
        priority,
        calendar_event_id: calendar_event,
    };

    match planner.tasks_mut().add_task(input) {
        Ok(Some(id)) => task_output(planner, id, Ok(())),
        Ok(None) => error_output("Task was stored but could not be read back".to_string()),
        Err(e) => task_error(&e),
    }
}

fn run_update(planner: &mut Planner, id: i64, patch: &TaskPatch) -> CliOutput {
    if patch.is_empty() {
        return error_output("No fields specified for update".to_string());
    }
    let result = planner.tasks_mut().update_task(id, patch);
    task_output(planner, id, result)
}

fn task_output(planner: &Planner, id: i64, result: crate::error::Result<()>) -> CliOutput {
    if let Err(e) = result {
        return task_error(&e);
    }
    match planner.tasks().get(id) {
        Some(task) => json_output(task),
        None => error_output(format!("Task not found: {id}")),
    }
}

fn task_error(e: &Error) -> CliOutput {
    error_output(format!("Error: {e}"))
}

fn json_output<T: Serialize + ?Sized>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(e.to_string()),
    }
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}

#[derive(Debug, Serialize)]
struct BackendInfo {
    backend: &'static str,
    native: bool,
    tasks: usize,
}
