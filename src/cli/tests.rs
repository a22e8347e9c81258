//! Tests for the CLI module.

use super::*;
use crate::backend::{BackendKind, Planner};
use crate::config::PlannerConfig;
use clap::Parser;
use std::process::ExitCode;
use tempfile::TempDir;

fn create_test_planner() -> (TempDir, Planner) {
    let dir = TempDir::new().unwrap();
    let config =
        PlannerConfig { data_dir: Some(dir.path().to_path_buf()), ..PlannerConfig::default() };
    let planner = Planner::open_with(BackendKind::Sqlite, &config).unwrap();
    (dir, planner)
}

fn parse(args: &[&str]) -> Command {
    let mut argv = vec!["task-planner"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

fn stdout_json(output: &CliOutput) -> serde_json::Value {
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "stderr: {:?}", output.stderr);
    serde_json::from_str(&output.stdout[0]).unwrap()
}

#[test]
fn test_add_then_list() {
    let (_dir, mut planner) = create_test_planner();

    let added = stdout_json(&execute(parse(&["add", "Buy milk", "--due", "2024-05-01"]), &mut planner));
    assert_eq!(added["id"], 1);
    assert_eq!(added["completed"], false);
    assert_eq!(added["priority"], "medium");
    assert_eq!(added["dueDate"], "2024-05-01");

    execute(parse(&["add", "Walk dog"]), &mut planner);
    let all = stdout_json(&execute(parse(&["list"]), &mut planner));
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["title"], "Walk dog");

    let dated = stdout_json(&execute(parse(&["list", "--date", "2024-05"]), &mut planner));
    assert_eq!(dated.as_array().unwrap().len(), 1);
}

#[test]
fn test_blank_title_fails() {
    let (_dir, mut planner) = create_test_planner();
    let output = execute(parse(&["add", "   "]), &mut planner);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("Validation"));
}

#[test]
fn test_invalid_priority_fails() {
    let (_dir, mut planner) = create_test_planner();
    let output = execute(parse(&["add", "x", "--priority", "urgent"]), &mut planner);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(planner.tasks().tasks().is_empty());
}

#[test]
fn test_toggle_update_delete() {
    let (_dir, mut planner) = create_test_planner();
    execute(parse(&["add", "Buy milk", "--due", "2024-05-01"]), &mut planner);

    let toggled = stdout_json(&execute(parse(&["toggle", "1"]), &mut planner));
    assert_eq!(toggled["completed"], true);

    let updated = stdout_json(&execute(
        parse(&["update", "1", "--title", "Buy oat milk", "--priority", "high", "--clear-due"]),
        &mut planner,
    ));
    assert_eq!(updated["title"], "Buy oat milk");
    assert_eq!(updated["priority"], "high");
    assert!(updated["dueDate"].is_null());

    let deleted = stdout_json(&execute(parse(&["delete", "1"]), &mut planner));
    assert_eq!(deleted["deleted"], 1);
    // Deleting again is not an error.
    stdout_json(&execute(parse(&["delete", "1"]), &mut planner));
}

#[test]
fn test_update_without_fields_fails() {
    let (_dir, mut planner) = create_test_planner();
    execute(parse(&["add", "x"]), &mut planner);
    let output = execute(parse(&["update", "1"]), &mut planner);
    assert_eq!(output.exit_code, ExitCode::from(1));
}

#[test]
fn test_toggle_unknown_is_not_found() {
    let (_dir, mut planner) = create_test_planner();
    let output = execute(parse(&["toggle", "9"]), &mut planner);
    assert_eq!(output.exit_code, ExitCode::from(1));
    assert!(output.stderr[0].contains("Task not found: 9"));
}

#[test]
fn test_backend_command() {
    let (_dir, mut planner) = create_test_planner();
    let info = stdout_json(&execute(parse(&["backend"]), &mut planner));
    assert_eq!(info["backend"], "sqlite");
    assert_eq!(info["native"], true);
}

#[test]
fn test_due_conflicts_with_clear_due() {
    let result =
        Cli::try_parse_from(["task-planner", "update", "1", "--due", "2024-01-01", "--clear-due"]);
    assert!(result.is_err());
}
