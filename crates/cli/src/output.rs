// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting: human text lines or JSON documents under `--json`.

use fuel_core::epic::{Epic, EpicStatus};
use fuel_core::run::Run;
use fuel_core::task::Task;
use fuel_core::BacklogItem;

/// Output mode selected by the global `--json` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a top-level error: a human line on stderr, or an `{"error": ...}`
/// document on stdout under `--json`.
pub fn emit_error(format: OutputFormat, error: &anyhow::Error) {
    match format {
        OutputFormat::Text => eprintln!("error: {error:#}"),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "error": format!("{error:#}") })
            );
        }
    }
}

/// One-line task summary: id, status, priority, title, decorations.
pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{}  {:<11}  p{}  {}",
        task.id, task.status, task.priority, task.title
    );
    if !task.labels.is_empty() {
        let labels: Vec<&str> = task.labels.iter().map(String::as_str).collect();
        line.push_str(&format!("  [{}]", labels.join(", ")));
    }
    if !task.blocked_by.is_empty() {
        let blockers: Vec<&str> = task.blocked_by.iter().map(|b| b.as_str()).collect();
        line.push_str(&format!("  blocked-by: {}", blockers.join(", ")));
    }
    line
}

pub fn print_task(format: OutputFormat, task: &Task) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!("{}", task_line(task)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(task)?),
    }
    Ok(())
}

pub fn print_tasks(format: OutputFormat, tasks: &[&Task]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for task in tasks {
                println!("{}", task_line(task));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(tasks)?);
        }
    }
    Ok(())
}

pub fn print_epic(format: OutputFormat, epic: &Epic, status: EpicStatus) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!("{}  {:<14}  {}", epic.id, status, epic.title),
        OutputFormat::Json => {
            let mut value = serde_json::to_value(epic)?;
            if let Some(map) = value.as_object_mut() {
                map.insert("status".to_string(), serde_json::to_value(status)?);
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

pub fn print_backlog_item(format: OutputFormat, item: &BacklogItem) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => println!("{}  {}", item.id, item.title),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
    }
    Ok(())
}

pub fn print_run(format: OutputFormat, run: &Run) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            let exit = run
                .exit_code
                .map_or_else(|| "-".to_string(), |code| code.to_string());
            println!(
                "{}  {:<9}  agent={}  exit={}  started={}",
                run.id,
                run.status,
                run.agent,
                exit,
                run.started_at.to_rfc3339()
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(run)?),
    }
    Ok(())
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
