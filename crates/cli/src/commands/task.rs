// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task subcommands: thin mutators over the store.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;

use fuel_core::epic::EpicId;
use fuel_core::task::{Complexity, Priority, Size, TaskId, TaskType};
use fuel_core::IdKind;
use fuel_storage::{NewTask, Store};

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// feature, bug, chore, refactor, docs, or other
    #[arg(long = "type", value_name = "TYPE")]
    pub task_type: Option<String>,

    /// 0 (most urgent) through 4
    #[arg(long, short = 'p')]
    pub priority: Option<u8>,

    /// simple, moderate, or complex
    #[arg(long, short = 'c')]
    pub complexity: Option<String>,

    /// s, m, or l
    #[arg(long)]
    pub size: Option<String>,

    #[arg(long = "label", short = 'l', value_name = "LABEL")]
    pub labels: Vec<String>,

    /// Epic to link the task to (short id accepted)
    #[arg(long)]
    pub epic: Option<String>,

    /// Tasks that must close first (short ids accepted)
    #[arg(long = "blocked-by", value_name = "TASK")]
    pub blocked_by: Vec<String>,
}

pub fn add(store: &Store, args: AddArgs, format: OutputFormat) -> Result<()> {
    let task_type: TaskType = match args.task_type.as_deref() {
        Some(raw) => raw.parse()?,
        None => TaskType::default(),
    };
    let priority = match args.priority {
        Some(value) => Priority::new(value)?,
        None => Priority::default(),
    };
    let complexity: Complexity = match args.complexity.as_deref() {
        Some(raw) => raw.parse()?,
        None => Complexity::default(),
    };
    let size: Option<Size> = match args.size.as_deref() {
        Some(raw) => Some(raw.parse()?),
        None => None,
    };

    let epic_id = match args.epic.as_deref() {
        Some(partial) => Some(EpicId::new(store.resolve_short_id(IdKind::Epic, partial)?)),
        None => None,
    };
    let mut blocked_by = BTreeSet::new();
    for partial in &args.blocked_by {
        blocked_by.insert(TaskId::new(store.resolve_short_id(IdKind::Task, partial)?));
    }

    let task = store.create_task(NewTask {
        title: args.title,
        description: args.description,
        task_type,
        priority,
        labels: args.labels.into_iter().collect(),
        complexity,
        size,
        blocked_by,
        epic_id,
    })?;
    output::print_task(format, &task)
}

#[derive(Args)]
pub struct ListArgs {
    /// Board column: ready, blocked, in-progress, review, human, done, all
    #[arg(long, short = 's', default_value = "all")]
    pub status: String,
}

pub fn list(store: &Store, args: ListArgs, format: OutputFormat) -> Result<()> {
    let state = store.load()?;
    let tasks = match args.status.as_str() {
        "ready" => state.ready(),
        "blocked" => state.blocked(),
        "in-progress" | "in_progress" => state.in_progress(),
        "review" => state.review(),
        "human" => state.needs_human(),
        "done" | "closed" => state.done(),
        "all" => {
            let mut all: Vec<_> = state.tasks.values().collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            all
        }
        other => anyhow::bail!(
            "unknown status filter '{other}' (expected ready, blocked, in-progress, review, human, done, or all)"
        ),
    };
    output::print_tasks(format, &tasks)
}

pub fn show(store: &Store, id: &str, format: OutputFormat) -> Result<()> {
    let full = store.resolve_short_id(IdKind::Task, id)?;
    let task = store.task(&TaskId::new(full))?;
    output::print_task(format, &task)
}

pub fn done(
    store: &Store,
    id: &str,
    commit: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let full = TaskId::new(store.resolve_short_id(IdKind::Task, id)?);
    if let Some(commit) = commit {
        store.set_commit_hash(&full, commit)?;
    }
    let task = store.close_task(&full)?;
    output::print_task(format, &task)
}

pub fn defer(store: &Store, id: &str, format: OutputFormat) -> Result<()> {
    let full = store.resolve_short_id(IdKind::Task, id)?;
    let item = store.defer_task(&TaskId::new(full))?;
    output::print_backlog_item(format, &item)
}

pub fn block(store: &Store, task: &str, blocker: &str, format: OutputFormat) -> Result<()> {
    let task = TaskId::new(store.resolve_short_id(IdKind::Task, task)?);
    let blocker = TaskId::new(store.resolve_short_id(IdKind::Task, blocker)?);
    store.add_dependency(&task, &blocker)?;
    let task = store.task(&task)?;
    output::print_task(format, &task)
}

pub fn unblock(store: &Store, task: &str, blocker: &str, format: OutputFormat) -> Result<()> {
    let task = TaskId::new(store.resolve_short_id(IdKind::Task, task)?);
    let blocker = TaskId::new(store.resolve_short_id(IdKind::Task, blocker)?);
    store.remove_dependency(&task, &blocker)?;
    let task = store.task(&task)?;
    output::print_task(format, &task)
}

pub fn runs(store: &Store, id: &str, format: OutputFormat) -> Result<()> {
    let full = store.resolve_short_id(IdKind::Task, id)?;
    let ledger = fuel_storage::RunLedger::open(&store.state_dir().ledger_path())?;
    let task_id = TaskId::new(full);
    for run in ledger.runs_for(&task_id) {
        output::print_run(format, run)?;
    }
    Ok(())
}
