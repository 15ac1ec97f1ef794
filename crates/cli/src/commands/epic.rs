// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic subcommands.

use anyhow::Result;
use clap::{Args, Subcommand};

use fuel_core::epic::EpicId;
use fuel_core::task::TaskId;
use fuel_core::IdKind;
use fuel_storage::Store;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct EpicArgs {
    #[command(subcommand)]
    pub command: EpicCommand,
}

#[derive(Subcommand)]
pub enum EpicCommand {
    /// Create an epic
    Add {
        title: String,
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// List epics with their derived status
    List,
    /// Show one epic and its linked tasks
    Show { id: String },
    /// Link a task to an epic
    Link { task: String, epic: String },
    /// Mark an epic reviewed
    Reviewed { id: String },
}

pub fn handle(store: &Store, args: EpicArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        EpicCommand::Add { title, description } => {
            let epic = store.create_epic(title, description)?;
            let state = store.load()?;
            let status = state.epic_status(&epic);
            output::print_epic(format, &epic, status)
        }
        EpicCommand::List => {
            let state = store.load()?;
            for epic in state.epics.values() {
                output::print_epic(format, epic, state.epic_status(epic))?;
            }
            Ok(())
        }
        EpicCommand::Show { id } => {
            let full = store.resolve_short_id(IdKind::Epic, &id)?;
            let epic = store.epic(&EpicId::new(full))?;
            let state = store.load()?;
            output::print_epic(format, &epic, state.epic_status(&epic))?;

            let linked: Vec<_> = state
                .tasks
                .values()
                .filter(|t| t.epic_id.as_ref() == Some(&epic.id))
                .collect();
            if format == OutputFormat::Text && !linked.is_empty() {
                output::print_tasks(format, &linked)?;
            }
            Ok(())
        }
        EpicCommand::Link { task, epic } => {
            let task = TaskId::new(store.resolve_short_id(IdKind::Task, &task)?);
            let epic = EpicId::new(store.resolve_short_id(IdKind::Epic, &epic)?);
            store.link_task_to_epic(&task, &epic)?;
            let task = store.task(&task)?;
            output::print_task(format, &task)
        }
        EpicCommand::Reviewed { id } => {
            let full = store.resolve_short_id(IdKind::Epic, &id)?;
            let epic = store.mark_epic_reviewed(&EpicId::new(full))?;
            let state = store.load()?;
            output::print_epic(format, &epic, state.epic_status(&epic))
        }
    }
}
