// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backlog subcommands.

use anyhow::Result;
use clap::{Args, Subcommand};

use fuel_core::BacklogId;
use fuel_core::IdKind;
use fuel_storage::Store;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct BacklogArgs {
    #[command(subcommand)]
    pub command: BacklogCommand,
}

#[derive(Subcommand)]
pub enum BacklogCommand {
    /// Queue an idea
    Add {
        title: String,
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// List backlog items
    List,
    /// Turn a backlog item into an open task
    Promote { id: String },
    /// Drop a backlog item
    Drop { id: String },
}

pub fn handle(store: &Store, args: BacklogArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        BacklogCommand::Add { title, description } => {
            let item = store.create_backlog_item(title, description)?;
            output::print_backlog_item(format, &item)
        }
        BacklogCommand::List => {
            let state = store.load()?;
            for item in state.backlog.values() {
                output::print_backlog_item(format, item)?;
            }
            Ok(())
        }
        BacklogCommand::Promote { id } => {
            let full = store.resolve_short_id(IdKind::Backlog, &id)?;
            let task = store.promote_backlog_item(&BacklogId::new(full))?;
            output::print_task(format, &task)
        }
        BacklogCommand::Drop { id } => {
            let full = store.resolve_short_id(IdKind::Backlog, &id)?;
            store.delete_backlog_item(&BacklogId::new(full.clone()))?;
            match format {
                OutputFormat::Text => println!("dropped {full}"),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "dropped": full }))
                }
            }
            Ok(())
        }
    }
}
