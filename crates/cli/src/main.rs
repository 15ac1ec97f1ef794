// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fuel - local task orchestrator for AI coding agents

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{backlog, consume, epic, task};
use fuel_storage::{StateDir, Store};
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "fuel",
    version,
    about = "Fuel - a task board with an agent dispatch daemon"
)]
struct Cli {
    /// State directory (defaults to ./.fuel, or $FUEL_STATE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task
    Add(task::AddArgs),
    /// List tasks by board column
    List(task::ListArgs),
    /// Show one task (short id accepted)
    Show { id: String },
    /// Close a task
    Done {
        id: String,
        /// Commit hash that completed the work
        #[arg(long)]
        commit: Option<String>,
    },
    /// Delete a task and queue it as a backlog item
    Defer { id: String },
    /// Block a task on another
    Block { task: String, blocker: String },
    /// Remove a dependency edge
    Unblock { task: String, blocker: String },
    /// Show run history for a task
    Runs { id: String },
    /// Epic management
    Epic(epic::EpicArgs),
    /// Backlog management
    Backlog(backlog::BacklogArgs),
    /// Run the dispatch daemon until signaled
    Consume,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("error: cannot determine working directory: {e}");
            std::process::exit(1);
        }
    };
    let state_dir = match cli.state_dir {
        Some(dir) => StateDir::new(dir),
        None => StateDir::resolve(&cwd),
    };

    let code = match cli.command {
        Commands::Consume => consume::run(state_dir, cwd).await,
        command => match dispatch(command, state_dir, format) {
            Ok(()) => 0,
            Err(error) => {
                output::emit_error(format, &error);
                1
            }
        },
    };
    std::process::exit(code);
}

fn dispatch(command: Commands, state_dir: StateDir, format: OutputFormat) -> Result<()> {
    let store = Store::open(state_dir);
    match command {
        Commands::Add(args) => task::add(&store, args, format),
        Commands::List(args) => task::list(&store, args, format),
        Commands::Show { id } => task::show(&store, &id, format),
        Commands::Done { id, commit } => task::done(&store, &id, commit.as_deref(), format),
        Commands::Defer { id } => task::defer(&store, &id, format),
        Commands::Block { task, blocker } => {
            commands::task::block(&store, &task, &blocker, format)
        }
        Commands::Unblock { task, blocker } => {
            commands::task::unblock(&store, &task, &blocker, format)
        }
        Commands::Runs { id } => task::runs(&store, &id, format),
        Commands::Epic(args) => epic::handle(&store, args, format),
        Commands::Backlog(args) => backlog::handle(&store, args, format),
        Commands::Consume => unreachable!("handled by the caller"),
    }
}
