// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `consume` command: run the dispatch daemon in the foreground until
//! signaled.

use std::path::PathBuf;

use fuel_daemon::DaemonError;
use fuel_storage::StateDir;

/// Run the daemon. Returns the process exit code.
pub async fn run(state_dir: StateDir, workdir: PathBuf) -> i32 {
    fuel_daemon::setup_logging();
    match fuel_daemon::run(state_dir, workdir).await {
        Ok(()) => 0,
        Err(error) => {
            report(&error);
            error.exit_code()
        }
    }
}

fn report(error: &DaemonError) {
    match error {
        DaemonError::Server(fuel_daemon::ServerError::PortInUse(port)) => {
            eprintln!("error: port {port} is in use; another consume daemon is already running");
        }
        other => eprintln!("error: {other}"),
    }
}
