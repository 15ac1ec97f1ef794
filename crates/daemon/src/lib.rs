// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fuel-daemon: the consume daemon, its IPC protocol, and the fan-out
//! server

pub mod daemon;
pub mod protocol;
pub mod server;

use std::path::PathBuf;

use fuel_storage::StateDir;

pub use daemon::{
    Daemon, DaemonError, CLEANUP_INTERVAL, PROGRESS_INTERVAL, SNAPSHOT_INTERVAL, TICK_BUDGET,
};
pub use protocol::{
    decode_command, decode_event, encode_command, encode_event, new_instance_id, Command,
    ProtocolError, WireEvent, PROTOCOL_VERSION,
};
pub use server::{ClientId, Inbound, IpcServer, ServerError, CLIENT_QUEUE_CAPACITY, WRITE_TIMEOUT};

/// Environment variable selecting the daemon log level
/// (`error|warn|info|debug`). `RUST_LOG` wins when both are set.
pub const LOG_LEVEL_ENV: &str = "FUEL_LOG_LEVEL";

/// Install the tracing subscriber for a foreground daemon: stderr, level
/// from `RUST_LOG` or `FUEL_LOG_LEVEL`, default `info`.
pub fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            std::env::var(LOG_LEVEL_ENV).map(|level| EnvFilter::new(level.to_lowercase()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the consume daemon until signaled. The single entry point the CLI
/// uses.
pub async fn run(state_dir: StateDir, workdir: PathBuf) -> Result<(), DaemonError> {
    let daemon = Daemon::start(state_dir, workdir).await?;
    daemon.run().await
}
