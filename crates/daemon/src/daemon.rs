// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The consume daemon: a single cooperative loop over IPC, process
//! completions, and scheduling ticks.
//!
//! Startup: bind the loopback listener (a busy port means another daemon
//! owns this board), sweep orphaned runs, broadcast an initial snapshot.
//! The loop then selects over client accepts, inbound commands, reaped
//! agent processes, a dispatch tick, a snapshot beacon, an orphan sweep,
//! and termination signals. Errors inside one iteration are logged and
//! never escape the loop.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use fuel_adapters::{pid_alive, ProcessManager};
use fuel_core::task::TaskId;
use fuel_core::{Config, ConfigError, Event, IdKind};
use fuel_engine::Core;
use fuel_storage::{LedgerError, RunLedger, StateDir, Store, StoreError};

use crate::protocol::{self, Command};
use crate::server::{ClientId, Inbound, IpcServer, ServerError};

/// Loop responsiveness budget; also the dispatch cadence.
pub const TICK_BUDGET: Duration = Duration::from_millis(100);

/// Snapshot beacon interval (fires even when nothing changed).
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

/// Orphaned-run sweep interval.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum spacing of `task_progress` events per task.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Fatal daemon errors, mapped onto the CLI exit codes.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("state directory {path} is not writable: {source}")]
    StateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    /// Process exit code for this failure: 1 startup/config, 2 port in
    /// use, 3 state dir unwritable.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Server(ServerError::PortInUse(_)) => 2,
            DaemonError::StateDir { .. } => 3,
            _ => 1,
        }
    }
}

/// The assembled daemon: the core aggregate plus the IPC server.
pub struct Daemon {
    core: Core,
    server: IpcServer,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    events: mpsc::UnboundedReceiver<Event>,
    paused: bool,
}

impl Daemon {
    /// Build everything and perform startup duties: ensure the state dir,
    /// load config, bind the port, open the store and ledger, sweep
    /// orphans.
    pub async fn start(state_dir: StateDir, workdir: PathBuf) -> Result<Self, DaemonError> {
        state_dir.ensure().map_err(|source| DaemonError::StateDir {
            path: state_dir.root().display().to_string(),
            source,
        })?;

        let config = Config::load_or_default(&state_dir.config_path())?;
        let instance_id = protocol::new_instance_id();
        let (server, inbound) = IpcServer::start(config.consume_port(), instance_id.clone()).await?;

        let store = Store::open(state_dir.clone());
        let mut ledger = RunLedger::open(&state_dir.ledger_path())?;
        let cleaned = ledger.cleanup_orphaned_runs(pid_alive)?;
        if cleaned > 0 {
            info!(cleaned, "failed orphaned runs from a previous daemon");
        }

        let processes = ProcessManager::new(state_dir.processes_dir());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let core = Core::new(
            config,
            store,
            ledger,
            processes,
            workdir,
            instance_id,
            events_tx,
        );

        Ok(Self {
            core,
            server,
            inbound,
            events: events_rx,
            paused: false,
        })
    }

    /// The port the daemon is serving on.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Run until signaled or told to shut down over IPC.
    pub async fn run(self) -> Result<(), DaemonError> {
        let Daemon {
            mut core,
            mut server,
            mut inbound,
            mut events,
            mut paused,
        } = self;

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let mut dispatch_tick = tokio::time::interval(TICK_BUDGET);
        let mut snapshot_tick = tokio::time::interval(SNAPSHOT_INTERVAL);
        let mut cleanup_tick = tokio::time::interval(CLEANUP_INTERVAL);

        broadcast_snapshot(&core, &mut server);
        info!(port = server.port(), "consume daemon ready");

        loop {
            tokio::select! {
                accepted = server.accept() => match accepted {
                    Ok(stream) => {
                        match core.build_snapshot(Instant::now()) {
                            Ok(snapshot) => {
                                if let Err(e) = server.admit(stream, snapshot) {
                                    warn!(error = %e, "failed to admit client");
                                }
                            }
                            Err(e) => error!(error = %e, "snapshot for new client failed"),
                        }
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },

                Some(message) = inbound.recv() => {
                    if handle_inbound(&mut core, &mut server, &mut paused, message) {
                        info!("shutdown requested over IPC");
                        break;
                    }
                },

                done = core.processes.next_completion() => {
                    if let Err(e) = core.handle_completion(done, Instant::now()) {
                        error!(error = %e, "completion handling failed");
                    }
                },

                Some(event) = events.recv() => {
                    if let Err(e) = server.broadcast(&event) {
                        error!(error = %e, "broadcast failed");
                    }
                },

                _ = dispatch_tick.tick() => {
                    let now = Instant::now();
                    if !paused {
                        let mut spawned = 0;
                        match core.dispatch_ready(now) {
                            Ok(n) => spawned += n,
                            Err(e) => error!(error = %e, "dispatch failed"),
                        }
                        match core.dispatch_reviews(now) {
                            Ok(n) => spawned += n,
                            Err(e) => error!(error = %e, "review dispatch failed"),
                        }
                        if spawned > 0 {
                            // Through the event channel, so it lands after
                            // the task_spawned events of this tick
                            match core.build_snapshot(now) {
                                Ok(snapshot) => {
                                    core.emit(Event::BoardStateChanged { snapshot });
                                }
                                Err(e) => error!(error = %e, "snapshot build failed"),
                            }
                        }
                    }
                    for (task_id, tail) in core.processes.progress_updates(now, PROGRESS_INTERVAL) {
                        core.emit(Event::TaskProgress {
                            task_id,
                            stdout_tail: Some(tail),
                        });
                    }
                },

                _ = snapshot_tick.tick() => {
                    // Flush queued task events first so the beacon cannot
                    // overtake them in any client's stream
                    drain_events(&mut events, &mut server);
                    broadcast_snapshot(&core, &mut server);
                },

                _ = cleanup_tick.tick() => {
                    match core.ledger.cleanup_orphaned_runs(pid_alive) {
                        Ok(0) => {}
                        Ok(cleaned) => info!(cleaned, "failed orphaned runs"),
                        Err(e) => error!(error = %e, "orphan sweep failed"),
                    }
                },

                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    break;
                },

                _ = sigint.recv() => {
                    info!("received SIGINT, shutting down");
                    break;
                },
            }
        }

        shutdown(&mut core, &mut server, &mut events).await;
        Ok(())
    }
}

/// React to one inbound client message. Returns true when the daemon
/// should shut down.
fn handle_inbound(
    core: &mut Core,
    server: &mut IpcServer,
    paused: &mut bool,
    message: Inbound,
) -> bool {
    match message {
        Inbound::Command { client, command } => handle_command(core, server, paused, client, command),
        Inbound::Malformed { client, error } => {
            warn!(client, error, "dropping client after malformed command");
            server.disconnect(client);
            false
        }
        Inbound::Disconnected { client } => {
            server.disconnect(client);
            false
        }
    }
}

fn handle_command(
    core: &mut Core,
    server: &mut IpcServer,
    paused: &mut bool,
    client: ClientId,
    command: Command,
) -> bool {
    let request_id = command.request_id().to_string();
    match command {
        Command::Pause { .. } => {
            *paused = true;
            info!("dispatch paused");
            respond_ok(server, client, &request_id, Some("paused"));
            false
        }
        Command::Resume { .. } => {
            *paused = false;
            info!("dispatch resumed");
            respond_ok(server, client, &request_id, Some("resumed"));
            false
        }
        Command::Kill { task_id, .. } => {
            let outcome = core
                .store
                .resolve_short_id(IdKind::Task, &task_id)
                .map_err(|e| e.to_string())
                .and_then(|full| {
                    core.processes
                        .kill(&TaskId::new(full))
                        .map_err(|e| e.to_string())
                });
            match outcome {
                Ok(()) => respond_ok(server, client, &request_id, Some("killing")),
                Err(message) => respond_err(server, client, &request_id, &message),
            }
            false
        }
        Command::Status { .. } => {
            match core.build_snapshot(Instant::now()) {
                Ok(snapshot) => {
                    let _ = server.send_to(
                        client,
                        &Event::Response {
                            request_id,
                            ok: true,
                            message: None,
                            snapshot: Some(snapshot),
                        },
                    );
                }
                Err(e) => respond_err(server, client, &request_id, &e.to_string()),
            }
            false
        }
        Command::Shutdown { .. } => {
            respond_ok(server, client, &request_id, Some("shutting down"));
            true
        }
    }
}

fn respond_ok(server: &mut IpcServer, client: ClientId, request_id: &str, message: Option<&str>) {
    let _ = server.send_to(
        client,
        &Event::Response {
            request_id: request_id.to_string(),
            ok: true,
            message: message.map(String::from),
            snapshot: None,
        },
    );
}

fn respond_err(server: &mut IpcServer, client: ClientId, request_id: &str, message: &str) {
    let _ = server.send_to(
        client,
        &Event::Response {
            request_id: request_id.to_string(),
            ok: false,
            message: Some(message.to_string()),
            snapshot: None,
        },
    );
}

fn broadcast_snapshot(core: &Core, server: &mut IpcServer) {
    match core.build_snapshot(Instant::now()) {
        Ok(snapshot) => {
            if let Err(e) = server.broadcast(&Event::Snapshot { snapshot }) {
                error!(error = %e, "snapshot broadcast failed");
            }
        }
        Err(e) => error!(error = %e, "snapshot build failed"),
    }
}

/// Forward every queued engine event to the clients.
fn drain_events(events: &mut mpsc::UnboundedReceiver<Event>, server: &mut IpcServer) {
    while let Ok(event) = events.try_recv() {
        if let Err(e) = server.broadcast(&event) {
            error!(error = %e, "broadcast failed");
        }
    }
}

/// Graceful shutdown: kill and reap every agent, finalize their runs,
/// flush the last events, and close client connections.
async fn shutdown(
    core: &mut Core,
    server: &mut IpcServer,
    events: &mut mpsc::UnboundedReceiver<Event>,
) {
    let survivors = core.processes.shutdown().await;
    let now = Instant::now();
    for done in survivors {
        if let Err(e) = core.handle_completion(done, now) {
            warn!(error = %e, "finalizing run during shutdown failed");
        }
    }
    drain_events(events, server);
    server.stop();
    info!("daemon stopped");
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
