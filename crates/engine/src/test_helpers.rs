// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use std::path::PathBuf;

use tokio::sync::mpsc;

use fuel_adapters::ProcessManager;
use fuel_core::id::SequentialTail;
use fuel_core::{Config, Event};
use fuel_storage::{RunLedger, StateDir, Store};

use crate::core::Core;

/// A `Core` wired to a temp state dir with deterministic ids.
pub fn test_core(config: Config) -> (tempfile::TempDir, Core, mpsc::UnboundedReceiver<Event>) {
    let tmp = tempfile::tempdir().unwrap();
    let state_dir = StateDir::new(tmp.path().join(".fuel"));
    state_dir.ensure().unwrap();

    let store = Store::with_tail_gen(state_dir.clone(), Box::new(SequentialTail::default()));
    let ledger = RunLedger::with_tail_gen(
        &state_dir.ledger_path(),
        Box::new(SequentialTail::default()),
    )
    .unwrap();
    let processes = ProcessManager::new(state_dir.processes_dir());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let workdir: PathBuf = tmp.path().to_path_buf();
    let core = Core::new(
        config,
        store,
        ledger,
        processes,
        workdir,
        "00000000-0000-4000-8000-000000000000".to_string(),
        events_tx,
    );
    (tmp, core, events_rx)
}

/// Config with one `claude` agent running `sh -c <script>`.
///
/// The script ignores the appended prompt argument (`sh -c` binds it to
/// `$0`), so agents behave identically regardless of task content.
pub fn script_config(script: &str, concurrency: u32) -> Config {
    Config::builder()
        .agent_with_args("claude", "sh", &["-c", script], concurrency)
        .build()
}

/// Drain every event currently queued.
pub fn drain(events: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
