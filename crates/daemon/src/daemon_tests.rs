// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fuel_core::id::SequentialTail;
use fuel_storage::NewTask;
use tokio::sync::mpsc::UnboundedReceiver;

fn test_core(tmp: &tempfile::TempDir) -> (Core, UnboundedReceiver<Event>) {
    let state_dir = StateDir::new(tmp.path().join(".fuel"));
    state_dir.ensure().unwrap();
    let store = Store::with_tail_gen(state_dir.clone(), Box::new(SequentialTail::default()));
    let ledger = RunLedger::open(&state_dir.ledger_path()).unwrap();
    let processes = ProcessManager::new(state_dir.processes_dir());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let core = Core::new(
        Config::builder()
            .agent_with_args("claude", "sh", &["-c", "sleep 30"], 1)
            .build(),
        store,
        ledger,
        processes,
        tmp.path().to_path_buf(),
        protocol::new_instance_id(),
        events_tx,
    );
    (core, events_rx)
}

async fn test_server() -> (IpcServer, mpsc::UnboundedReceiver<Inbound>) {
    IpcServer::start(0, protocol::new_instance_id())
        .await
        .unwrap()
}

fn command(c: Command) -> Inbound {
    Inbound::Command {
        client: 1,
        command: c,
    }
}

// ── Exit codes ───────────────────────────────────────────────────────────────

#[test]
fn exit_codes_match_failure_classes() {
    let port = DaemonError::Server(ServerError::PortInUse(3835));
    assert_eq!(port.exit_code(), 2);

    let state = DaemonError::StateDir {
        path: "/nope".to_string(),
        source: std::io::Error::other("denied"),
    };
    assert_eq!(state.exit_code(), 3);

    let config = DaemonError::Config(ConfigError::EmptyCommand("claude".to_string()));
    assert_eq!(config.exit_code(), 1);
}

// ── Command dispatch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn pause_and_resume_toggle_dispatch() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut core, _events) = test_core(&tmp);
    let (mut server, _inbound) = test_server().await;
    let mut paused = false;

    let shutdown = handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        command(Command::Pause {
            request_id: "r1".to_string(),
        }),
    );
    assert!(!shutdown);
    assert!(paused);

    handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        command(Command::Resume {
            request_id: "r2".to_string(),
        }),
    );
    assert!(!paused);
}

#[tokio::test]
async fn shutdown_command_ends_the_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut core, _events) = test_core(&tmp);
    let (mut server, _inbound) = test_server().await;
    let mut paused = false;

    let shutdown = handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        command(Command::Shutdown {
            request_id: "r1".to_string(),
        }),
    );
    assert!(shutdown);
}

#[tokio::test]
async fn kill_command_terminates_a_running_task() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut core, _events) = test_core(&tmp);
    let (mut server, _inbound) = test_server().await;
    let mut paused = false;

    let task = core
        .store
        .create_task(NewTask {
            title: "long".to_string(),
            ..NewTask::default()
        })
        .unwrap();
    core.dispatch(
        &task.id,
        "claude",
        fuel_engine::RunPurpose::Primary,
        Instant::now(),
    )
    .unwrap();
    assert!(core.processes.is_running(&task.id));

    // Kill by short id suffix
    let partial = task.id.as_str().trim_start_matches("f-")[3..].to_string();
    handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        command(Command::Kill {
            request_id: "r1".to_string(),
            task_id: partial,
        }),
    );

    let done = core
        .processes
        .wait_for_any(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(done.killed);
}

#[tokio::test]
async fn kill_unknown_task_reports_error_without_crashing() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut core, _events) = test_core(&tmp);
    let (mut server, _inbound) = test_server().await;
    let mut paused = false;

    let shutdown = handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        command(Command::Kill {
            request_id: "r1".to_string(),
            task_id: "zzzzz".to_string(),
        }),
    );
    assert!(!shutdown);
}

#[tokio::test]
async fn malformed_input_drops_the_client() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut core, _events) = test_core(&tmp);
    let (mut server, _inbound) = test_server().await;
    let mut paused = false;

    let shutdown = handle_inbound(
        &mut core,
        &mut server,
        &mut paused,
        Inbound::Malformed {
            client: 7,
            error: "bad json".to_string(),
        },
    );
    assert!(!shutdown);
    assert_eq!(server.client_count(), 0);
}
