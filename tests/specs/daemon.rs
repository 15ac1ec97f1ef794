//! Consume daemon end-to-end: dispatch, events, recovery, exit codes.
//!
//! Each test uses its own state directory and port. Agent "work" is a
//! shell one-liner, so these specs exercise the real spawn/reap path.

use crate::prelude::*;
use serial_test::serial;
use std::time::{Duration, Instant};

/// Poll a CLI invocation until its stdout contains `needle`.
fn wait_for_stdout(project: &Project, args: &[&str], needle: &str) {
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        let output = project.fuel().args(args).run();
        if String::from_utf8_lossy(&output.stdout).contains(needle) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let output = project.fuel().args(args).run();
    panic!(
        "never saw {needle:?} in `fuel {}`:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout)
    );
}

#[test]
#[serial]
fn ready_task_runs_to_completion() {
    let project = Project::new();
    project.config(36411, "echo hello");

    let daemon = project.consume(36411);
    let mut client = daemon.client();

    // Handshake: hello then snapshot, in that order
    let first = client.next_event();
    assert_eq!(first["type"], "hello");
    assert!(first["instance_id"].as_str().unwrap().len() == 36);
    let second = client.next_event();
    assert_eq!(second["type"], "snapshot");

    let task = project
        .fuel()
        .args(&["add", "say hello", "--priority", "2"])
        .passes()
        .first_token();

    let spawned = client.wait_for("task_spawned");
    assert_eq!(spawned["task_id"], task.as_str());
    assert_eq!(spawned["agent"], "claude");

    let completed = client.wait_for("task_completed");
    assert_eq!(completed["task_id"], task.as_str());
    assert_eq!(completed["exit_code"], 0);
    assert_eq!(completed["success"], true);

    wait_for_stdout(&project, &["show", &task], "closed");
    wait_for_stdout(&project, &["runs", &task], "exit=0");
    let runs = project.fuel().args(&["runs", &task]).passes();
    assert!(runs.stdout().contains("completed"));

    daemon.stop();
}

#[test]
#[serial]
fn snapshot_lists_both_tasks_after_midstream_add() {
    let project = Project::new();
    // The agent never finishes, so tasks pile up as ready beyond the cap
    project.config(36412, "sleep 30");
    let t1 = project.fuel().args(&["add", "one"]).passes().first_token();

    let daemon = project.consume(36412);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    let t2 = project.fuel().args(&["add", "two"]).passes().first_token();

    // A later snapshot (beacon or board change) carries both tasks
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        assert!(Instant::now() < deadline, "never saw both tasks in a snapshot");
        let event = client.next_event();
        let snapshot = match event["type"].as_str() {
            Some("snapshot") | Some("board_state_changed") => &event["snapshot"],
            _ => continue,
        };
        let board = snapshot["board_state"].to_string();
        if board.contains(t1.as_str()) && board.contains(t2.as_str()) {
            break;
        }
    }

    daemon.stop();
}

#[test]
#[serial]
fn every_client_observes_the_event_stream() {
    let project = Project::new();
    project.config(36413, "echo shared");

    let daemon = project.consume(36413);
    let mut a = daemon.client();
    let mut b = daemon.client();

    let task = project.fuel().args(&["add", "observed"]).passes().first_token();

    let seen_a = a.wait_for("task_spawned");
    assert_eq!(seen_a["task_id"], task.as_str());

    // Disconnecting one client must not stall the other
    drop(a);
    let seen_b = b.wait_for("task_spawned");
    assert_eq!(seen_b["task_id"], task.as_str());
    b.wait_for("task_completed");

    daemon.stop();
}

#[test]
#[serial]
fn orphaned_runs_are_failed_on_startup() {
    let project = Project::new();
    project.config(36414, "echo unused");
    let task = project.fuel().args(&["add", "left behind"]).passes().first_token();
    // Close the task so the scheduler won't redispatch it, then record a
    // running run owned by a daemon that no longer exists.
    project.fuel().args(&["done", &task]).passes();
    project.file(
        ".fuel/runs.jsonl",
        &format!(
            "{}\n",
            serde_json::json!({
                "id": "run-orphn",
                "task_id": task,
                "agent": "claude",
                "pid": 999_999,
                "started_at": "2026-01-01T00:00:00Z",
                "output": "",
                "status": "running",
            })
        ),
    );

    let daemon = project.consume(36414);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    wait_for_stdout(&project, &["runs", &task], "failed");
    let runs = project.fuel().args(&["--json", "runs", &task]).passes();
    let value: serde_json::Value = serde_json::from_str(runs.stdout().trim()).unwrap();
    assert_eq!(value["exit_code"], -1);
    assert!(value["output"].as_str().unwrap().contains("orphaned: pid dead"));

    daemon.stop();
}

#[test]
#[serial]
fn second_daemon_exits_with_code_two() {
    let project = Project::new();
    project.config(36415, "echo unused");
    let daemon = project.consume(36415);

    let second = project.fuel().args(&["consume"]).run();
    assert_eq!(second.status.code(), Some(2));

    daemon.stop();
}

#[test]
#[serial]
fn spawn_failure_returns_task_to_open_with_reason() {
    let project = Project::new();
    project.file(
        ".fuel/config.toml",
        r#"consume_port = 36416
primary = "claude"

[agents.claude]
command = "no-such-binary-4x9z"
args = ["{prompt}"]
"#,
    );

    let daemon = project.consume(36416);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    let task = project.fuel().args(&["add", "doomed"]).passes().first_token();

    let failed = client.wait_for("task_failed");
    assert_eq!(failed["task_id"], task.as_str());
    assert_eq!(failed["exit_code"], -1);

    wait_for_stdout(&project, &["show", &task], "open");

    // Health snapshot shows the failure streak and an active backoff
    client.send(serde_json::json!({"type": "status", "request_id": "s1"}));
    let response = client.wait_for("response");
    assert_eq!(response["request_id"], "s1");
    assert_eq!(response["ok"], true);
    let agents = response["snapshot"]["agents_health"].as_array().unwrap();
    let claude = agents.iter().find(|a| a["agent"] == "claude").unwrap();
    assert!(claude["consecutive_failures"].as_u64().unwrap() >= 1);
    assert!(claude["backoff_remaining_ms"].as_u64().unwrap_or(0) > 0);

    daemon.stop();
}

#[test]
#[serial]
fn pause_resume_and_shutdown_commands() {
    let project = Project::new();
    project.config(36417, "echo paced");

    let daemon = project.consume(36417);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    client.send(serde_json::json!({"type": "pause", "request_id": "p1"}));
    let response = client.wait_for("response");
    assert_eq!(response["request_id"], "p1");
    assert_eq!(response["ok"], true);

    client.send(serde_json::json!({"type": "resume", "request_id": "p2"}));
    let response = client.wait_for("response");
    assert_eq!(response["request_id"], "p2");

    // Dispatch works after resume
    let task = project.fuel().args(&["add", "resumed"]).passes().first_token();
    let spawned = client.wait_for("task_spawned");
    assert_eq!(spawned["task_id"], task.as_str());
    client.wait_for("task_completed");

    client.send(serde_json::json!({"type": "shutdown", "request_id": "p3"}));
    let response = client.wait_for("response");
    assert_eq!(response["request_id"], "p3");
    // The daemon exits cleanly on its own
    wait_for_exit(daemon);
}

#[test]
#[serial]
fn review_pipeline_reviews_then_closes() {
    let project = Project::new();
    project.config_with_review(36418, "echo built", "echo approved");

    let daemon = project.consume(36418);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    let task = project.fuel().args(&["add", "reviewed work"]).passes().first_token();

    // Primary run
    let spawned = client.wait_for("task_spawned");
    assert_eq!(spawned["agent"], "claude");
    client.wait_for("task_completed");
    wait_for_stdout(&project, &["show", &task], "review");

    // Review run with the review agent
    let spawned = client.wait_for("task_spawned");
    assert_eq!(spawned["agent"], "reviewer");
    client.wait_for("task_completed");
    wait_for_stdout(&project, &["show", &task], "closed");

    daemon.stop();
}

#[test]
#[serial]
fn failed_review_escalates_to_human() {
    let project = Project::new();
    project.config_with_review(36419, "echo built", "exit 1");

    let daemon = project.consume(36419);
    let mut client = daemon.client();
    client.wait_for("snapshot");

    let task = project.fuel().args(&["add", "rejected work"]).passes().first_token();

    client.wait_for("task_completed"); // primary
    let failed = client.wait_for("task_failed"); // review
    assert_eq!(failed["task_id"], task.as_str());

    wait_for_stdout(&project, &["show", &task], "needs-human");
    let shown = project.fuel().args(&["show", &task]).passes();
    assert!(shown.stdout().contains("review"));

    daemon.stop();
}

/// Wait for a daemon child to exit on its own (IPC shutdown path).
fn wait_for_exit(daemon: DaemonHandle) {
    // DaemonHandle::stop sends SIGTERM first, which is harmless if the
    // process is already exiting; reuse it for the bounded wait.
    daemon.stop();
}
