//! Store and board behavior through the CLI.

use crate::prelude::*;

#[test]
fn add_assigns_a_task_id_and_defaults() {
    let project = Project::new();
    let id = project
        .fuel()
        .args(&["add", "write docs"])
        .passes()
        .stdout_has("write docs")
        .stdout_has("open")
        .stdout_has("p2")
        .first_token();
    assert!(id.starts_with("f-"));
}

#[test]
fn add_rejects_out_of_range_priority() {
    let project = Project::new();
    project
        .fuel()
        .args(&["add", "t", "--priority", "7"])
        .fails()
        .stderr_has("priority must be between 0 and 4");
}

#[test]
fn add_rejects_unknown_complexity() {
    let project = Project::new();
    project
        .fuel()
        .args(&["add", "t", "--complexity", "medium"])
        .fails()
        .stderr_has("unknown complexity");
}

#[test]
fn json_errors_are_documents_on_stdout() {
    let project = Project::new();
    let assertion = project
        .fuel()
        .args(&["--json", "show", "zzzzz"])
        .fails();
    let value: serde_json::Value = serde_json::from_str(assertion.stdout().trim()).unwrap();
    assert!(value["error"].as_str().unwrap().contains("not found"));
}

#[test]
fn show_resolves_short_id_suffix() {
    let project = Project::new();
    let id = project.fuel().args(&["add", "findable"]).passes().first_token();
    let tail = &id[id.len() - 3..];

    project
        .fuel()
        .args(&["show", tail])
        .passes()
        .stdout_has(&id)
        .stdout_has("findable");
}

#[test]
fn create_find_defer_find_is_not_found() {
    let project = Project::new();
    let id = project.fuel().args(&["add", "fleeting"]).passes().first_token();

    project.fuel().args(&["show", &id]).passes();
    let backlog_id = project.fuel().args(&["defer", &id]).passes().first_token();
    assert!(backlog_id.starts_with("b-"));

    project
        .fuel()
        .args(&["show", &id])
        .fails()
        .stderr_has("not found");

    // The deferred task lives on as a backlog item
    project
        .fuel()
        .args(&["backlog", "list"])
        .passes()
        .stdout_has("fleeting");
}

#[test]
fn done_closes_and_is_idempotent() {
    let project = Project::new();
    let id = project.fuel().args(&["add", "t"]).passes().first_token();

    project
        .fuel()
        .args(&["done", &id])
        .passes()
        .stdout_has("closed");
    // A second done is a no-op, not an error
    project
        .fuel()
        .args(&["done", &id])
        .passes()
        .stdout_has("closed");
}

#[test]
fn done_records_commit_hash() {
    let project = Project::new();
    let id = project.fuel().args(&["add", "t"]).passes().first_token();

    project
        .fuel()
        .args(&["done", &id, "--commit", "abc1234"])
        .passes();

    let shown = project.fuel().args(&["--json", "show", &id]).passes();
    let value: serde_json::Value = serde_json::from_str(shown.stdout().trim()).unwrap();
    assert_eq!(value["commit_hash"], "abc1234");
    assert_eq!(value["status"], "closed");
}

#[test]
fn dependencies_gate_readiness() {
    let project = Project::new();
    let t1 = project.fuel().args(&["add", "first"]).passes().first_token();
    let t2 = project.fuel().args(&["add", "second"]).passes().first_token();

    project.fuel().args(&["block", &t2, &t1]).passes();

    let ready = project
        .fuel()
        .args(&["list", "--status", "ready"])
        .passes();
    assert!(ready.stdout().contains(&t1));
    assert!(!ready.stdout().contains(&t2));

    let blocked = project
        .fuel()
        .args(&["list", "--status", "blocked"])
        .passes();
    assert!(blocked.stdout().contains(&t2));

    project.fuel().args(&["done", &t1]).passes();
    let ready = project
        .fuel()
        .args(&["list", "--status", "ready"])
        .passes();
    assert!(ready.stdout().contains(&t2));
}

#[test]
fn dependency_cycles_are_rejected() {
    let project = Project::new();
    let a = project.fuel().args(&["add", "a"]).passes().first_token();
    let b = project.fuel().args(&["add", "b"]).passes().first_token();
    let c = project.fuel().args(&["add", "c"]).passes().first_token();

    project.fuel().args(&["block", &b, &a]).passes();
    project.fuel().args(&["block", &c, &b]).passes();
    project
        .fuel()
        .args(&["block", &a, &c])
        .fails()
        .stderr_has("cycle");

    // The failed mutation left no edge behind
    project
        .fuel()
        .args(&["show", &a])
        .passes()
        .stdout_has(&format!("{a}  open"));
}

#[test]
fn self_dependency_is_rejected() {
    let project = Project::new();
    let a = project.fuel().args(&["add", "a"]).passes().first_token();
    project
        .fuel()
        .args(&["block", &a, &a])
        .fails()
        .stderr_has("cannot block itself");
}

#[test]
fn unblock_requires_an_existing_edge() {
    let project = Project::new();
    let a = project.fuel().args(&["add", "a"]).passes().first_token();
    let b = project.fuel().args(&["add", "b"]).passes().first_token();

    project
        .fuel()
        .args(&["unblock", &a, &b])
        .fails()
        .stderr_has("not blocked by");

    project.fuel().args(&["block", &a, &b]).passes();
    project.fuel().args(&["unblock", &a, &b]).passes();
}

#[test]
fn ready_orders_by_priority_then_age() {
    let project = Project::new();
    let low = project
        .fuel()
        .args(&["add", "low", "--priority", "4"])
        .passes()
        .first_token();
    let urgent = project
        .fuel()
        .args(&["add", "urgent", "--priority", "0"])
        .passes()
        .first_token();

    let stdout = project
        .fuel()
        .args(&["list", "--status", "ready"])
        .passes()
        .stdout();
    let urgent_pos = stdout.find(&urgent).unwrap();
    let low_pos = stdout.find(&low).unwrap();
    assert!(urgent_pos < low_pos);
}

#[test]
fn backlog_items_carry_no_task_fields() {
    let project = Project::new();
    project
        .fuel()
        .args(&["backlog", "add", "an idea"])
        .passes();

    let assertion = project
        .fuel()
        .args(&["--json", "backlog", "list"])
        .passes();
    let value: serde_json::Value = serde_json::from_str(assertion.stdout().trim()).unwrap();
    for field in ["status", "priority", "type", "labels", "complexity"] {
        assert!(
            value.get(field).is_none(),
            "backlog item unexpectedly carries {field}"
        );
    }
    assert_eq!(value["title"], "an idea");
}

#[test]
fn backlog_promote_creates_an_open_task() {
    let project = Project::new();
    let item = project
        .fuel()
        .args(&["backlog", "add", "someday"])
        .passes()
        .first_token();

    let task = project
        .fuel()
        .args(&["backlog", "promote", &item])
        .passes()
        .stdout_has("open")
        .first_token();
    assert!(task.starts_with("f-"));

    // The backlog item is gone
    let listing = project.fuel().args(&["backlog", "list"]).passes();
    assert!(!listing.stdout().contains(&item));
}
