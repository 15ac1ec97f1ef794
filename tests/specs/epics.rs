//! Epic lifecycle through the CLI: derived status transitions.

use crate::prelude::*;

#[test]
fn epic_status_follows_linked_tasks() {
    let project = Project::new();
    let epic = project
        .fuel()
        .args(&["epic", "add", "big refactor"])
        .passes()
        .stdout_has("planning")
        .first_token();
    assert!(epic.starts_with("e-"));

    let task = project
        .fuel()
        .args(&["add", "part one", "--epic", &epic])
        .passes()
        .first_token();
    project
        .fuel()
        .args(&["epic", "show", &epic])
        .passes()
        .stdout_has("in_progress");

    project.fuel().args(&["done", &task]).passes();
    project
        .fuel()
        .args(&["epic", "show", &epic])
        .passes()
        .stdout_has("review_pending");

    project
        .fuel()
        .args(&["epic", "reviewed", &epic])
        .passes()
        .stdout_has("done");
}

#[test]
fn epic_link_attaches_an_existing_task() {
    let project = Project::new();
    let epic = project
        .fuel()
        .args(&["epic", "add", "collect"])
        .passes()
        .first_token();
    let task = project.fuel().args(&["add", "stray"]).passes().first_token();

    project
        .fuel()
        .args(&["epic", "link", &task, &epic])
        .passes();
    project
        .fuel()
        .args(&["epic", "show", &epic])
        .passes()
        .stdout_has("stray");
}

#[test]
fn linking_to_a_missing_epic_fails() {
    let project = Project::new();
    project
        .fuel()
        .args(&["add", "t", "--epic", "zzzzz"])
        .fails()
        .stderr_has("not found");
}
