// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn running_is_not_terminal() {
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Completed.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&RunStatus::Completed).unwrap(),
        "\"completed\""
    );
}

#[test]
fn run_serde_roundtrip() {
    let run = Run::builder()
        .id("run-9zz01")
        .task_id("f-x7k2m")
        .agent("claude")
        .pid(4321)
        .build();

    let json = serde_json::to_string(&run).unwrap();
    let back: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id, run.id);
    assert_eq!(back.task_id, run.task_id);
    assert_eq!(back.pid, Some(4321));
    assert_eq!(back.status, RunStatus::Running);
}

#[test]
fn absent_cost_stays_absent_through_serde() {
    let run = Run::builder().build();
    let json = serde_json::to_string(&run).unwrap();
    assert!(!json.contains("cost_usd"));

    let back: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(back.cost_usd, None);
}

#[test]
fn zero_cost_is_preserved_as_reported() {
    let mut run = Run::builder().build();
    run.cost_usd = Some(0.0);
    let json = serde_json::to_string(&run).unwrap();
    let back: Run = serde_json::from_str(&json).unwrap();
    assert_eq!(back.cost_usd, Some(0.0));
}
