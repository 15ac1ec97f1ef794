// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board events and snapshot DTOs.
//!
//! This is the vocabulary shared by the engine (which produces events) and
//! the daemon (which stamps them with an instance id and timestamp and
//! fans them out to IPC clients). The serialized `type` tag is the wire
//! event type.

use serde::{Deserialize, Serialize};

use crate::run::RunId;
use crate::task::TaskId;

/// Log severity carried by `log` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

/// A board event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// First record every client receives
    Hello { version: String },
    /// Full board snapshot; second record on connect, periodic beacon after
    Snapshot { snapshot: BoardSnapshot },
    TaskSpawned {
        task_id: TaskId,
        run_id: RunId,
        agent: String,
    },
    TaskCompleted {
        task_id: TaskId,
        run_id: RunId,
        exit_code: i32,
        success: bool,
    },
    TaskFailed {
        task_id: TaskId,
        run_id: RunId,
        exit_code: i32,
        reason: String,
    },
    /// Rate-limited progress beacon while a task's agent is running
    TaskProgress {
        task_id: TaskId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdout_tail: Option<String>,
    },
    BoardStateChanged { snapshot: BoardSnapshot },
    Log { level: LogLevel, message: String },
    /// Reply to an inbound client command, correlated by `request_id`
    Response {
        request_id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<BoardSnapshot>,
    },
}

impl Event {
    /// Wire type tag, for logging and tests.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Hello { .. } => "hello",
            Event::Snapshot { .. } => "snapshot",
            Event::TaskSpawned { .. } => "task_spawned",
            Event::TaskCompleted { .. } => "task_completed",
            Event::TaskFailed { .. } => "task_failed",
            Event::TaskProgress { .. } => "task_progress",
            Event::BoardStateChanged { .. } => "board_state_changed",
            Event::Log { .. } => "log",
            Event::Response { .. } => "response",
        }
    }
}

/// Point-in-time view of the board, agent health, and running processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board_state: BoardState,
    pub agents_health: Vec<AgentHealthSummary>,
    pub process_summary: ProcessSummary,
}

/// Task ids per board column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardState {
    pub ready: Vec<TaskId>,
    pub in_progress: Vec<TaskId>,
    pub review: Vec<TaskId>,
    pub blocked: Vec<TaskId>,
    pub human: Vec<TaskId>,
    pub done: Vec<TaskId>,
}

/// Per-agent health counters for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealthSummary {
    pub agent: String,
    pub running: u32,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    /// Remaining backoff window, if the agent is deferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_remaining_ms: Option<u64>,
}

/// Summary of tracked agent subprocesses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub active: u32,
    pub processes: Vec<ProcessInfo>,
}

/// One tracked subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub task_id: TaskId,
    pub agent: String,
    pub pid: i32,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
