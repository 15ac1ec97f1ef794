// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run entity: one invocation of one agent on one task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::TaskId;

crate::define_id! {
    /// Unique identifier for a run (`run-` prefix).
    pub struct RunId;
}

/// Outcome state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal (no further transitions expected)
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of a single agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Run {
    pub id: RunId,
    pub task_id: TaskId,
    /// Registered agent name from the config
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Opaque session identifier reported by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    /// Instance id of the daemon that started this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_instance_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Cost in US dollars. `None` means the agent reported no cost, which
    /// is distinct from a reported 0.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Captured stdout tail (bounded)
    #[serde(default)]
    pub output: String,
    pub status: RunStatus,
}

impl Run {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Builder for `Run` with test defaults.
#[cfg(any(test, feature = "test-support"))]
pub struct RunBuilder {
    run: Run,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for RunBuilder {
    fn default() -> Self {
        Self {
            run: Run {
                id: RunId::new("run-00001"),
                task_id: TaskId::new("f-00001"),
                agent: "claude".to_string(),
                model: None,
                session_id: None,
                pid: None,
                runner_instance_id: None,
                started_at: DateTime::UNIX_EPOCH,
                ended_at: None,
                exit_code: None,
                cost_usd: None,
                output: String::new(),
                status: RunStatus::Running,
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RunBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.run.id = RunId::new(v);
        self
    }
    pub fn task_id(mut self, v: impl Into<String>) -> Self {
        self.run.task_id = TaskId::new(v);
        self
    }
    pub fn agent(mut self, v: impl Into<String>) -> Self {
        self.run.agent = v.into();
        self
    }
    pub fn pid(mut self, v: i32) -> Self {
        self.run.pid = Some(v);
        self
    }
    pub fn status(mut self, v: RunStatus) -> Self {
        self.run.status = v;
        self
    }
    pub fn exit_code(mut self, v: i32) -> Self {
        self.run.exit_code = Some(v);
        self
    }
    pub fn build(self) -> Run {
        self.run
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Run {
    /// Create a builder with test defaults.
    pub fn builder() -> RunBuilder {
        RunBuilder::default()
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
