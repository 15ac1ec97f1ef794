// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epic entity: a named collection of tasks with a derived status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task::Task;

crate::define_id! {
    /// Unique identifier for an epic (`e-` prefix).
    pub struct EpicId;
}

/// Derived status of an epic. Never stored; always computed from the
/// epic's linked tasks and its `reviewed_at` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    /// No linked tasks yet
    Planning,
    /// Some linked tasks are not closed
    InProgress,
    /// All linked tasks closed, not yet reviewed
    ReviewPending,
    /// All linked tasks closed and reviewed
    Done,
}

impl fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpicStatus::Planning => write!(f, "planning"),
            EpicStatus::InProgress => write!(f, "in_progress"),
            EpicStatus::ReviewPending => write!(f, "review_pending"),
            EpicStatus::Done => write!(f, "done"),
        }
    }
}

/// A named collection of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Epic {
    pub id: EpicId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set only via an explicit `epic reviewed` action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Epic {
    /// Compute the derived status from the epic's linked tasks.
    pub fn derived_status<'a>(&self, linked: impl Iterator<Item = &'a Task>) -> EpicStatus {
        let mut any = false;
        let mut all_closed = true;
        for task in linked {
            any = true;
            if !task.is_closed() {
                all_closed = false;
            }
        }

        if !any {
            EpicStatus::Planning
        } else if !all_closed {
            EpicStatus::InProgress
        } else if self.reviewed_at.is_none() {
            EpicStatus::ReviewPending
        } else {
            EpicStatus::Done
        }
    }
}

#[cfg(test)]
#[path = "epic_tests.rs"]
mod tests;
