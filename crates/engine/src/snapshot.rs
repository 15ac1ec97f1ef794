// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board snapshot composition for new clients and periodic broadcasts.

use std::time::Instant;

use fuel_adapters::ProcessManager;
use fuel_core::task::{Task, TaskId};
use fuel_core::{BoardSnapshot, BoardState};
use fuel_storage::StoreState;

use crate::core::Core;
use crate::error::EngineError;
use crate::health::HealthTracker;

/// Compose a snapshot from store predicates, health counters, and tracked
/// processes.
pub fn build(
    state: &StoreState,
    health: &HealthTracker,
    processes: &ProcessManager,
    now: Instant,
) -> BoardSnapshot {
    BoardSnapshot {
        board_state: BoardState {
            ready: ids(state.ready()),
            in_progress: ids(state.in_progress()),
            review: ids(state.review()),
            blocked: ids(state.blocked()),
            human: ids(state.needs_human()),
            done: ids(state.done()),
        },
        agents_health: health.status_snapshot(now),
        process_summary: processes.summary(),
    }
}

fn ids(tasks: Vec<&Task>) -> Vec<TaskId> {
    tasks.into_iter().map(|t| t.id.clone()).collect()
}

impl Core {
    /// Snapshot the current board from disk and live counters.
    pub fn build_snapshot(&self, now: Instant) -> Result<BoardSnapshot, EngineError> {
        let state = self.store.load()?;
        Ok(build(&state, &self.health, &self.processes, now))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
