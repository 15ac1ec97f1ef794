// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Core` aggregate: every service the daemon loop needs, owned in one
//! place and constructed once at startup. No ambient lookups.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, warn};

use fuel_adapters::ProcessManager;
use fuel_core::{Config, Event};
use fuel_storage::{RunLedger, Store};

use crate::error::EngineError;
use crate::health::HealthTracker;
use crate::prompt::RunPurpose;
use crate::scheduler;

/// Owns the store, ledger, process manager, health tracker, and event
/// channel. The daemon loop drives it; it never spawns its own tasks
/// beyond what the process manager needs.
pub struct Core {
    pub config: Config,
    pub store: Store,
    pub ledger: RunLedger,
    pub processes: ProcessManager,
    pub health: HealthTracker,
    /// Where agent subprocesses run (the daemon's working directory)
    pub workdir: PathBuf,
    /// UUIDv4 of this daemon instance, stamped onto runs
    pub instance_id: String,
    events: mpsc::UnboundedSender<Event>,
}

impl Core {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Store,
        ledger: RunLedger,
        processes: ProcessManager,
        workdir: PathBuf,
        instance_id: String,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let health = HealthTracker::new(&config);
        Self {
            config,
            store,
            ledger,
            processes,
            health,
            workdir,
            instance_id,
            events,
        }
    }

    /// Emit a board event toward the IPC fan-out.
    pub fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            // Receiver gone only during shutdown
            warn!("event channel closed, dropping event");
        }
    }

    /// One scheduling pass: select ready tasks under admission limits and
    /// dispatch each. Per-task dispatch errors are logged, not propagated,
    /// so one bad task cannot stall the board. Returns the number of
    /// spawns attempted.
    pub fn dispatch_ready(&mut self, now: Instant) -> Result<usize, EngineError> {
        let state = self.store.load()?;
        let agent_counts: HashMap<String, usize> = self.processes.agent_counts();
        let picks = scheduler::pick(
            &state.ready(),
            &self.config,
            &self.health,
            &agent_counts,
            now,
        );
        drop(state);

        let count = picks.len();
        for (task_id, agent) in picks {
            if let Err(e) = self.dispatch(&task_id, &agent, RunPurpose::Primary, now) {
                error!(task_id = %task_id, agent, error = %e, "dispatch failed");
            }
        }
        Ok(count)
    }

    /// Dispatch review runs for tasks sitting in `review` with no live
    /// process. Review admission honors the same health gates as primary
    /// dispatch; a deferred review is retried on a later tick. Returns the
    /// number of spawns attempted.
    pub fn dispatch_reviews(&mut self, now: Instant) -> Result<usize, EngineError> {
        let Some(review_agent) = self.config.review().map(String::from) else {
            return Ok(0);
        };

        let state = self.store.load()?;
        let mut pending: Vec<fuel_core::TaskId> = Vec::new();
        for task in state.review() {
            if task.needs_human() || self.processes.is_running(&task.id) {
                continue;
            }
            pending.push(task.id.clone());
        }
        drop(state);

        let cap = self.config.cap(&review_agent) as usize;
        let mut dispatched = 0;
        for task_id in pending {
            if !self.health.can_spawn(&review_agent, now) {
                break;
            }
            if self.processes.agent_count(&review_agent) >= cap {
                break;
            }
            if let Err(e) = self.dispatch(&task_id, &review_agent, RunPurpose::Review, now) {
                error!(task_id = %task_id, agent = %review_agent, error = %e, "review dispatch failed");
            }
            dispatched += 1;
        }
        Ok(dispatched)
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
