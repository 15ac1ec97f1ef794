// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binding a selected task to an agent: run creation, process launch, and
//! the spawn event.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use fuel_core::run::RunId;
use fuel_core::task::{TaskId, TaskStatus};
use fuel_core::{Event, RunStatus, NEEDS_HUMAN_LABEL};
use fuel_storage::{NewRun, RunDelta};

use crate::core::Core;
use crate::error::EngineError;
use crate::prompt::{self, RunPurpose};

impl Core {
    /// Dispatch one `(task, agent)` pair.
    ///
    /// Primary runs move the task to `in_progress` first; review runs
    /// leave it in `review`. Failure before the process launches rolls the
    /// task back and fails the run; failure at launch records
    /// `exit_code = -1` and emits `task_failed`.
    pub fn dispatch(
        &mut self,
        task_id: &TaskId,
        agent: &str,
        purpose: RunPurpose,
        now: Instant,
    ) -> Result<(), EngineError> {
        let task = self.store.task(task_id)?;
        let spec = self
            .config
            .agent(agent)
            .ok_or_else(|| EngineError::UnknownAgent(agent.to_string()))?
            .clone();
        let command = prompt::build_command(&spec, &task, purpose);

        if purpose == RunPurpose::Primary {
            self.store.set_task_status(task_id, TaskStatus::InProgress)?;
        }

        let run_id = match self.ledger.create_run(
            task_id,
            NewRun {
                agent: agent.to_string(),
                model: spec.model.clone(),
                session_id: None,
                pid: None,
                runner_instance_id: Some(self.instance_id.clone()),
            },
        ) {
            Ok(run_id) => run_id,
            Err(e) => {
                self.rollback(task_id, purpose);
                return Err(e.into());
            }
        };

        let workdir = self.workdir.clone();
        match self.processes.spawn(task_id, agent, &command, &workdir) {
            Ok(pid) => {
                self.ledger.update_latest_run(
                    task_id,
                    RunDelta {
                        pid: Some(pid),
                        ..RunDelta::default()
                    },
                )?;
                self.health.record_spawn(agent);
                info!(task_id = %task_id, run_id = %run_id, agent, pid, "task spawned");
                self.emit(Event::TaskSpawned {
                    task_id: task_id.clone(),
                    run_id,
                    agent: agent.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                warn!(task_id = %task_id, agent, error = %e, "spawn failed");
                self.record_spawn_failure(task_id, &run_id, agent, purpose, &e.to_string(), now);
                Ok(())
            }
        }
    }

    /// Undo the pre-spawn status transition after an early failure.
    fn rollback(&mut self, task_id: &TaskId, purpose: RunPurpose) {
        if purpose == RunPurpose::Primary {
            if let Err(e) = self.store.set_task_status(task_id, TaskStatus::Open) {
                warn!(task_id = %task_id, error = %e, "rollback to open failed");
            }
        }
    }

    /// A spawn that never produced a process: fail the run with
    /// `exit_code = -1`, return the task to the board, count the failure
    /// against the agent, and emit `task_failed`.
    fn record_spawn_failure(
        &mut self,
        task_id: &TaskId,
        run_id: &RunId,
        agent: &str,
        purpose: RunPurpose,
        reason: &str,
        now: Instant,
    ) {
        if let Err(e) = self.ledger.update_latest_run(
            task_id,
            RunDelta {
                status: Some(RunStatus::Failed),
                exit_code: Some(-1),
                ended_at: Some(Utc::now()),
                output: Some(reason.to_string()),
                ..RunDelta::default()
            },
        ) {
            warn!(task_id = %task_id, error = %e, "failed to finalize run after spawn failure");
        }

        self.health.record_spawn_failure(agent, now);

        match purpose {
            RunPurpose::Primary => {
                self.rollback(task_id, purpose);
                self.escalate_if_exhausted(task_id);
            }
            // A review that cannot launch needs a human decision
            RunPurpose::Review => {
                if let Err(e) = self.store.add_task_label(task_id, NEEDS_HUMAN_LABEL) {
                    warn!(task_id = %task_id, error = %e, "failed to add needs-human label");
                }
            }
        }
        if let Err(e) = self.store.set_task_reason(task_id, reason) {
            warn!(task_id = %task_id, error = %e, "failed to record failure reason");
        }

        self.emit(Event::TaskFailed {
            task_id: task_id.clone(),
            run_id: run_id.clone(),
            exit_code: -1,
            reason: reason.to_string(),
        });
    }

    /// Add `needs-human` once a task has burned through its allowed
    /// failed runs.
    pub(crate) fn escalate_if_exhausted(&mut self, task_id: &TaskId) {
        if self.ledger.failed_count(task_id) >= self.config.max_attempts() {
            info!(task_id = %task_id, "max attempts reached, escalating to human");
            if let Err(e) = self.store.add_task_label(task_id, NEEDS_HUMAN_LABEL) {
                warn!(task_id = %task_id, error = %e, "failed to add needs-human label");
            }
        }
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
