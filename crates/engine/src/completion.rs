// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finishing runs: finalize the ledger record, advance the task, feed the
//! health tracker, and emit completion events.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use fuel_adapters::CompletedProcess;
use fuel_core::task::TaskStatus;
use fuel_core::{Event, RunStatus, NEEDS_HUMAN_LABEL};
use fuel_storage::{RunDelta, StoreError};

use crate::core::Core;
use crate::error::EngineError;

impl Core {
    /// Handle one finished agent process.
    ///
    /// A completion for a task in `review` status is the review run
    /// finishing; everything else is a primary run. Success with a review
    /// agent configured parks the task in `review` (the next tick
    /// dispatches the review run); success without one closes it; failure
    /// returns it to `open`, escalating to `needs-human` once the task's
    /// failed-run budget is spent.
    pub fn handle_completion(
        &mut self,
        done: CompletedProcess,
        now: Instant,
    ) -> Result<(), EngineError> {
        let success = done.exit_code == 0 && !done.killed;

        let run = match self.ledger.update_latest_run(
            &done.task_id,
            RunDelta {
                ended_at: Some(Utc::now()),
                exit_code: Some(done.exit_code),
                status: Some(if success {
                    RunStatus::Completed
                } else {
                    RunStatus::Failed
                }),
                output: Some(done.stdout_tail.clone()),
                ..RunDelta::default()
            },
        ) {
            Ok(run) => run,
            Err(e) => {
                // A completion with no run record should not kill the loop
                warn!(task_id = %done.task_id, error = %e, "no run to finalize");
                self.health.record_completion(&done.agent, success, now);
                return Ok(());
            }
        };

        let reason = if done.killed {
            "killed".to_string()
        } else {
            format!("exit {}", done.exit_code)
        };

        match self.store.task(&done.task_id) {
            Ok(task) => {
                let was_review = task.status == TaskStatus::Review;
                if success {
                    if was_review || self.config.review().is_none() {
                        self.store.close_task(&done.task_id)?;
                        info!(task_id = %done.task_id, "task closed");
                    } else {
                        self.store
                            .set_task_status(&done.task_id, TaskStatus::Review)?;
                        info!(task_id = %done.task_id, "task moved to review");
                    }
                } else if was_review {
                    // Review rejected or died: stay in review, flag a human
                    self.store
                        .add_task_label(&done.task_id, NEEDS_HUMAN_LABEL)?;
                    self.store.set_task_reason(&done.task_id, &reason)?;
                    info!(task_id = %done.task_id, reason, "review failed, escalating");
                } else {
                    self.store.set_task_status(&done.task_id, TaskStatus::Open)?;
                    self.store.set_task_reason(&done.task_id, &reason)?;
                    self.escalate_if_exhausted(&done.task_id);
                    info!(task_id = %done.task_id, reason, "task returned to open");
                }
            }
            // Task deleted while its agent ran; the run record stands alone
            Err(StoreError::NotFound { .. }) => {
                warn!(task_id = %done.task_id, "completion for deleted task");
            }
            Err(e) => return Err(e.into()),
        }

        self.health.record_completion(&done.agent, success, now);

        if success {
            self.emit(Event::TaskCompleted {
                task_id: done.task_id.clone(),
                run_id: run.id.clone(),
                exit_code: done.exit_code,
                success: true,
            });
        } else {
            self.emit(Event::TaskFailed {
                task_id: done.task_id.clone(),
                run_id: run.id.clone(),
                exit_code: done.exit_code,
                reason,
            });
        }

        if let Ok(snapshot) = self.build_snapshot(now) {
            self.emit(Event::BoardStateChanged { snapshot });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
