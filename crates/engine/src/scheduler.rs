// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ready-task selection.
//!
//! A pure function from board state to `(task, agent)` dispatch pairs.
//! Holds no state across ticks: admission is recomputed from the health
//! tracker and the live process counts every time.

use std::collections::HashMap;
use std::time::Instant;

use fuel_core::task::{Task, TaskId};
use fuel_core::Config;

use crate::health::HealthTracker;

/// Select tasks to dispatch this tick.
///
/// Walks the ready list in order, routing each task to an agent via the
/// complexity map (falling back to the primary agent). A task is admitted
/// when its agent is outside backoff, below its health-tracked cap, and
/// below its live process count plus this tick's admissions. Tasks
/// escalated to a human are never picked.
pub fn pick(
    ready: &[&Task],
    config: &Config,
    health: &HealthTracker,
    agent_counts: &HashMap<String, usize>,
    now: Instant,
) -> Vec<(TaskId, String)> {
    let mut admitted: Vec<(TaskId, String)> = Vec::new();
    let mut admitted_counts: HashMap<&str, usize> = HashMap::new();

    for task in ready {
        if task.needs_human() {
            continue;
        }

        let agent = config.agent_for(task.complexity);

        if !health.can_spawn(agent, now) {
            continue;
        }

        let cap = config.cap(agent) as usize;
        let live = agent_counts.get(agent).copied().unwrap_or(0);
        let this_tick = admitted_counts.get(agent).copied().unwrap_or(0);
        if live + this_tick >= cap {
            continue;
        }
        if health.current(agent) as usize + this_tick >= cap {
            continue;
        }

        *admitted_counts.entry(agent).or_insert(0) += 1;
        admitted.push((task.id.clone(), agent.to_string()));
    }

    admitted
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
