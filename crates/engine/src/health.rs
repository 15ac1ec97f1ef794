// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent health bookkeeping and spawn admission.
//!
//! Tracks running counts, lifetime successes/failures, and consecutive
//! failure streaks. Repeated failures open an exponential backoff window
//! during which the agent is not admitted for new spawns. All time-based
//! decisions take an explicit `now` so tests stay deterministic.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use fuel_core::{AgentHealthSummary, Config};

/// Base backoff after the first consecutive failure.
pub const BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Upper bound on the backoff window.
pub const BACKOFF_CAP: Duration = Duration::from_secs(5 * 60);

/// Maximum jitter added to a backoff window.
const BACKOFF_JITTER_MAX_MS: u64 = 1_000;

#[derive(Debug, Default)]
struct AgentHealth {
    running: u32,
    successes: u64,
    failures: u64,
    consecutive_failures: u32,
    backoff_until: Option<Instant>,
}

/// Tracks agent usage and failure streaks; gates spawn admission.
#[derive(Debug, Default)]
pub struct HealthTracker {
    agents: BTreeMap<String, AgentHealth>,
    caps: BTreeMap<String, u32>,
}

impl HealthTracker {
    /// Build a tracker with per-agent caps from the config.
    pub fn new(config: &Config) -> Self {
        let caps = config
            .agent_names()
            .map(|name| (name.to_string(), config.cap(name)))
            .collect();
        Self {
            agents: BTreeMap::new(),
            caps,
        }
    }

    /// Whether a new run may start for this agent: below its concurrency
    /// cap and outside any backoff window.
    pub fn can_spawn(&self, agent: &str, now: Instant) -> bool {
        let cap = self.cap(agent);
        match self.agents.get(agent) {
            None => cap > 0,
            Some(health) => {
                if health.running >= cap {
                    return false;
                }
                match health.backoff_until {
                    Some(until) => until <= now,
                    None => true,
                }
            }
        }
    }

    /// Record that a run started.
    pub fn record_spawn(&mut self, agent: &str) {
        self.entry(agent).running += 1;
    }

    /// Record that a run finished. A failure extends the agent's
    /// consecutive-failure streak and opens a backoff window; a success
    /// clears both.
    pub fn record_completion(&mut self, agent: &str, success: bool, now: Instant) {
        let health = self.entry(agent);
        health.running = health.running.saturating_sub(1);
        if success {
            health.successes += 1;
            health.consecutive_failures = 0;
            health.backoff_until = None;
        } else {
            fail(health, now);
        }
    }

    /// Record a failure for a run that never started (spawn error). No
    /// running slot was taken, so only the failure streak advances.
    pub fn record_spawn_failure(&mut self, agent: &str, now: Instant) {
        fail(self.entry(agent), now);
    }

    /// Current running count for an agent.
    pub fn current(&self, agent: &str) -> u32 {
        self.agents.get(agent).map_or(0, |h| h.running)
    }

    pub fn consecutive_failures(&self, agent: &str) -> u32 {
        self.agents.get(agent).map_or(0, |h| h.consecutive_failures)
    }

    /// Whether the agent is currently inside a backoff window.
    pub fn in_backoff(&self, agent: &str, now: Instant) -> bool {
        self.agents
            .get(agent)
            .and_then(|h| h.backoff_until)
            .map_or(false, |until| until > now)
    }

    /// Snapshot of every known agent's health for broadcast. Agents with
    /// caps but no activity yet are included with zeroed counters.
    pub fn status_snapshot(&self, now: Instant) -> Vec<AgentHealthSummary> {
        let mut names: Vec<&String> = self.caps.keys().collect();
        for name in self.agents.keys() {
            if !self.caps.contains_key(name) {
                names.push(name);
            }
        }
        names.sort();
        names.dedup();

        names
            .into_iter()
            .map(|name| {
                let health = self.agents.get(name);
                AgentHealthSummary {
                    agent: name.clone(),
                    running: health.map_or(0, |h| h.running),
                    successes: health.map_or(0, |h| h.successes),
                    failures: health.map_or(0, |h| h.failures),
                    consecutive_failures: health.map_or(0, |h| h.consecutive_failures),
                    backoff_remaining_ms: health.and_then(|h| h.backoff_until).and_then(|until| {
                        let remaining = until.saturating_duration_since(now);
                        if remaining.is_zero() {
                            None
                        } else {
                            Some(remaining.as_millis() as u64)
                        }
                    }),
                }
            })
            .collect()
    }

    fn cap(&self, agent: &str) -> u32 {
        self.caps.get(agent).copied().unwrap_or(1)
    }

    fn entry(&mut self, agent: &str) -> &mut AgentHealth {
        self.agents.entry(agent.to_string()).or_default()
    }
}

fn fail(health: &mut AgentHealth, now: Instant) {
    health.failures += 1;
    health.consecutive_failures += 1;
    health.backoff_until = Some(now + backoff_delay(health.consecutive_failures) + jitter());
}

/// Backoff for the k-th consecutive failure: `min(cap, base * 2^(k-1))`.
pub fn backoff_delay(streak: u32) -> Duration {
    if streak == 0 {
        return Duration::ZERO;
    }
    let exp = (streak - 1).min(16);
    BACKOFF_BASE
        .saturating_mul(1u32 << exp)
        .min(BACKOFF_CAP)
}

fn jitter() -> Duration {
    use rand::Rng;
    Duration::from_millis(rand::rng().random_range(0..BACKOFF_JITTER_MAX_MS))
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
