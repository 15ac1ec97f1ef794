// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent subprocess management.
//!
//! Each spawned agent runs in its own process group with stdout/stderr
//! appended to per-task log files under `<state-dir>/processes/<task_id>/`.
//! A per-child reaper task forwards the exit status over a channel so the
//! daemon loop can drain completions without polling. Kills are SIGTERM to
//! the group, then SIGKILL after a grace period.

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fuel_core::task::TaskId;
use fuel_core::{ProcessInfo, ProcessSummary};

/// Bytes of stdout kept as a run's recorded output.
pub const OUTPUT_TAIL_BYTES: u64 = 64 * 1024;

/// Bytes of stdout included in a progress event.
const PROGRESS_TAIL_BYTES: u64 = 2 * 1024;

/// Grace between SIGTERM and SIGKILL on a task kill.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Grace for running agents to finish during daemon shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Errors from process management.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn agent for {task_id}: {message}")]
    Spawn { task_id: TaskId, message: String },

    #[error("task {0} already has a running process")]
    AlreadyRunning(TaskId),

    #[error("no tracked process for task {0}")]
    NotTracked(TaskId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully resolved command line for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Tracking state of a spawned process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Killed,
}

/// Book-keeping for one tracked subprocess.
#[derive(Debug)]
struct TrackedProcess {
    agent: String,
    pid: i32,
    status: ProcessStatus,
    stdout_path: PathBuf,
    /// Progress rate limiting
    last_progress_at: Option<Instant>,
    last_progress_size: u64,
}

/// A reaped completion, enriched with captured output.
#[derive(Debug, Clone)]
pub struct CompletedProcess {
    pub task_id: TaskId,
    pub agent: String,
    pub pid: i32,
    pub exit_code: i32,
    /// Last [`OUTPUT_TAIL_BYTES`] of the process's stdout
    pub stdout_tail: String,
    /// Whether the exit was forced by `kill`/`shutdown`
    pub killed: bool,
}

/// Raw exit notification from a reaper task.
#[derive(Debug)]
struct Reaped {
    task_id: TaskId,
    exit_code: i32,
}

/// Spawns, observes, and stops agent subprocesses.
pub struct ProcessManager {
    /// Root for per-task log directories (`processes/` in the state dir)
    logs_root: PathBuf,
    tracked: HashMap<TaskId, TrackedProcess>,
    reaped_tx: mpsc::UnboundedSender<Reaped>,
    reaped_rx: mpsc::UnboundedReceiver<Reaped>,
}

impl ProcessManager {
    /// Create a manager writing logs under `logs_root`.
    pub fn new(logs_root: impl Into<PathBuf>) -> Self {
        let (reaped_tx, reaped_rx) = mpsc::unbounded_channel();
        Self {
            logs_root: logs_root.into(),
            tracked: HashMap::new(),
            reaped_tx,
            reaped_rx,
        }
    }

    /// Launch `command` in `cwd` inside a fresh process group, capturing
    /// stdout/stderr to the task's log files. Returns the pid.
    ///
    /// Must be called from within a tokio runtime (the reaper task is
    /// spawned onto it).
    pub fn spawn(
        &mut self,
        task_id: &TaskId,
        agent: &str,
        command: &AgentCommand,
        cwd: &Path,
    ) -> Result<i32, ProcessError> {
        if self.tracked.contains_key(task_id) {
            return Err(ProcessError::AlreadyRunning(task_id.clone()));
        }

        let log_dir = self.logs_root.join(task_id.as_str());
        std::fs::create_dir_all(&log_dir)?;
        let stdout_path = log_dir.join("stdout.log");
        let stderr_path = log_dir.join("stderr.log");
        let stdout_file = open_append(&stdout_path)?;
        let stderr_file = open_append(&stderr_path)?;

        let mut cmd = std::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            // Detach into its own process group so kills target the whole tree
            .process_group(0);

        let mut child =
            tokio::process::Command::from(cmd)
                .spawn()
                .map_err(|e| ProcessError::Spawn {
                    task_id: task_id.clone(),
                    message: e.to_string(),
                })?;

        let pid = match child.id() {
            Some(pid) => pid as i32,
            None => {
                return Err(ProcessError::Spawn {
                    task_id: task_id.clone(),
                    message: "child exited before pid could be read".to_string(),
                })
            }
        };

        info!(task_id = %task_id, agent, pid, program = %command.program, "agent spawned");

        self.tracked.insert(
            task_id.clone(),
            TrackedProcess {
                agent: agent.to_string(),
                pid,
                status: ProcessStatus::Running,
                stdout_path,
                last_progress_at: None,
                last_progress_size: 0,
            },
        );

        let tx = self.reaped_tx.clone();
        let reaper_task_id = task_id.clone();
        tokio::spawn(async move {
            let exit_code = match child.wait().await {
                Ok(status) => exit_code_of(status),
                Err(e) => {
                    warn!(task_id = %reaper_task_id, error = %e, "wait on child failed");
                    -1
                }
            };
            let _ = tx.send(Reaped {
                task_id: reaper_task_id,
                exit_code,
            });
        });

        Ok(pid)
    }

    /// Block until any tracked process exits, or `timeout` elapses.
    pub async fn wait_for_any(&mut self, timeout: Duration) -> Option<CompletedProcess> {
        match tokio::time::timeout(timeout, self.reaped_rx.recv()).await {
            Ok(Some(reaped)) => Some(self.finish(reaped)),
            _ => None,
        }
    }

    /// Wait for the next completion without a deadline. Pends while no
    /// process is ready; suitable as a `select!` arm.
    pub async fn next_completion(&mut self) -> CompletedProcess {
        // The manager holds a sender, so the channel never closes and
        // recv() pends until a reaper reports.
        match self.reaped_rx.recv().await {
            Some(reaped) => self.finish(reaped),
            None => std::future::pending().await,
        }
    }

    /// Drain completions until every tracked process is reaped or the
    /// deadline passes. Partial results are returned.
    pub async fn wait_for_all(&mut self, timeout: Duration) -> Vec<CompletedProcess> {
        let deadline = Instant::now() + timeout;
        let mut done = Vec::new();
        while !self.tracked.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.wait_for_any(remaining).await {
                Some(completed) => done.push(completed),
                None => break,
            }
        }
        done
    }

    /// SIGTERM the task's process group, escalating to SIGKILL after a
    /// 2-second grace.
    pub fn kill(&mut self, task_id: &TaskId) -> Result<(), ProcessError> {
        let tracked = self
            .tracked
            .get_mut(task_id)
            .ok_or_else(|| ProcessError::NotTracked(task_id.clone()))?;
        tracked.status = ProcessStatus::Killed;
        let pid = tracked.pid;

        info!(task_id = %task_id, pid, "killing agent process group");
        term_group(pid);

        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE).await;
            if pid_alive(pid) {
                debug!(pid, "grace expired, sending SIGKILL");
                kill_group(pid);
            }
        });
        Ok(())
    }

    /// Kill every tracked process and wait for reaping. Returns the
    /// completions so callers can finalize their runs.
    pub async fn shutdown(&mut self) -> Vec<CompletedProcess> {
        for tracked in self.tracked.values_mut() {
            tracked.status = ProcessStatus::Killed;
            term_group(tracked.pid);
        }

        let mut done = self.wait_for_all(SHUTDOWN_GRACE).await;

        if !self.tracked.is_empty() {
            warn!(
                survivors = self.tracked.len(),
                "graceful shutdown window expired, sending SIGKILL"
            );
            for tracked in self.tracked.values() {
                kill_group(tracked.pid);
            }
            done.extend(self.wait_for_all(KILL_GRACE).await);
        }
        done
    }

    pub fn is_running(&self, task_id: &TaskId) -> bool {
        self.tracked.contains_key(task_id)
    }

    /// Number of tracked processes for an agent.
    pub fn agent_count(&self, agent: &str) -> usize {
        self.tracked.values().filter(|t| t.agent == agent).count()
    }

    /// Tracked-process counts per agent.
    pub fn agent_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for tracked in self.tracked.values() {
            *counts.entry(tracked.agent.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn active_count(&self) -> usize {
        self.tracked.len()
    }

    /// Snapshot DTO for broadcast.
    pub fn summary(&self) -> ProcessSummary {
        let mut processes: Vec<ProcessInfo> = self
            .tracked
            .iter()
            .map(|(task_id, t)| ProcessInfo {
                task_id: task_id.clone(),
                agent: t.agent.clone(),
                pid: t.pid,
            })
            .collect();
        processes.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        ProcessSummary {
            active: processes.len() as u32,
            processes,
        }
    }

    /// Rate-limited stdout progress for running tasks.
    ///
    /// Returns a tail for each task whose stdout grew and whose last
    /// progress report is older than `min_interval`.
    pub fn progress_updates(
        &mut self,
        now: Instant,
        min_interval: Duration,
    ) -> Vec<(TaskId, String)> {
        let mut updates = Vec::new();
        for (task_id, tracked) in self.tracked.iter_mut() {
            if tracked.status != ProcessStatus::Running {
                continue;
            }
            let due = tracked
                .last_progress_at
                .map_or(true, |at| now.duration_since(at) >= min_interval);
            if !due {
                continue;
            }
            let size = std::fs::metadata(&tracked.stdout_path)
                .map(|m| m.len())
                .unwrap_or(0);
            if size <= tracked.last_progress_size {
                continue;
            }
            tracked.last_progress_at = Some(now);
            tracked.last_progress_size = size;
            let tail = read_tail(&tracked.stdout_path, PROGRESS_TAIL_BYTES).unwrap_or_default();
            updates.push((task_id.clone(), tail));
        }
        updates
    }

    fn finish(&mut self, reaped: Reaped) -> CompletedProcess {
        match self.tracked.remove(&reaped.task_id) {
            Some(tracked) => {
                let stdout_tail =
                    read_tail(&tracked.stdout_path, OUTPUT_TAIL_BYTES).unwrap_or_default();
                CompletedProcess {
                    task_id: reaped.task_id,
                    agent: tracked.agent,
                    pid: tracked.pid,
                    exit_code: reaped.exit_code,
                    stdout_tail,
                    killed: tracked.status == ProcessStatus::Killed,
                }
            }
            // Completion for an untracked task; synthesize a bare record
            None => CompletedProcess {
                task_id: reaped.task_id,
                agent: String::new(),
                pid: -1,
                exit_code: reaped.exit_code,
                stdout_tail: String::new(),
                killed: false,
            },
        }
    }
}

/// Zero-signal liveness probe.
pub fn pid_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

fn term_group(pid: i32) {
    // The group may already be gone; that is not an error worth surfacing
    let _ = killpg(Pid::from_raw(pid), Signal::SIGTERM);
}

fn kill_group(pid: i32) {
    let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        // Killed by signal n: report the shell convention 128 + n
        None => status.signal().map(|s| 128 + s).unwrap_or(-1),
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Read the last `max_bytes` of a file as lossy UTF-8.
fn read_tail(path: &Path, max_bytes: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > max_bytes {
        file.seek(SeekFrom::Start(len - max_bytes))?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
