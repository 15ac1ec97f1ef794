// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only run ledger.
//!
//! Every agent invocation is recorded as a line of JSON in `runs.jsonl`.
//! Updates append a fresh copy of the record; replay on open keeps the last
//! line per run id. A corrupt line (e.g. a torn write from a crash) is
//! skipped with a warning rather than poisoning the ledger.

use chrono::Utc;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use fuel_core::id::{IdKind, RandomTail, TailGen};
use fuel_core::run::{Run, RunId, RunStatus};
use fuel_core::task::TaskId;

/// Attempts at generating an unused run id before giving up.
const ID_RETRY_LIMIT: u32 = 100;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no runs recorded for task {0}")]
    NoRuns(TaskId),

    #[error("could not generate a unique run id after {0} attempts")]
    IdSpace(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fields supplied when a run is created.
#[derive(Debug, Clone, Default)]
pub struct NewRun {
    pub agent: String,
    pub model: Option<String>,
    pub session_id: Option<String>,
    pub pid: Option<i32>,
    pub runner_instance_id: Option<String>,
}

/// Partial update merged into a run record. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct RunDelta {
    pub pid: Option<i32>,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub ended_at: Option<chrono::DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub cost_usd: Option<f64>,
    pub output: Option<String>,
    pub status: Option<RunStatus>,
}

/// The run ledger: an append-only record of agent invocations.
pub struct RunLedger {
    path: PathBuf,
    file: File,
    /// Runs in order of first appearance; updates overwrite in place
    runs: Vec<Run>,
    /// run id -> index into `runs`
    index: HashMap<RunId, usize>,
    tails: Box<dyn TailGen>,
}

impl RunLedger {
    /// Open or create the ledger, replaying existing records.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        Self::with_tail_gen(path, Box::new(RandomTail))
    }

    /// Open with a custom tail generator (deterministic ids in tests).
    pub fn with_tail_gen(path: &Path, tails: Box<dyn TailGen>) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut runs: Vec<Run> = Vec::new();
        let mut index: HashMap<RunId, usize> = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Run>(&line) {
                    Ok(run) => match index.get(&run.id) {
                        Some(&i) => runs[i] = run,
                        None => {
                            index.insert(run.id.clone(), runs.len());
                            runs.push(run);
                        }
                    },
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            line = lineno + 1,
                            error = %e,
                            "skipping corrupt ledger line"
                        );
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            runs,
            index,
            tails,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a new run in `running` state. Returns its id.
    pub fn create_run(&mut self, task_id: &TaskId, attrs: NewRun) -> Result<RunId, LedgerError> {
        let id = self.fresh_run_id()?;
        let run = Run {
            id: id.clone(),
            task_id: task_id.clone(),
            agent: attrs.agent,
            model: attrs.model,
            session_id: attrs.session_id,
            pid: attrs.pid,
            runner_instance_id: attrs.runner_instance_id,
            started_at: Utc::now(),
            ended_at: None,
            exit_code: None,
            cost_usd: None,
            output: String::new(),
            status: RunStatus::Running,
        };
        self.append(&run)?;
        self.index.insert(id.clone(), self.runs.len());
        self.runs.push(run);
        Ok(id)
    }

    /// Merge a delta into the most recent run for a task.
    pub fn update_latest_run(
        &mut self,
        task_id: &TaskId,
        delta: RunDelta,
    ) -> Result<Run, LedgerError> {
        let i = self
            .runs
            .iter()
            .rposition(|r| &r.task_id == task_id)
            .ok_or_else(|| LedgerError::NoRuns(task_id.clone()))?;

        let mut run = self.runs[i].clone();
        merge(&mut run, delta);
        self.append(&run)?;
        self.runs[i] = run.clone();
        Ok(run)
    }

    /// The most recent run for a task, if any.
    pub fn latest_run(&self, task_id: &TaskId) -> Option<&Run> {
        self.runs.iter().rev().find(|r| &r.task_id == task_id)
    }

    /// All runs for a task, oldest first.
    pub fn runs_for(&self, task_id: &TaskId) -> Vec<&Run> {
        self.runs.iter().filter(|r| &r.task_id == task_id).collect()
    }

    /// Number of failed runs recorded for a task.
    pub fn failed_count(&self, task_id: &TaskId) -> u32 {
        self.runs
            .iter()
            .filter(|r| &r.task_id == task_id && r.status == RunStatus::Failed)
            .count() as u32
    }

    /// All runs, oldest first.
    pub fn all_runs(&self) -> &[Run] {
        &self.runs
    }

    /// Fail every `running` run whose process is gone.
    ///
    /// `pid_alive` is the liveness probe (a zero-signal to the pid in
    /// production). Returns the number of runs cleaned; a second sweep with
    /// no new runs cleans nothing.
    pub fn cleanup_orphaned_runs(
        &mut self,
        pid_alive: impl Fn(i32) -> bool,
    ) -> Result<usize, LedgerError> {
        let mut cleaned = 0;
        for i in 0..self.runs.len() {
            if self.runs[i].status != RunStatus::Running {
                continue;
            }
            let note = match self.runs[i].pid {
                None => "orphaned: no pid",
                Some(pid) if !pid_alive(pid) => "orphaned: pid dead",
                Some(_) => continue,
            };

            let mut run = self.runs[i].clone();
            run.status = RunStatus::Failed;
            run.exit_code = Some(-1);
            run.ended_at = Some(Utc::now());
            if run.output.is_empty() {
                run.output = note.to_string();
            } else {
                run.output.push('\n');
                run.output.push_str(note);
            }
            self.append(&run)?;
            self.runs[i] = run;
            cleaned += 1;
        }
        Ok(cleaned)
    }

    fn fresh_run_id(&self) -> Result<RunId, LedgerError> {
        for _ in 0..ID_RETRY_LIMIT {
            let id = RunId::new(IdKind::Run.compose(&self.tails.tail()));
            if !self.index.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(LedgerError::IdSpace(ID_RETRY_LIMIT))
    }

    fn append(&mut self, run: &Run) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(run)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        Ok(())
    }
}

fn merge(run: &mut Run, delta: RunDelta) {
    if let Some(pid) = delta.pid {
        run.pid = Some(pid);
    }
    if let Some(session_id) = delta.session_id {
        run.session_id = Some(session_id);
    }
    if let Some(model) = delta.model {
        run.model = Some(model);
    }
    if let Some(ended_at) = delta.ended_at {
        run.ended_at = Some(ended_at);
    }
    if let Some(exit_code) = delta.exit_code {
        run.exit_code = Some(exit_code);
    }
    if let Some(cost_usd) = delta.cost_usd {
        run.cost_usd = Some(cost_usd);
    }
    if let Some(output) = delta.output {
        run.output = output;
    }
    if let Some(status) = delta.status {
        run.status = status;
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
