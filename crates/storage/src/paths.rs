// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State directory layout.
//!
//! Everything fuel persists lives under one directory, `<cwd>/.fuel/` by
//! default, overridable via `FUEL_STATE_DIR`:
//!
//! ```text
//! .fuel/
//!   config.toml            agent registry, complexity map, ports
//!   store.db               entity store (tasks, epics, backlog)
//!   store.lock             advisory lock serializing store writers
//!   runs.jsonl             append-only run ledger
//!   processes/<task_id>/   per-task stdout.log / stderr.log
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the state directory location.
pub const STATE_DIR_ENV: &str = "FUEL_STATE_DIR";

/// Default state directory name under the working directory.
pub const STATE_DIR_NAME: &str = ".fuel";

/// Resolved state directory paths.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from the environment: `FUEL_STATE_DIR` if set, else
    /// `<cwd>/.fuel`.
    pub fn resolve(cwd: &Path) -> Self {
        match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(PathBuf::from(dir)),
            _ => Self::new(cwd.join(STATE_DIR_NAME)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join("store.db")
    }

    pub fn store_lock_path(&self) -> PathBuf {
        self.root.join("store.lock")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("runs.jsonl")
    }

    pub fn processes_dir(&self) -> PathBuf {
        self.root.join("processes")
    }

    /// Log directory for one task's agent process.
    pub fn task_log_dir(&self, task_id: &str) -> PathBuf {
        self.processes_dir().join(task_id)
    }

    /// Create the state directory tree. An unwritable location surfaces as
    /// the underlying I/O error (the daemon maps this to its own exit code).
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.processes_dir())
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
