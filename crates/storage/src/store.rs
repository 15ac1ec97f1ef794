// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable entity store for tasks, epics, and backlog items.
//!
//! The store is a single JSON document written atomically (temp file, fsync,
//! rename). Mutations run inside an exclusive advisory file lock so
//! concurrent CLI invocations and the daemon serialize through a single
//! writer boundary: lock, reload, apply, save. Queries read the latest
//! on-disk state and never block writers.

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use thiserror::Error;

use fuel_core::epic::{Epic, EpicId, EpicStatus};
use fuel_core::id::{IdKind, RandomTail, TailGen};
use fuel_core::task::{Complexity, Priority, Size, Task, TaskId, TaskStatus, TaskType};
use fuel_core::{BacklogId, BacklogItem};

use crate::paths::StateDir;

/// Attempts at generating an unused id tail before giving up.
const ID_RETRY_LIMIT: u32 = 100;

/// Errors from store operations. Domain errors are distinct from I/O.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: IdKind, id: String },

    #[error("ambiguous id '{partial}': matches {}", .matches.join(", "))]
    Ambiguous {
        partial: String,
        matches: Vec<String>,
    },

    #[error("{0}")]
    Validation(String),

    #[error("adding dependency {task} -> {blocker} would create a cycle")]
    DependencyCycle { task: TaskId, blocker: TaskId },

    #[error("{task} is not blocked by {blocker}")]
    MissingDependency { task: TaskId, blocker: TaskId },

    #[error("could not generate a unique id after {0} attempts")]
    IdSpace(u32),

    #[error("store file is corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn not_found(kind: IdKind, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// The persisted entity families.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
    #[serde(default)]
    pub epics: BTreeMap<EpicId, Epic>,
    #[serde(default)]
    pub backlog: BTreeMap<BacklogId, BacklogItem>,
}

impl StoreState {
    /// Whether every blocker of `task` is closed.
    fn blockers_closed(&self, task: &Task) -> bool {
        task.blocked_by
            .iter()
            .all(|id| self.tasks.get(id).map_or(true, |t| t.is_closed()))
    }

    /// Ready tasks: open with all blockers closed, sorted by ascending
    /// priority then ascending creation time.
    pub fn ready(&self) -> Vec<&Task> {
        let mut out: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Open && self.blockers_closed(t))
            .collect();
        out.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        out
    }

    /// Open tasks with at least one non-closed blocker.
    pub fn blocked(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Open && !self.blockers_closed(t))
            .collect()
    }

    pub fn in_progress(&self) -> Vec<&Task> {
        self.by_status(TaskStatus::InProgress)
    }

    pub fn review(&self) -> Vec<&Task> {
        self.by_status(TaskStatus::Review)
    }

    pub fn done(&self) -> Vec<&Task> {
        self.by_status(TaskStatus::Closed)
    }

    /// Open tasks carrying the `needs-human` label.
    pub fn needs_human(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Open && t.needs_human())
            .collect()
    }

    fn by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.status == status).collect()
    }

    /// Derived status of an epic from its linked tasks.
    pub fn epic_status(&self, epic: &Epic) -> EpicStatus {
        epic.derived_status(
            self.tasks
                .values()
                .filter(|t| t.epic_id.as_ref() == Some(&epic.id)),
        )
    }

    /// Resolve a partial id within one kind. The partial matches an id when
    /// it is a suffix of the id's alphanumeric tail; resolution succeeds
    /// only when exactly one live id matches.
    pub fn resolve(&self, kind: IdKind, partial: &str) -> Result<String, StoreError> {
        let candidates: Vec<&str> = match kind {
            IdKind::Task => self.tasks.keys().map(|id| id.as_str()).collect(),
            IdKind::Epic => self.epics.keys().map(|id| id.as_str()).collect(),
            IdKind::Backlog => self.backlog.keys().map(|id| id.as_str()).collect(),
            // Runs live in the ledger, not the store
            IdKind::Run => Vec::new(),
        };

        let matches: Vec<&str> = candidates
            .into_iter()
            .filter(|id| fuel_core::id::partial_matches(kind, id, partial))
            .collect();

        match matches.as_slice() {
            [] => Err(StoreError::not_found(kind, partial)),
            [only] => Ok((*only).to_string()),
            many => Err(StoreError::Ambiguous {
                partial: partial.to_string(),
                matches: many.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    /// Whether adding `task -> blocker` would close a cycle in the
    /// `task -> blockers` graph (i.e. `blocker` transitively depends on
    /// `task`).
    pub fn would_create_cycle(&self, task: &TaskId, blocker: &TaskId) -> bool {
        let mut stack = vec![blocker.clone()];
        let mut seen: BTreeSet<TaskId> = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if &current == task {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(t) = self.tasks.get(&current) {
                stack.extend(t.blocked_by.iter().cloned());
            }
        }
        false
    }

    fn task(&self, id: &TaskId) -> Result<&Task, StoreError> {
        self.tasks
            .get(id)
            .ok_or_else(|| StoreError::not_found(IdKind::Task, id.as_str()))
    }

    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, StoreError> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(IdKind::Task, id.as_str()))
    }
}

/// Fields for task creation.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: Priority,
    pub labels: BTreeSet<String>,
    pub complexity: Complexity,
    pub size: Option<Size>,
    pub blocked_by: BTreeSet<TaskId>,
    pub epic_id: Option<EpicId>,
}

/// Durable store handle. Cheap to construct; every operation goes to disk.
pub struct Store {
    dir: StateDir,
    tails: Box<dyn TailGen>,
}

impl Store {
    /// Open a store rooted at the given state directory.
    pub fn open(dir: StateDir) -> Self {
        Self {
            dir,
            tails: Box::new(RandomTail),
        }
    }

    /// Open with a custom tail generator (deterministic ids in tests).
    pub fn with_tail_gen(dir: StateDir, tails: Box<dyn TailGen>) -> Self {
        Self { dir, tails }
    }

    pub fn state_dir(&self) -> &StateDir {
        &self.dir
    }

    /// Load the latest on-disk state. A missing file is an empty store.
    pub fn load(&self) -> Result<StoreState, StoreError> {
        let path = self.dir.store_path();
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let file = File::open(&path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Run a mutation inside the writer lock: reload, apply, save
    /// atomically. A failing closure leaves the store untouched.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.dir.ensure()?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.store_lock_path())?;
        lock.lock_exclusive()?;

        let result = (|| {
            let mut state = self.load()?;
            let out = f(&mut state)?;
            self.save(&state)?;
            Ok(out)
        })();

        // Dropping the handle releases the advisory lock either way
        let _ = fs2::FileExt::unlock(&lock);
        result
    }

    /// Write the state atomically: temp file, fsync, rename.
    fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        let path = self.dir.store_path();
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, state)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    // ── Task operations ─────────────────────────────────────────────────

    /// Create a task. Blockers and the epic link must already exist.
    pub fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        if new.title.trim().is_empty() {
            return Err(StoreError::Validation("task title is empty".to_string()));
        }
        let tails = &self.tails;
        self.mutate(move |state| {
            for blocker in &new.blocked_by {
                if !state.tasks.contains_key(blocker) {
                    return Err(StoreError::not_found(IdKind::Task, blocker.as_str()));
                }
            }
            if let Some(ref epic_id) = new.epic_id {
                if !state.epics.contains_key(epic_id) {
                    return Err(StoreError::not_found(IdKind::Epic, epic_id.as_str()));
                }
            }

            let id = TaskId::new(gen_unused_id(tails.as_ref(), IdKind::Task, |id| {
                state.tasks.contains_key(id)
            })?);
            let now = Utc::now();
            let task = Task {
                id: id.clone(),
                title: new.title,
                description: new.description,
                status: TaskStatus::Open,
                task_type: new.task_type,
                priority: new.priority,
                labels: new.labels,
                complexity: new.complexity,
                size: new.size,
                blocked_by: new.blocked_by,
                epic_id: new.epic_id,
                reason: None,
                commit_hash: None,
                created_at: now,
                updated_at: now,
            };
            state.tasks.insert(id, task.clone());
            Ok(task)
        })
    }

    /// Close a task. A no-op when the task is already closed.
    pub fn close_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            if task.status != TaskStatus::Closed {
                task.status = TaskStatus::Closed;
                task.updated_at = Utc::now();
            }
            Ok(task.clone())
        })
    }

    /// Move a task to a new lifecycle status.
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, StoreError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            task.status = status;
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
    }

    /// Add a label to a task (idempotent).
    pub fn add_task_label(&self, id: &TaskId, label: &str) -> Result<Task, StoreError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            if task.labels.insert(label.to_string()) {
                task.updated_at = Utc::now();
            }
            Ok(task.clone())
        })
    }

    /// Record the commit that completed a task.
    pub fn set_commit_hash(&self, id: &TaskId, commit: &str) -> Result<Task, StoreError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            task.commit_hash = Some(commit.to_string());
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
    }

    /// Record a failure reason on a task.
    pub fn set_task_reason(&self, id: &TaskId, reason: &str) -> Result<Task, StoreError> {
        self.mutate(|state| {
            let task = state.task_mut(id)?;
            task.reason = Some(reason.to_string());
            task.updated_at = Utc::now();
            Ok(task.clone())
        })
    }

    /// Delete a task, stripping it from other tasks' blocker sets.
    pub fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        self.mutate(|state| {
            if state.tasks.remove(id).is_none() {
                return Err(StoreError::not_found(IdKind::Task, id.as_str()));
            }
            strip_blocker(state, id);
            Ok(())
        })
    }

    /// Defer a task: delete it and insert a backlog item copying title and
    /// description, in one critical section.
    pub fn defer_task(&self, id: &TaskId) -> Result<BacklogItem, StoreError> {
        let tails = &self.tails;
        self.mutate(move |state| {
            let task = state
                .tasks
                .remove(id)
                .ok_or_else(|| StoreError::not_found(IdKind::Task, id.as_str()))?;
            strip_blocker(state, id);

            let backlog_id = BacklogId::new(gen_unused_id(tails.as_ref(), IdKind::Backlog, |id| {
                state.backlog.contains_key(id)
            })?);
            let item = BacklogItem {
                id: backlog_id.clone(),
                title: task.title,
                description: task.description,
                created_at: Utc::now(),
            };
            state.backlog.insert(backlog_id, item.clone());
            Ok(item)
        })
    }

    /// Add a dependency edge `task -> blocker`. Rejects self-loops,
    /// unknown ids, duplicate edges, and cycles.
    pub fn add_dependency(&self, task: &TaskId, blocker: &TaskId) -> Result<(), StoreError> {
        self.mutate(|state| {
            if task == blocker {
                return Err(StoreError::Validation(format!(
                    "{task} cannot block itself"
                )));
            }
            state.task(blocker)?;
            if state.task(task)?.blocked_by.contains(blocker) {
                return Err(StoreError::Validation(format!(
                    "{task} is already blocked by {blocker}"
                )));
            }
            if state.would_create_cycle(task, blocker) {
                return Err(StoreError::DependencyCycle {
                    task: task.clone(),
                    blocker: blocker.clone(),
                });
            }
            let t = state.task_mut(task)?;
            t.blocked_by.insert(blocker.clone());
            t.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Remove a dependency edge. Errors when the edge is absent.
    pub fn remove_dependency(&self, task: &TaskId, blocker: &TaskId) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.task(blocker)?;
            let t = state.task_mut(task)?;
            if !t.blocked_by.remove(blocker) {
                return Err(StoreError::MissingDependency {
                    task: task.clone(),
                    blocker: blocker.clone(),
                });
            }
            t.updated_at = Utc::now();
            Ok(())
        })
    }

    // ── Epic operations ─────────────────────────────────────────────────

    pub fn create_epic(
        &self,
        title: String,
        description: Option<String>,
    ) -> Result<Epic, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation("epic title is empty".to_string()));
        }
        let tails = &self.tails;
        self.mutate(move |state| {
            let id = EpicId::new(gen_unused_id(tails.as_ref(), IdKind::Epic, |id| {
                state.epics.contains_key(id)
            })?);
            let epic = Epic {
                id: id.clone(),
                title,
                description,
                reviewed_at: None,
                created_at: Utc::now(),
            };
            state.epics.insert(id, epic.clone());
            Ok(epic)
        })
    }

    /// Link a task to an epic.
    pub fn link_task_to_epic(&self, task: &TaskId, epic: &EpicId) -> Result<(), StoreError> {
        self.mutate(|state| {
            if !state.epics.contains_key(epic) {
                return Err(StoreError::not_found(IdKind::Epic, epic.as_str()));
            }
            let t = state.task_mut(task)?;
            t.epic_id = Some(epic.clone());
            t.updated_at = Utc::now();
            Ok(())
        })
    }

    /// Mark an epic reviewed (the only way `reviewed_at` is ever set).
    pub fn mark_epic_reviewed(&self, id: &EpicId) -> Result<Epic, StoreError> {
        self.mutate(|state| {
            let epic = state
                .epics
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found(IdKind::Epic, id.as_str()))?;
            epic.reviewed_at = Some(Utc::now());
            Ok(epic.clone())
        })
    }

    // ── Backlog operations ──────────────────────────────────────────────

    pub fn create_backlog_item(
        &self,
        title: String,
        description: Option<String>,
    ) -> Result<BacklogItem, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::Validation(
                "backlog title is empty".to_string(),
            ));
        }
        let tails = &self.tails;
        self.mutate(move |state| {
            let id = BacklogId::new(gen_unused_id(tails.as_ref(), IdKind::Backlog, |id| {
                state.backlog.contains_key(id)
            })?);
            let item = BacklogItem {
                id: id.clone(),
                title,
                description,
                created_at: Utc::now(),
            };
            state.backlog.insert(id, item.clone());
            Ok(item)
        })
    }

    /// Promote a backlog item into an open task.
    pub fn promote_backlog_item(&self, id: &BacklogId) -> Result<Task, StoreError> {
        let tails = &self.tails;
        self.mutate(move |state| {
            let item = state
                .backlog
                .remove(id)
                .ok_or_else(|| StoreError::not_found(IdKind::Backlog, id.as_str()))?;

            let task_id = TaskId::new(gen_unused_id(tails.as_ref(), IdKind::Task, |id| {
                state.tasks.contains_key(id)
            })?);
            let now = Utc::now();
            let task = Task {
                id: task_id.clone(),
                title: item.title,
                description: item.description,
                status: TaskStatus::Open,
                task_type: TaskType::default(),
                priority: Priority::default(),
                labels: BTreeSet::new(),
                complexity: Complexity::default(),
                size: None,
                blocked_by: BTreeSet::new(),
                epic_id: None,
                reason: None,
                commit_hash: None,
                created_at: now,
                updated_at: now,
            };
            state.tasks.insert(task_id, task.clone());
            Ok(task)
        })
    }

    pub fn delete_backlog_item(&self, id: &BacklogId) -> Result<(), StoreError> {
        self.mutate(|state| {
            state
                .backlog
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(IdKind::Backlog, id.as_str()))
        })
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn task(&self, id: &TaskId) -> Result<Task, StoreError> {
        Ok(self.load()?.task(id)?.clone())
    }

    pub fn epic(&self, id: &EpicId) -> Result<Epic, StoreError> {
        let state = self.load()?;
        state
            .epics
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(IdKind::Epic, id.as_str()))
    }

    /// Resolve a partial id within one kind to a full id.
    pub fn resolve_short_id(&self, kind: IdKind, partial: &str) -> Result<String, StoreError> {
        self.load()?.resolve(kind, partial)
    }
}

/// Remove `id` from every task's blocker set.
fn strip_blocker(state: &mut StoreState, id: &TaskId) {
    for task in state.tasks.values_mut() {
        task.blocked_by.remove(id);
    }
}

/// Generate an id of `kind` whose tail is not yet taken, with collision
/// retry.
fn gen_unused_id(
    tails: &dyn TailGen,
    kind: IdKind,
    taken: impl Fn(&str) -> bool,
) -> Result<String, StoreError> {
    for _ in 0..ID_RETRY_LIMIT {
        let id = kind.compose(&tails.tail());
        if !taken(&id) {
            return Ok(id);
        }
    }
    Err(StoreError::IdSpace(ID_RETRY_LIMIT))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
