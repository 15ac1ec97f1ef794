// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity: the unit of coding work the daemon dispatches to agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task (`f-` prefix).
    pub struct TaskId;
}

/// Label that escalates a task to a human and stops automatic dispatch.
pub const NEEDS_HUMAN_LABEL: &str = "needs-human";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up (may still be blocked by dependencies)
    Open,
    /// An agent is working on it
    InProgress,
    /// Primary run succeeded; awaiting a review run
    Review,
    /// Terminal
    Closed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Open => write!(f, "open"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Category of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Feature,
    Bug,
    Chore,
    Refactor,
    Docs,
    Other,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Feature => write!(f, "feature"),
            TaskType::Bug => write!(f, "bug"),
            TaskType::Chore => write!(f, "chore"),
            TaskType::Refactor => write!(f, "refactor"),
            TaskType::Docs => write!(f, "docs"),
            TaskType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(TaskType::Feature),
            "bug" => Ok(TaskType::Bug),
            "chore" => Ok(TaskType::Chore),
            "refactor" => Ok(TaskType::Refactor),
            "docs" => Ok(TaskType::Docs),
            "other" => Ok(TaskType::Other),
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}

/// Validation failures on task field values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("priority must be between 0 and 4, got {0}")]
    PriorityOutOfRange(u8),

    #[error("unknown task type: {0}")]
    UnknownType(String),

    #[error("unknown complexity: {0} (expected simple, moderate, or complex)")]
    UnknownComplexity(String),

    #[error("unknown size: {0} (expected s, m, or l)")]
    UnknownSize(String),
}

/// Urgency of a task. Lower is more urgent; only `0..=4` are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Priority(u8);

impl Priority {
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > Self::MAX {
            Err(ValidationError::PriorityOutOfRange(value))
        } else {
            Ok(Self(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(2)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Priority::new(value).map_err(serde::de::Error::custom)
    }
}

/// Rough difficulty estimate, used to route a task to an agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Complexity::Simple),
            "moderate" => Ok(Complexity::Moderate),
            "complex" => Ok(Complexity::Complex),
            other => Err(ValidationError::UnknownComplexity(other.to_string())),
        }
    }
}

/// Rough size estimate (informational only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    S,
    M,
    L,
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::S => write!(f, "s"),
            Size::M => write!(f, "m"),
            Size::L => write!(f, "l"),
        }
    }
}

impl std::str::FromStr for Size {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Size::S),
            "m" => Ok(Size::M),
            "l" => Ok(Size::L),
            other => Err(ValidationError::UnknownSize(other.to_string())),
        }
    }
}

/// A unit of coding work.
///
/// Tasks are tagged structures: records with unknown fields are rejected at
/// deserialization rather than carried along as open maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Tasks that must close before this one becomes ready
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked_by: BTreeSet<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<crate::epic::EpicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn needs_human(&self) -> bool {
        self.labels.contains(NEEDS_HUMAN_LABEL)
    }

    pub fn is_closed(&self) -> bool {
        self.status == TaskStatus::Closed
    }
}

/// Builder for `Task` with test defaults.
#[cfg(any(test, feature = "test-support"))]
pub struct TaskBuilder {
    task: Task,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            task: Task {
                id: TaskId::new("f-00001"),
                title: "test task".to_string(),
                description: None,
                status: TaskStatus::Open,
                task_type: TaskType::Feature,
                priority: Priority::default(),
                labels: BTreeSet::new(),
                complexity: Complexity::Simple,
                size: None,
                blocked_by: BTreeSet::new(),
                epic_id: None,
                reason: None,
                commit_hash: None,
                created_at: DateTime::UNIX_EPOCH,
                updated_at: DateTime::UNIX_EPOCH,
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TaskBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.task.id = TaskId::new(v);
        self
    }
    pub fn title(mut self, v: impl Into<String>) -> Self {
        self.task.title = v.into();
        self
    }
    pub fn status(mut self, v: TaskStatus) -> Self {
        self.task.status = v;
        self
    }
    pub fn priority(mut self, v: u8) -> Self {
        self.task.priority = Priority::new(v).unwrap_or_default();
        self
    }
    pub fn complexity(mut self, v: Complexity) -> Self {
        self.task.complexity = v;
        self
    }
    pub fn label(mut self, v: impl Into<String>) -> Self {
        self.task.labels.insert(v.into());
        self
    }
    pub fn blocked_by(mut self, v: impl Into<String>) -> Self {
        self.task.blocked_by.insert(TaskId::new(v));
        self
    }
    pub fn epic(mut self, v: impl Into<String>) -> Self {
        self.task.epic_id = Some(crate::epic::EpicId::new(v));
        self
    }
    pub fn created_at(mut self, v: DateTime<Utc>) -> Self {
        self.task.created_at = v;
        self
    }
    pub fn build(self) -> Task {
        self.task
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Task {
    /// Create a builder with test defaults.
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
