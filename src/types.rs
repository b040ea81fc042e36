//! Core types for the task hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Task priority as an integer (higher = more important).
/// Default is 0.
pub type Priority = i32;

pub const PRIORITY_DEFAULT: Priority = 0;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "inProgress" | "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task record.
///
/// `parent_task_id` is a single-valued pointer to another task. The store does
/// not check that the parent exists, so readers must tolerate dangling and
/// (in corrupted data) cyclic pointers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub project_id: Option<String>,
    pub parent_task_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
    pub estimated_minutes: Option<i64>,
    pub actual_minutes: Option<i64>,
    #[serde(default)]
    pub priority: Priority,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Task {
    /// Build a new `todo` task with both timestamps set to `now`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            tags: BTreeSet::new(),
            project_id: None,
            parent_task_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            estimated_minutes: None,
            actual_minutes: None,
            priority: PRIORITY_DEFAULT,
            metadata: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_id.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_task_id.is_none()
    }
}

/// A task with its children for tree views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskTree>,
}

impl TaskTree {
    /// Number of tasks in this tree, including the root.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TaskTree::len).sum::<usize>()
    }
}

/// Outcome of a successful cascade delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub root_id: String,
    /// Ids gathered by the subtree walk (root included).
    pub collected: usize,
    /// Rows the store actually removed. Lower than `collected` when the root
    /// did not exist or a record vanished between walk and delete.
    pub deleted: usize,
    /// Deepest level reached; the root is level 1.
    pub depth: usize,
}
