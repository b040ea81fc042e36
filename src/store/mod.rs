//! Entity store client.
//!
//! The hierarchy code talks to persistence only through [`EntityStore`]. Every
//! response is a typed [`StoreResult`]; backend-specific failures are folded
//! into [`StoreError`] before they leave an implementation.

pub mod memory;

use crate::types::{Task, TaskStatus};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::{FaultPlan, MemoryStore};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    /// A single delete inside a batch failed; the batch was rolled back.
    #[error("delete of {id} failed: {reason}")]
    DeleteFailed { id: String, reason: String },

    /// Surviving tasks still point at ids removed by the batch; the batch was
    /// rolled back.
    #[error("{} task(s) would be orphaned: {}", .0.len(), .0.join(", "))]
    Orphans(Vec<String>),

    /// Failure produced by a [`FaultPlan`].
    #[error("injected failure: {0}")]
    Injected(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Parent-pointer predicate for [`TaskFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentFilter {
    /// Tasks without a parent.
    Root,
    /// Tasks whose `parent_task_id` equals the given id.
    Is(String),
}

/// Conjunctive filter over task fields. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub parent: Option<ParentFilter>,
    pub status: Option<TaskStatus>,
    pub project_id: Option<String>,
}

impl TaskFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn children_of(parent_id: &str) -> Self {
        Self {
            parent: Some(ParentFilter::Is(parent_id.to_string())),
            ..Self::default()
        }
    }

    pub fn roots() -> Self {
        Self {
            parent: Some(ParentFilter::Root),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Evaluate the filter against a task in memory.
    pub fn matches(&self, task: &Task) -> bool {
        let parent_ok = match &self.parent {
            None => true,
            Some(ParentFilter::Root) => task.parent_task_id.is_none(),
            Some(ParentFilter::Is(pid)) => task.parent_task_id.as_deref() == Some(pid.as_str()),
        };
        let status_ok = self.status.is_none_or(|s| task.status == s);
        let project_ok = self
            .project_id
            .as_deref()
            .is_none_or(|p| task.project_id.as_deref() == Some(p));
        parent_ok && status_ok && project_ok
    }
}

/// Sort order for [`EntityStore::query`]. Ties are broken by id ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    CreatedAsc,
    CreatedDesc,
    UpdatedDesc,
    PriorityDesc,
}

impl OrderBy {
    /// Compare two tasks under this ordering.
    pub fn compare(&self, a: &Task, b: &Task) -> std::cmp::Ordering {
        let primary = match self {
            OrderBy::CreatedAsc => a.created_at.cmp(&b.created_at),
            OrderBy::CreatedDesc => b.created_at.cmp(&a.created_at),
            OrderBy::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
            OrderBy::PriorityDesc => b.priority.cmp(&a.priority),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Whether `delete_many` should refuse to leave surviving tasks pointing at a
/// deleted id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanGuard {
    Enforce,
    Skip,
}

impl From<bool> for OrphanGuard {
    fn from(enforce: bool) -> Self {
        if enforce {
            OrphanGuard::Enforce
        } else {
            OrphanGuard::Skip
        }
    }
}

/// Task persistence contract.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Point lookup. Returns `None` when the task does not exist.
    async fn get(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Insert a new task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] when the id is taken.
    async fn create(&self, task: &Task) -> StoreResult<()>;

    /// Replace an existing task, including its parent pointer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> StoreResult<()>;

    /// All tasks matching `filter`, sorted by `order`.
    async fn query(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>>;

    /// Delete every id in one transaction.
    ///
    /// Either all rows are removed or none are. Ids that do not exist are
    /// skipped. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Any failing delete rolls the whole batch back. With
    /// [`OrphanGuard::Enforce`], a batch that would leave a surviving task
    /// pointing at a removed id fails with [`StoreError::Orphans`].
    async fn delete_many(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize>;
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStore for std::sync::Arc<S> {
    async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        (**self).get(id).await
    }

    async fn create(&self, task: &Task) -> StoreResult<()> {
        (**self).create(task).await
    }

    async fn update(&self, task: &Task) -> StoreResult<()> {
        (**self).update(task).await
    }

    async fn query(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>> {
        (**self).query(filter, order).await
    }

    async fn delete_many(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize> {
        (**self).delete_many(ids, guard).await
    }
}
