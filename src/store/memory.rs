//! In-process [`EntityStore`] with deterministic fault injection.
//!
//! Deletes are staged against a copy of the table and swapped in only when
//! the whole batch succeeds, so a failure at any point leaves the visible
//! state untouched.

use super::{EntityStore, OrderBy, OrphanGuard, StoreError, StoreResult, TaskFilter};
use crate::types::Task;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Failures to inject into a [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Fail a delete batch once this many deletes have been applied.
    pub fail_after_deletes: Option<usize>,
    /// Fail a delete batch when it reaches this id.
    pub fail_delete_of: Option<String>,
    /// Fail any query for the children of this id.
    pub fail_children_of: Option<String>,
}

impl FaultPlan {
    pub fn fail_after_deletes(n: usize) -> Self {
        Self {
            fail_after_deletes: Some(n),
            ..Self::default()
        }
    }

    pub fn fail_delete_of(id: impl Into<String>) -> Self {
        Self {
            fail_delete_of: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn fail_children_of(id: impl Into<String>) -> Self {
        Self {
            fail_children_of: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Operation counters, for asserting round trips and transaction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub queries: usize,
    pub deletes_attempted: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Default)]
struct MemoryState {
    tasks: HashMap<String, Task>,
    faults: FaultPlan,
    stats: MemoryStats,
}

/// Task store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `tasks`, without any validation.
    /// Useful for seeding corrupted hierarchies.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        }
        store
    }

    /// Replace the active fault plan.
    pub fn set_faults(&self, faults: FaultPlan) -> StoreResult<()> {
        self.lock()?.faults = faults;
        Ok(())
    }

    pub fn stats(&self) -> StoreResult<MemoryStats> {
        Ok(self.lock()?.stats)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.tasks.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every task, sorted by id.
    pub fn snapshot(&self) -> StoreResult<Vec<Task>> {
        let state = self.lock()?;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.lock()?.tasks.get(id).cloned())
    }

    async fn create(&self, task: &Task) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(task.id.clone()));
        }
        state.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> StoreResult<()> {
        let mut state = self.lock()?;
        match state.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(task.id.clone())),
        }
    }

    async fn query(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>> {
        let mut state = self.lock()?;
        state.stats.queries += 1;

        if let (Some(super::ParentFilter::Is(pid)), Some(failing)) =
            (&filter.parent, &state.faults.fail_children_of)
        {
            if pid == failing {
                return Err(StoreError::Injected(format!("children query for {pid}")));
            }
        }

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| order.compare(a, b));
        Ok(tasks)
    }

    async fn delete_many(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize> {
        let mut state = self.lock()?;
        let mut staged = state.tasks.clone();
        let mut removed = 0;

        for (applied, id) in ids.iter().enumerate() {
            state.stats.deletes_attempted += 1;

            let fail_here = state.faults.fail_after_deletes == Some(applied)
                || state.faults.fail_delete_of.as_deref() == Some(id.as_str());
            if fail_here {
                state.stats.rollbacks += 1;
                debug!(id = %id, applied, "Injected delete failure, rolling back");
                return Err(StoreError::DeleteFailed {
                    id: id.clone(),
                    reason: StoreError::Injected(format!("after {applied} deletes")).to_string(),
                });
            }

            if staged.remove(id).is_some() {
                removed += 1;
            }
        }

        if guard == OrphanGuard::Enforce {
            let deleted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let mut orphans: Vec<String> = staged
                .values()
                .filter(|t| {
                    t.parent_task_id
                        .as_deref()
                        .is_some_and(|p| deleted.contains(p))
                })
                .map(|t| t.id.clone())
                .collect();
            if !orphans.is_empty() {
                orphans.sort();
                state.stats.rollbacks += 1;
                return Err(StoreError::Orphans(orphans));
            }
        }

        state.tasks = staged;
        state.stats.commits += 1;
        Ok(removed)
    }
}
