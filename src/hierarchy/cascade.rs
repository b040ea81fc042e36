//! Cascade delete: collect the whole subtree, then delete it in one batch.
//!
//! The walk runs outside any transaction and only the final batch of point
//! deletes is transactional. A task attached under the subtree between the
//! two phases is caught by the store's orphan guard (when enabled); a task
//! moved out of the subtree in that window is still deleted.

use super::collector::{HierarchyCollector, SubtreeIds};
use super::deleter::BatchDeleter;
use crate::config::HierarchyConfig;
use crate::error::CascadeResult;
use crate::store::{EntityStore, OrphanGuard};
use crate::types::DeleteReport;
use tracing::{info, warn};

/// Public entry point for deleting tasks.
pub struct CascadeDeleter<S> {
    store: S,
    config: HierarchyConfig,
}

impl<S: EntityStore> CascadeDeleter<S> {
    pub fn new(store: S, config: HierarchyConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Ids that [`delete`](Self::delete) would remove, without mutating.
    pub async fn preview(&self, root_id: &str) -> CascadeResult<SubtreeIds> {
        HierarchyCollector::new(&self.store, self.config.max_depth)
            .collect_subtree_ids(root_id)
            .await
    }

    /// Delete `root_id` and every task below it.
    ///
    /// Nothing is deleted unless everything is. Deleting an id that does not
    /// exist succeeds with `deleted == 0`.
    ///
    /// The orphan guard is on by default. A task attached under the subtree
    /// after the walk then fails the delete with [`SubtreeChanged`] instead
    /// of being left pointing at a deleted parent. With
    /// `hierarchy.orphan_guard` off, the delete succeeds and the late task
    /// is orphaned.
    ///
    /// # Errors
    ///
    /// Structural errors ([`CycleDetected`], [`DepthExceeded`]) are returned
    /// as raised by the walk; retrying will not help. Storage and
    /// subtree-changed errors may succeed on retry.
    ///
    /// [`CycleDetected`]: crate::error::CascadeError::CycleDetected
    /// [`DepthExceeded`]: crate::error::CascadeError::DepthExceeded
    /// [`SubtreeChanged`]: crate::error::CascadeError::SubtreeChanged
    pub async fn delete(&self, root_id: &str) -> CascadeResult<DeleteReport> {
        let subtree = match self.preview(root_id).await {
            Ok(subtree) => subtree,
            Err(e) => {
                if e.is_structural() {
                    warn!(root = %root_id, code = ?e.code(), "Refusing to delete corrupted hierarchy: {}", e);
                }
                return Err(e);
            }
        };

        let deleter = BatchDeleter::new(&self.store, OrphanGuard::from(self.config.orphan_guard));
        let deleted = deleter.delete_all(&subtree.leaves_first()).await?;

        info!(
            root = %root_id,
            collected = subtree.len(),
            deleted,
            depth = subtree.depth(),
            "Cascade delete complete"
        );

        Ok(DeleteReport {
            root_id: root_id.to_string(),
            collected: subtree.len(),
            deleted,
            depth: subtree.depth(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CascadeError;
    use crate::store::{FaultPlan, MemoryStore, OrderBy, StoreResult, TaskFilter};
    use crate::types::Task;
    use async_trait::async_trait;

    /// Attaches a new child under `parent` right before the first delete
    /// batch, as a concurrent writer would.
    struct LateInsert {
        inner: MemoryStore,
        parent: &'static str,
    }

    #[async_trait]
    impl EntityStore for LateInsert {
        async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
            self.inner.get(id).await
        }

        async fn create(&self, task: &Task) -> StoreResult<()> {
            self.inner.create(task).await
        }

        async fn update(&self, task: &Task) -> StoreResult<()> {
            self.inner.update(task).await
        }

        async fn query(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>> {
            self.inner.query(filter, order).await
        }

        async fn delete_many(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize> {
            if self.inner.get("late").await?.is_none() {
                self.inner
                    .create(&Task::new("late", "late", 99).with_parent(self.parent))
                    .await?;
            }
            self.inner.delete_many(ids, guard).await
        }
    }

    fn scenario_a() -> MemoryStore {
        MemoryStore::with_tasks([
            Task::new("R", "root", 0),
            Task::new("C1", "child 1", 1).with_parent("R"),
            Task::new("C2", "child 2", 2).with_parent("R"),
            Task::new("G1", "grandchild", 3).with_parent("C1"),
            Task::new("X", "unrelated", 4),
        ])
    }

    #[tokio::test]
    async fn deletes_whole_subtree() {
        let cascade = CascadeDeleter::new(scenario_a(), HierarchyConfig::default());

        let report = cascade.delete("R").await.unwrap();

        assert_eq!(report.collected, 4);
        assert_eq!(report.deleted, 4);
        assert_eq!(report.depth, 3);
        let left = cascade.store().snapshot().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "X");
    }

    #[tokio::test]
    async fn preview_does_not_mutate() {
        let cascade = CascadeDeleter::new(scenario_a(), HierarchyConfig::default());
        let subtree = cascade.preview("C1").await.unwrap();
        assert_eq!(subtree.ids(), ["C1", "G1"]);
        assert_eq!(cascade.store().len().unwrap(), 5);
    }

    #[tokio::test]
    async fn read_failure_deletes_nothing() {
        let store = scenario_a();
        store.set_faults(FaultPlan::fail_children_of("C1")).unwrap();
        let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

        let err = cascade.delete("R").await.unwrap_err();

        assert!(matches!(err, CascadeError::Storage(_)));
        assert_eq!(cascade.store().len().unwrap(), 5);
        assert_eq!(cascade.store().stats().unwrap().deletes_attempted, 0);
    }

    #[tokio::test]
    async fn late_child_fails_delete_by_default() {
        let store = LateInsert {
            inner: scenario_a(),
            parent: "C1",
        };
        let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

        let err = cascade.delete("R").await.unwrap_err();

        assert_eq!(
            err,
            CascadeError::SubtreeChanged {
                orphans: vec!["late".to_string()]
            }
        );
        assert!(err.is_retryable());
        assert_eq!(cascade.store().inner.len().unwrap(), 6);

        // The retry walks the late child too
        let report = cascade.delete("R").await.unwrap();
        assert_eq!(report.deleted, 5);
        assert_eq!(cascade.store().inner.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn late_child_is_orphaned_when_guard_is_off() {
        let store = LateInsert {
            inner: scenario_a(),
            parent: "C1",
        };
        let config = HierarchyConfig {
            orphan_guard: false,
            ..HierarchyConfig::default()
        };
        let cascade = CascadeDeleter::new(store, config);

        let report = cascade.delete("R").await.unwrap();

        assert_eq!(report.deleted, 4);
        let left = cascade.store().inner.snapshot().unwrap();
        let late = left.iter().find(|t| t.id == "late").unwrap();
        assert_eq!(late.parent_task_id.as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn configured_depth_applies() {
        let config = HierarchyConfig::default().with_max_depth(2);
        let cascade = CascadeDeleter::new(scenario_a(), config);

        let err = cascade.delete("R").await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("G1".to_string()));
        assert!(cascade.delete("C1").await.is_ok());
    }
}
