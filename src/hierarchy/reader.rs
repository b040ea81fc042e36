//! Parent-pointer lookups.

use crate::store::{EntityStore, OrderBy, StoreResult, TaskFilter};
use crate::types::Task;

/// Read-only view of the task hierarchy.
pub struct HierarchyReader<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: EntityStore + ?Sized> HierarchyReader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Direct children of `parent_id`, oldest first.
    ///
    /// A parent with no children, or one that does not exist, yields an empty
    /// vector.
    pub async fn find_children(&self, parent_id: &str) -> StoreResult<Vec<Task>> {
        self.store
            .query(&TaskFilter::children_of(parent_id), OrderBy::CreatedAsc)
            .await
    }

    /// Tasks without a parent, oldest first.
    pub async fn find_roots(&self) -> StoreResult<Vec<Task>> {
        self.store
            .query(&TaskFilter::roots(), OrderBy::CreatedAsc)
            .await
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        self.store.get(id).await
    }
}
