//! All-or-nothing batch deletion.

use crate::error::{CascadeError, CascadeResult};
use crate::store::{EntityStore, OrphanGuard, StoreError};
use tracing::{error, info, warn};

/// Deletes a set of ids inside one store transaction.
pub struct BatchDeleter<'a, S: ?Sized> {
    store: &'a S,
    guard: OrphanGuard,
}

impl<'a, S: EntityStore + ?Sized> BatchDeleter<'a, S> {
    pub fn new(store: &'a S, guard: OrphanGuard) -> Self {
        Self { store, guard }
    }

    /// Delete every id, or none of them.
    ///
    /// Returns the number of rows removed. An empty slice is a no-op and
    /// never opens a transaction.
    ///
    /// # Errors
    ///
    /// - [`CascadeError::SubtreeChanged`] when surviving tasks would point at
    ///   a deleted id (orphan guard enabled).
    /// - [`CascadeError::Storage`] for any other failure; the batch was rolled
    ///   back by the store.
    pub async fn delete_all(&self, ids: &[String]) -> CascadeResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        match self.store.delete_many(ids, self.guard).await {
            Ok(removed) => {
                if removed < ids.len() {
                    warn!(
                        requested = ids.len(),
                        removed, "Some tasks were already gone at delete time"
                    );
                }
                info!(removed, "Committed delete batch");
                Ok(removed)
            }
            Err(StoreError::Orphans(orphans)) => {
                warn!(
                    orphans = orphans.len(),
                    "Delete batch rolled back: tasks were added under the subtree"
                );
                Err(CascadeError::SubtreeChanged { orphans })
            }
            Err(e) => {
                error!(requested = ids.len(), error = %e, "Delete batch rolled back");
                Err(CascadeError::Storage(e))
            }
        }
    }
}
