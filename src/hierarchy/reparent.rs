//! Moving tasks within the hierarchy without creating cycles.

use super::collector::HierarchyCollector;
use crate::db::now_ms;
use crate::error::{CascadeError, CascadeResult};
use crate::store::{EntityStore, StoreError};
use crate::types::Task;
use std::collections::HashSet;
use tracing::{debug, info};

/// Ancestors of `id`, nearest parent first.
///
/// Stops at a root or at a parent pointer that references a missing task.
///
/// # Errors
///
/// [`CascadeError::CycleDetected`] when the parent chain loops, and
/// [`CascadeError::DepthExceeded`] when `id` sits deeper than `max_depth`.
pub async fn ancestors<S>(store: &S, id: &str, max_depth: usize) -> CascadeResult<Vec<String>>
where
    S: EntityStore + ?Sized,
{
    let mut chain: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
    let mut current = store.get(id).await?.and_then(|t| t.parent_task_id);

    while let Some(pid) = current {
        let Some(parent) = store.get(&pid).await? else {
            debug!(id = %id, parent = %pid, "Dangling parent pointer");
            break;
        };
        if !seen.insert(pid.clone()) {
            return Err(CascadeError::CycleDetected(pid));
        }
        // Levels so far: id itself plus every ancestor
        if chain.len() + 2 > max_depth {
            return Err(CascadeError::DepthExceeded(id.to_string()));
        }
        chain.push(pid);
        current = parent.parent_task_id;
    }

    Ok(chain)
}

/// Point `task_id` at `new_parent` (or detach it to a root with `None`).
///
/// Refuses moves that would put a task below itself or push its subtree past
/// `max_depth`.
///
/// # Errors
///
/// - [`CascadeError::Storage`] with [`StoreError::NotFound`] when the task or
///   the new parent does not exist.
/// - [`CascadeError::CycleDetected`] when `new_parent` is `task_id` or one of
///   its descendants.
/// - [`CascadeError::DepthExceeded`] when the moved subtree would be too deep.
pub async fn reparent<S>(
    store: &S,
    task_id: &str,
    new_parent: Option<&str>,
    max_depth: usize,
) -> CascadeResult<Task>
where
    S: EntityStore + ?Sized,
{
    let mut task = store
        .get(task_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;

    if let Some(pid) = new_parent {
        if pid == task_id {
            return Err(CascadeError::CycleDetected(task_id.to_string()));
        }
        if store.get(pid).await?.is_none() {
            return Err(StoreError::NotFound(pid.to_string()).into());
        }

        let above = ancestors(store, pid, max_depth).await?;
        if above.iter().any(|a| a == task_id) {
            return Err(CascadeError::CycleDetected(task_id.to_string()));
        }

        let subtree = HierarchyCollector::new(store, max_depth)
            .collect_subtree_ids(task_id)
            .await?;
        // new parent's level + height of the moved subtree
        let parent_level = above.len() + 1;
        if parent_level + subtree.depth() > max_depth {
            return Err(CascadeError::DepthExceeded(task_id.to_string()));
        }
    }

    task.parent_task_id = new_parent.map(str::to_string);
    task.updated_at = now_ms();
    store.update(&task).await?;

    info!(task = %task_id, parent = ?new_parent, "Task moved");
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::with_tasks([
            Task::new("a", "a", 0),
            Task::new("b", "b", 1).with_parent("a"),
            Task::new("c", "c", 2).with_parent("b"),
            Task::new("d", "d", 3),
        ])
    }

    #[tokio::test]
    async fn ancestors_nearest_first() {
        let s = store();
        assert_eq!(ancestors(&s, "c", 100).await.unwrap(), vec!["b", "a"]);
        assert!(ancestors(&s, "a", 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ancestors_stop_at_dangling_parent() {
        let s = MemoryStore::with_tasks([Task::new("x", "x", 0).with_parent("gone")]);
        assert!(ancestors(&s, "x", 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ancestors_detect_cycle() {
        let s = MemoryStore::with_tasks([
            Task::new("x", "x", 0).with_parent("y"),
            Task::new("y", "y", 1).with_parent("z"),
            Task::new("z", "z", 2).with_parent("y"),
        ]);
        let err = ancestors(&s, "x", 100).await.unwrap_err();
        assert_eq!(err, CascadeError::CycleDetected("y".to_string()));
    }

    #[tokio::test]
    async fn ancestors_enforce_depth() {
        // c sits at level 3
        let s = store();
        assert_eq!(ancestors(&s, "c", 3).await.unwrap(), vec!["b", "a"]);

        let err = ancestors(&s, "c", 2).await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("c".to_string()));
    }

    #[tokio::test]
    async fn move_below_too_deep_parent_is_rejected() {
        // c is already at level 3, so d cannot go under it with max 3
        let s = store();
        let err = reparent(&s, "d", Some("c"), 3).await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("d".to_string()));

        let err = reparent(&s, "d", Some("c"), 2).await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("c".to_string()));
        assert!(s.get("d").await.unwrap().unwrap().is_root());
    }

    #[tokio::test]
    async fn move_under_descendant_is_rejected() {
        let s = store();
        let err = reparent(&s, "a", Some("c"), 100).await.unwrap_err();
        assert_eq!(err, CascadeError::CycleDetected("a".to_string()));
        let err = reparent(&s, "a", Some("a"), 100).await.unwrap_err();
        assert_eq!(err, CascadeError::CycleDetected("a".to_string()));
        assert_eq!(s.get("a").await.unwrap().unwrap().parent_task_id, None);
    }

    #[tokio::test]
    async fn move_and_detach() {
        let s = store();
        let moved = reparent(&s, "b", Some("d"), 100).await.unwrap();
        assert_eq!(moved.parent_task_id.as_deref(), Some("d"));
        assert_eq!(ancestors(&s, "c", 100).await.unwrap(), vec!["b", "d"]);

        let detached = reparent(&s, "b", None, 100).await.unwrap();
        assert!(detached.is_root());
    }

    #[tokio::test]
    async fn move_respects_depth() {
        // d is level 1 and b's subtree is 2 levels high
        let s = store();
        assert!(reparent(&s, "b", Some("d"), 3).await.is_ok());

        // a's subtree is 3 levels high
        let s = store();
        let err = reparent(&s, "a", Some("d"), 3).await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("a".to_string()));
    }

    #[tokio::test]
    async fn missing_parent_is_not_found() {
        let s = store();
        let err = reparent(&s, "b", Some("nope"), 100).await.unwrap_err();
        assert_eq!(err, CascadeError::Storage(StoreError::NotFound("nope".into())));
    }
}
