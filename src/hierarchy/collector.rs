//! Subtree collection with cycle and depth checks.
//!
//! The walk is an explicit depth-first worklist of `(id, depth)` pairs. One
//! `visited` set is shared across the whole walk. Because every task has at
//! most one parent, a well-formed hierarchy never reaches the same id twice;
//! a repeat visit therefore means the stored parent pointers form a cycle.

use super::reader::HierarchyReader;
use crate::error::{CascadeError, CascadeResult};
use crate::store::EntityStore;
use crate::types::Task;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ids reachable from a root, in visit order (root first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeIds {
    ids: Vec<String>,
    depth: usize,
}

impl SubtreeIds {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Deepest level reached; the root is level 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ids ordered so every task comes before its parent.
    pub fn leaves_first(&self) -> Vec<String> {
        self.ids.iter().rev().cloned().collect()
    }
}

/// Walks the hierarchy below a root.
pub struct HierarchyCollector<'a, S: ?Sized> {
    reader: HierarchyReader<'a, S>,
    max_depth: usize,
}

impl<'a, S: EntityStore + ?Sized> HierarchyCollector<'a, S> {
    pub fn new(store: &'a S, max_depth: usize) -> Self {
        Self {
            reader: HierarchyReader::new(store),
            max_depth,
        }
    }

    /// Every id in the subtree rooted at `root_id`, including `root_id`.
    ///
    /// The root does not have to exist; a missing root yields just itself.
    ///
    /// # Errors
    ///
    /// - [`CascadeError::CycleDetected`] when an id is reached twice.
    /// - [`CascadeError::DepthExceeded`] when a task sits below `max_depth`.
    /// - [`CascadeError::Storage`] when a children query fails.
    pub async fn collect_subtree_ids(&self, root_id: &str) -> CascadeResult<SubtreeIds> {
        self.walk(root_id, |_, _| {}).await
    }

    /// Same walk as [`collect_subtree_ids`](Self::collect_subtree_ids), handing
    /// each visited id and its children to `on_children`.
    pub async fn walk<F>(&self, root_id: &str, mut on_children: F) -> CascadeResult<SubtreeIds>
    where
        F: FnMut(&str, Vec<Task>),
    {
        let mut visited: HashSet<String> = HashSet::new();
        let mut ids = Vec::new();
        let mut deepest = 0;
        let mut stack: Vec<(String, usize)> = vec![(root_id.to_string(), 1)];

        while let Some((id, depth)) = stack.pop() {
            if visited.contains(&id) {
                warn!(root = %root_id, id = %id, depth, "Cycle in task hierarchy");
                return Err(CascadeError::CycleDetected(id));
            }

            if depth > self.max_depth {
                warn!(
                    root = %root_id,
                    id = %id,
                    max_depth = self.max_depth,
                    "Task hierarchy too deep"
                );
                return Err(CascadeError::DepthExceeded(id));
            }

            visited.insert(id.clone());
            deepest = deepest.max(depth);

            let children = self.reader.find_children(&id).await?;
            debug!(id = %id, depth, children = children.len(), "Visited task");

            // Reverse so the oldest child is popped first
            for child in children.iter().rev() {
                stack.push((child.id.clone(), depth + 1));
            }

            on_children(&id, children);
            ids.push(id);
        }

        Ok(SubtreeIds {
            ids,
            depth: deepest,
        })
    }
}
