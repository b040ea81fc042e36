//! Nested subtree views.

use super::collector::HierarchyCollector;
use crate::error::CascadeResult;
use crate::store::EntityStore;
use crate::types::{Task, TaskTree};
use std::collections::HashMap;

/// Load `root_id` with all of its descendants as a nested tree.
///
/// Returns `None` when the root does not exist. Uses the same bounded,
/// cycle-checked walk as cascade deletion.
pub async fn load_tree<S>(store: &S, root_id: &str, max_depth: usize) -> CascadeResult<Option<TaskTree>>
where
    S: EntityStore + ?Sized,
{
    let Some(root) = store.get(root_id).await? else {
        return Ok(None);
    };

    let mut tasks: HashMap<String, Task> = HashMap::new();
    let mut child_ids: HashMap<String, Vec<String>> = HashMap::new();

    let subtree = HierarchyCollector::new(store, max_depth)
        .walk(root_id, |id, children| {
            child_ids.insert(id.to_string(), children.iter().map(|c| c.id.clone()).collect());
            tasks.extend(children.into_iter().map(|c| (c.id.clone(), c)));
        })
        .await?;
    tasks.insert(root.id.clone(), root);

    // Children always precede their parent in leaves-first order
    let mut built: HashMap<String, TaskTree> = HashMap::new();
    for id in subtree.leaves_first() {
        let children = child_ids
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|cid| built.remove(&cid))
            .collect();
        if let Some(task) = tasks.remove(&id) {
            built.insert(id, TaskTree { task, children });
        }
    }

    Ok(built.remove(root_id))
}
