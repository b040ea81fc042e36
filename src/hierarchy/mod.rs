//! Task hierarchy traversal and cascade deletion.
//!
//! Tasks form a forest through their `parent_task_id` pointers. The store
//! has no cascading delete, so removing a task means finding its whole
//! subtree first ([`HierarchyCollector`]) and then deleting every id in one
//! transaction ([`BatchDeleter`]). [`CascadeDeleter`] composes the two.

pub mod cascade;
pub mod collector;
pub mod deleter;
pub mod reader;
pub mod reparent;
pub mod tree;

pub use cascade::CascadeDeleter;
pub use collector::{HierarchyCollector, SubtreeIds};
pub use deleter::BatchDeleter;
pub use reader::HierarchyReader;
pub use reparent::{ancestors, reparent};
pub use tree::load_tree;
