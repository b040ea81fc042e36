//! Output formatting for CLI results.

use crate::types::{DeleteReport, Task, TaskTree};
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One task per line
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// One line per task: id, status, title.
pub fn format_task_line(task: &Task) -> String {
    format!("{}  [{}]  {}", task.id, task.status, task.title)
}

pub fn format_task_list(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(format_task_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Indented outline of a tree, two spaces per level.
pub fn format_tree(tree: &TaskTree) -> String {
    let mut lines = Vec::new();
    let mut stack: Vec<(&TaskTree, usize)> = vec![(tree, 0)];
    while let Some((node, indent)) = stack.pop() {
        lines.push(format!("{}{}", "  ".repeat(indent), format_task_line(&node.task)));
        for child in node.children.iter().rev() {
            stack.push((child, indent + 1));
        }
    }
    lines.join("\n")
}

pub fn format_delete_report(report: &DeleteReport) -> String {
    format!(
        "Deleted {} of {} task(s) under {} (depth {})",
        report.deleted, report.collected, report.root_id, report.depth
    )
}

/// Pretty JSON for any serializable result.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
