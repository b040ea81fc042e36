//! Task persistence and the [`EntityStore`] implementation for [`Database`].

use super::Database;
use crate::store::{
    EntityStore, OrderBy, OrphanGuard, ParentFilter, StoreError, StoreResult, TaskFilter,
};
use crate::types::{Task, TaskStatus};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use tracing::debug;

/// Build an ORDER BY clause for the given ordering.
/// Every ordering ends with the id so results are stable.
fn build_order_clause(order: OrderBy) -> &'static str {
    match order {
        OrderBy::CreatedAsc => "t.created_at ASC, t.id ASC",
        OrderBy::CreatedDesc => "t.created_at DESC, t.id ASC",
        OrderBy::UpdatedDesc => "t.updated_at DESC, t.id ASC",
        OrderBy::PriorityDesc => "t.priority DESC, t.id ASC",
    }
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    let status = TaskStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index("status").unwrap_or(0),
            Type::Text,
            format!("unknown task status '{status_str}'").into(),
        )
    })?;

    let tags_json: String = row.get("tags")?;
    let metadata_json: Option<String> = row.get("metadata")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status,
        tags: serde_json::from_str::<BTreeSet<String>>(&tags_json).unwrap_or_default(),
        project_id: row.get("project_id")?,
        parent_task_id: row.get("parent_task_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
        estimated_minutes: row.get("estimated_minutes")?,
        actual_minutes: row.get("actual_minutes")?,
        priority: row.get("priority")?,
        metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

/// Serialized forms of the JSON-encoded columns.
struct EncodedColumns {
    tags: String,
    metadata: Option<String>,
}

fn encode_columns(task: &Task) -> StoreResult<EncodedColumns> {
    Ok(EncodedColumns {
        tags: serde_json::to_string(&task.tags)?,
        metadata: task.metadata.as_ref().map(serde_json::to_string).transpose()?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> StoreResult<Option<Task>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM tasks WHERE id = ?1")?;

    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Surviving tasks whose parent is one of the ids in `deleted_json`, sorted.
/// Runs as a single statement regardless of batch size.
fn find_orphans(conn: &Connection, deleted_json: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM tasks
         WHERE parent_task_id IN (SELECT value FROM json_each(?1))
         ORDER BY id",
    )?;
    let orphans = stmt
        .query_map(params![deleted_json], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(orphans)
}

impl Database {
    pub fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Insert a task. The parent pointer is stored as given; it is not checked.
    pub fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let cols = encode_columns(task)?;

        self.with_conn(|conn| {
            if get_task_internal(conn, &task.id)?.is_some() {
                return Err(StoreError::AlreadyExists(task.id.clone()));
            }

            conn.execute(
                "INSERT INTO tasks (
                    id, title, description, status, tags, project_id, parent_task_id,
                    created_at, updated_at, completed_at, estimated_minutes, actual_minutes,
                    priority, metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    cols.tags,
                    task.project_id,
                    task.parent_task_id,
                    task.created_at,
                    task.updated_at,
                    task.completed_at,
                    task.estimated_minutes,
                    task.actual_minutes,
                    task.priority,
                    cols.metadata,
                ],
            )?;
            Ok(())
        })
    }

    /// Replace every column of an existing task.
    pub fn replace_task(&self, task: &Task) -> StoreResult<()> {
        let cols = encode_columns(task)?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET
                    title = ?2, description = ?3, status = ?4, tags = ?5, project_id = ?6,
                    parent_task_id = ?7, created_at = ?8, updated_at = ?9, completed_at = ?10,
                    estimated_minutes = ?11, actual_minutes = ?12, priority = ?13, metadata = ?14
                 WHERE id = ?1",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.status.as_str(),
                    cols.tags,
                    task.project_id,
                    task.parent_task_id,
                    task.created_at,
                    task.updated_at,
                    task.completed_at,
                    task.estimated_minutes,
                    task.actual_minutes,
                    task.priority,
                    cols.metadata,
                ],
            )?;

            if changed == 0 {
                return Err(StoreError::NotFound(task.id.clone()));
            }
            Ok(())
        })
    }

    /// List tasks matching a filter.
    pub fn list_tasks(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut sql = String::from("SELECT t.* FROM tasks t WHERE 1 = 1");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            match &filter.parent {
                Some(ParentFilter::Is(pid)) => {
                    sql.push_str(" AND t.parent_task_id = ?");
                    params_vec.push(Box::new(pid.clone()));
                }
                Some(ParentFilter::Root) => sql.push_str(" AND t.parent_task_id IS NULL"),
                None => {}
            }

            if let Some(status) = filter.status {
                sql.push_str(" AND t.status = ?");
                params_vec.push(Box::new(status.as_str()));
            }

            if let Some(project) = &filter.project_id {
                sql.push_str(" AND t.project_id = ?");
                params_vec.push(Box::new(project.clone()));
            }

            sql.push_str(" ORDER BY ");
            sql.push_str(build_order_clause(order));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(tasks)
        })
    }

    /// Delete every id inside one transaction.
    ///
    /// Dropping the transaction without commit rolls it back, so any early
    /// return leaves the table untouched.
    pub fn delete_tasks(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize> {
        let deleted_json = serde_json::to_string(ids)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;

            {
                let mut delete = tx.prepare_cached("DELETE FROM tasks WHERE id = ?1")?;
                for id in ids {
                    removed += delete.execute(params![id]).map_err(|e| {
                        debug!(id = %id, error = %e, "Delete failed, rolling back batch");
                        StoreError::DeleteFailed {
                            id: id.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                }
            }

            if guard == OrphanGuard::Enforce {
                let orphans = find_orphans(&tx, &deleted_json)?;
                if !orphans.is_empty() {
                    return Err(StoreError::Orphans(orphans));
                }
            }

            tx.commit()?;
            Ok(removed)
        })
    }

    /// Total number of tasks.
    pub fn count_tasks(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    /// Run a blocking database call on the tokio blocking pool.
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Backend(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl EntityStore for Database {
    async fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        let id = id.to_string();
        self.blocking(move |db| db.get_task(&id)).await
    }

    async fn create(&self, task: &Task) -> StoreResult<()> {
        let task = task.clone();
        self.blocking(move |db| db.insert_task(&task)).await
    }

    async fn update(&self, task: &Task) -> StoreResult<()> {
        let task = task.clone();
        self.blocking(move |db| db.replace_task(&task)).await
    }

    async fn query(&self, filter: &TaskFilter, order: OrderBy) -> StoreResult<Vec<Task>> {
        let filter = filter.clone();
        self.blocking(move |db| db.list_tasks(&filter, order)).await
    }

    async fn delete_many(&self, ids: &[String], guard: OrphanGuard) -> StoreResult<usize> {
        let ids = ids.to_vec();
        self.blocking(move |db| db.delete_tasks(&ids, guard)).await
    }
}
