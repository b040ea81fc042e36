//! Cascade delete scenarios against both store backends.
//!
//! Each scenario is written once over `EntityStore` and run against an
//! in-memory SQLite database and the `MemoryStore`.

use task_cascade::config::HierarchyConfig;
use task_cascade::db::Database;
use task_cascade::error::CascadeError;
use task_cascade::hierarchy::CascadeDeleter;
use task_cascade::store::{EntityStore, FaultPlan, MemoryStore, OrderBy, StoreError, TaskFilter};
use task_cascade::types::Task;

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn task(id: &str, parent: Option<&str>, created_at: i64) -> Task {
    let task = Task::new(id, format!("task {id}"), created_at);
    match parent {
        Some(p) => task.with_parent(p),
        None => task,
    }
}

async fn seed<S: EntityStore>(store: &S, tasks: &[Task]) {
    for t in tasks {
        store.create(t).await.expect("Failed to seed task");
    }
}

async fn snapshot<S: EntityStore>(store: &S) -> Vec<Task> {
    store
        .query(&TaskFilter::all(), OrderBy::CreatedAsc)
        .await
        .expect("Failed to snapshot store")
}

/// Every surviving parent pointer references a surviving task.
async fn assert_no_orphans<S: EntityStore>(store: &S, deleted: &[&str]) {
    for t in snapshot(store).await {
        if let Some(parent) = &t.parent_task_id {
            assert!(
                !deleted.contains(&parent.as_str()),
                "{} still points at deleted parent {}",
                t.id,
                parent
            );
        }
    }
}

fn chain(len: usize) -> Vec<Task> {
    (0..len)
        .map(|i| {
            let parent = (i > 0).then(|| format!("n{}", i - 1));
            task(&format!("n{i}"), parent.as_deref(), i as i64)
        })
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

async fn scenario_a<S: EntityStore>(store: S) {
    seed(
        &store,
        &[
            task("R", None, 1),
            task("C1", Some("R"), 2),
            task("C2", Some("R"), 3),
            task("G1", Some("C1"), 4),
            task("KEEP", None, 5),
        ],
    )
    .await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let report = cascade.delete("R").await.expect("cascade delete failed");

    assert_eq!(report.collected, 4);
    assert_eq!(report.deleted, 4);
    for id in ["R", "C1", "C2", "G1"] {
        assert!(cascade.store().get(id).await.unwrap().is_none(), "{id} survived");
    }
    let left = snapshot(cascade.store()).await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "KEEP");
    assert_no_orphans(cascade.store(), &["R", "C1", "C2", "G1"]).await;
}

async fn scenario_b<S: EntityStore>(store: S) {
    seed(&store, &chain(101)).await;
    let before = snapshot(&store).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let err = cascade.delete("n0").await.unwrap_err();

    assert_eq!(err, CascadeError::DepthExceeded("n100".to_string()));
    assert!(err.is_structural());
    assert_eq!(snapshot(cascade.store()).await, before);
}

async fn depth_limit_allows_exactly_max<S: EntityStore>(store: S) {
    seed(&store, &chain(100)).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let report = cascade.delete("n0").await.expect("100 levels should be allowed");

    assert_eq!(report.deleted, 100);
    assert_eq!(report.depth, 100);
    assert!(snapshot(cascade.store()).await.is_empty());
}

async fn scenario_c<S: EntityStore>(store: S) {
    seed(&store, &[task("A", Some("B"), 1), task("B", Some("A"), 2)]).await;
    let before = snapshot(&store).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let err = cascade.delete("A").await.unwrap_err();

    assert_eq!(err, CascadeError::CycleDetected("A".to_string()));
    assert!(!err.is_retryable());
    assert_eq!(snapshot(cascade.store()).await, before);
}

async fn scenario_d<S: EntityStore>(store: S) -> CascadeDeleter<S> {
    let mut tasks = vec![task("root", None, 0)];
    tasks.extend((0..50).map(|i| task(&format!("c{i:02}"), Some("root"), 1 + i as i64)));
    tasks.push(task("other", None, 100));
    seed(&store, &tasks).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let report = cascade.delete("root").await.expect("cascade delete failed");

    assert_eq!(report.deleted, 51);
    assert_eq!(report.depth, 2);
    assert_eq!(snapshot(cascade.store()).await.len(), 1);
    cascade
}

async fn missing_and_leaf_are_noops<S: EntityStore>(store: S) {
    seed(&store, &[task("P", None, 1), task("L", Some("P"), 2)]).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let report = cascade.delete("ghost").await.expect("missing id should succeed");
    assert_eq!(report.collected, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(snapshot(cascade.store()).await.len(), 2);

    let report = cascade.delete("L").await.expect("leaf delete failed");
    assert_eq!(report.deleted, 1);
    assert!(cascade.store().get("P").await.unwrap().is_some());

    // Retrying a completed delete is a no-op
    let report = cascade.delete("L").await.expect("repeat delete failed");
    assert_eq!(report.deleted, 0);
}

async fn cycle_with_healthy_branch<S: EntityStore>(store: S) {
    // Corrupted loop X -> Y -> Z -> X, with W a healthy child of Y
    seed(
        &store,
        &[
            task("X", Some("Z"), 1),
            task("Y", Some("X"), 2),
            task("Z", Some("Y"), 3),
            task("W", Some("Y"), 4),
        ],
    )
    .await;
    let before = snapshot(&store).await;
    let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

    let err = cascade.delete("Y").await.unwrap_err();

    assert_eq!(err, CascadeError::CycleDetected("Y".to_string()));
    assert_eq!(snapshot(cascade.store()).await, before);
}

mod sqlite {
    use super::*;

    #[tokio::test]
    async fn scenario_a_removes_root_children_and_grandchild() {
        scenario_a(setup_db()).await;
    }

    #[tokio::test]
    async fn scenario_b_101_level_chain_exceeds_depth() {
        scenario_b(setup_db()).await;
    }

    #[tokio::test]
    async fn exactly_100_levels_is_allowed() {
        depth_limit_allows_exactly_max(setup_db()).await;
    }

    #[tokio::test]
    async fn scenario_c_two_node_cycle() {
        scenario_c(setup_db()).await;
    }

    #[tokio::test]
    async fn scenario_d_fifty_children() {
        scenario_d(setup_db()).await;
    }

    #[tokio::test]
    async fn missing_id_and_leaf() {
        missing_and_leaf_are_noops(setup_db()).await;
    }

    #[tokio::test]
    async fn three_node_cycle() {
        cycle_with_healthy_branch(setup_db()).await;
    }

    #[tokio::test]
    async fn failing_delete_rolls_back_whole_batch() {
        let db = setup_db();
        let mut tasks = vec![task("root", None, 0)];
        tasks.extend((0..9).map(|i| task(&format!("c{i}"), Some("root"), 1 + i)));
        seed(&db, &tasks).await;
        let before = snapshot(&db).await;

        // Leaves are deleted first, so c4 fails after c8..c5 are gone
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_delete BEFORE DELETE ON tasks
                 WHEN old.id = 'c4'
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )?;
            Ok(())
        })
        .expect("Failed to install trigger");

        let cascade = CascadeDeleter::new(db, HierarchyConfig::default());
        let err = cascade.delete("root").await.unwrap_err();

        match &err {
            CascadeError::Storage(StoreError::DeleteFailed { id, reason }) => {
                assert_eq!(id, "c4");
                assert!(reason.contains("injected failure"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
        assert_eq!(snapshot(cascade.store()).await, before);
    }

    #[tokio::test]
    async fn late_child_trips_orphan_guard() {
        let db = setup_db();
        seed(&db, &[task("root", None, 0), task("a", Some("root"), 1)]).await;

        // Simulate a child inserted after collection: delete only the
        // collected ids while a new child exists.
        let cascade = CascadeDeleter::new(db.clone(), HierarchyConfig::default());
        let subtree = cascade.preview("root").await.unwrap();
        db.create(&task("late", Some("a"), 2)).await.unwrap();

        let err = db
            .delete_many(&subtree.leaves_first(), true.into())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Orphans(vec!["late".to_string()]));
        assert_eq!(snapshot(&db).await.len(), 3);

        // A fresh cascade picks the late child up
        let report = cascade.delete("root").await.unwrap();
        assert_eq!(report.deleted, 3);
    }

    #[tokio::test]
    async fn orphan_guard_lists_orphans_across_the_batch() {
        let db = setup_db();
        seed(
            &db,
            &[
                task("root", None, 0),
                task("a", Some("root"), 1),
                task("b", Some("root"), 2),
                task("x", Some("a"), 3),
                task("w", Some("b"), 4),
                task("v", Some("root"), 5),
            ],
        )
        .await;

        let batch = vec!["a".to_string(), "b".to_string(), "root".to_string()];
        let err = db.delete_many(&batch, true.into()).await.unwrap_err();

        assert_eq!(
            err,
            StoreError::Orphans(vec!["v".to_string(), "w".to_string(), "x".to_string()])
        );
        assert_eq!(snapshot(&db).await.len(), 6);
    }

    #[tokio::test]
    async fn orphan_guard_handles_large_batches() {
        let db = setup_db();
        let mut tasks = vec![task("root", None, 0)];
        tasks.extend((0..600).map(|i| task(&format!("c{i:03}"), Some("root"), 1 + i)));
        seed(&db, &tasks).await;
        db.create(&task("late", Some("c599"), 1000)).await.unwrap();

        let mut batch: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        batch.reverse();
        let err = db.delete_many(&batch, true.into()).await.unwrap_err();
        assert_eq!(err, StoreError::Orphans(vec!["late".to_string()]));

        db.delete_many(&["late".to_string()], true.into()).await.unwrap();
        let removed = db.delete_many(&batch, true.into()).await.unwrap();
        assert_eq!(removed, 601);
        assert!(snapshot(&db).await.is_empty());
    }

    #[tokio::test]
    async fn orphan_guard_can_be_disabled() {
        let db = setup_db();
        seed(&db, &[task("root", None, 0), task("a", Some("root"), 1)]).await;

        let removed = db
            .delete_many(&["root".to_string()], false.into())
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let left = snapshot(&db).await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].parent_task_id.as_deref(), Some("root"));
    }
}

mod memory {
    use super::*;

    #[tokio::test]
    async fn scenario_a_removes_root_children_and_grandchild() {
        scenario_a(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn scenario_b_101_level_chain_exceeds_depth() {
        scenario_b(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn exactly_100_levels_is_allowed() {
        depth_limit_allows_exactly_max(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn scenario_c_two_node_cycle() {
        scenario_c(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn scenario_d_fifty_children_in_one_transaction() {
        let cascade = scenario_d(MemoryStore::new()).await;
        let stats = cascade.store().stats().unwrap();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.deletes_attempted, 51);
        // One children query per collected task, plus the final snapshot
        assert_eq!(stats.queries, 51 + 1);
    }

    #[tokio::test]
    async fn missing_id_and_leaf() {
        missing_and_leaf_are_noops(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn three_node_cycle() {
        cycle_with_healthy_branch(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn failure_after_n_of_m_deletes_leaves_nothing_deleted() {
        for n in [0, 1, 3, 7] {
            let store = MemoryStore::new();
            let mut tasks = vec![task("root", None, 0)];
            tasks.extend((0..7).map(|i| task(&format!("c{i}"), Some("root"), 1 + i)));
            seed(&store, &tasks).await;
            let before = store.snapshot().unwrap();
            store.set_faults(FaultPlan::fail_after_deletes(n)).unwrap();

            let cascade = CascadeDeleter::new(store, HierarchyConfig::default());
            let err = cascade.delete("root").await.unwrap_err();

            assert!(matches!(err, CascadeError::Storage(StoreError::DeleteFailed { .. })));
            assert_eq!(cascade.store().snapshot().unwrap(), before, "n = {n}");
            let stats = cascade.store().stats().unwrap();
            assert_eq!(stats.deletes_attempted, n + 1);
            assert_eq!(stats.commits, 0);
            assert_eq!(stats.rollbacks, 1);
        }
    }

    #[tokio::test]
    async fn structural_error_never_opens_a_transaction() {
        let store = MemoryStore::new();
        seed(&store, &[task("A", Some("B"), 1), task("B", Some("A"), 2)]).await;
        let cascade = CascadeDeleter::new(store, HierarchyConfig::default());

        assert!(cascade.delete("A").await.is_err());

        let stats = cascade.store().stats().unwrap();
        assert_eq!(stats.deletes_attempted, 0);
        assert_eq!(stats.commits + stats.rollbacks, 0);
    }

    #[tokio::test]
    async fn depth_limit_is_configurable() {
        let store = MemoryStore::new();
        seed(&store, &chain(10)).await;
        let cascade = CascadeDeleter::new(store, HierarchyConfig::default().with_max_depth(9));

        let err = cascade.delete("n0").await.unwrap_err();
        assert_eq!(err, CascadeError::DepthExceeded("n9".to_string()));
        // The lower part of the chain fits
        assert_eq!(cascade.delete("n1").await.unwrap().deleted, 9);
    }
}
