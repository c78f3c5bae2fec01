//! Crash/resume scenarios against SqliteRepository.

#![cfg(feature = "sqlite")]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rewind_core::{
    ExecutionContext, JobStatus, RunError, Runner, SqliteConfig, SqliteRepository, Wrapped,
};
use sqlx::sqlite::SqlitePoolOptions;

async fn shared_pool() -> sqlx::SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// A fresh repository over `pool`, as a restarted process would build it.
async fn reopen(pool: &sqlx::SqlitePool) -> Arc<SqliteRepository> {
    let repo = SqliteRepository::new(pool.clone());
    repo.run_migrations().await.unwrap();
    Arc::new(repo)
}

struct Tree {
    parent: Wrapped<i64, i64>,
    child_runs: Arc<AtomicUsize>,
    parent_runs: Arc<AtomicUsize>,
}

/// parent(n) = child(n) + 1, where child(n) = n * 10.
/// The parent body fails while `crash` is set, after its child committed.
fn build_tree(runner: &Runner, crash: bool) -> Tree {
    let child_runs = Arc::new(AtomicUsize::new(0));
    let parent_runs = Arc::new(AtomicUsize::new(0));

    let child = {
        let child_runs = child_runs.clone();
        runner.wrap("child", move |_cx, n: i64| {
            child_runs.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n * 10) }
        })
    };

    let parent = {
        let parent_runs = parent_runs.clone();
        runner.wrap("parent", move |cx, n: i64| {
            parent_runs.fetch_add(1, Ordering::SeqCst);
            let child = child.clone();
            async move {
                let c = child.call(&cx, n).await?;
                if crash {
                    return Err(RunError::failed("process died"));
                }
                Ok(c + 1)
            }
        })
    };

    Tree {
        parent,
        child_runs,
        parent_runs,
    }
}

#[tokio::test]
async fn restart_skips_committed_child() {
    let pool = shared_pool().await;

    // first run: child commits, parent never does
    let first = build_tree(&Runner::new(reopen(&pool).await), true);
    let err = first
        .parent
        .call(&ExecutionContext::root(), 3)
        .await
        .unwrap_err();
    assert!(err.is_task_failure());
    assert_eq!(first.child_runs.load(Ordering::SeqCst), 1);

    // restart with the same store
    let repo = reopen(&pool).await;
    let second = build_tree(&Runner::new(repo.clone()), false);
    let result = second
        .parent
        .call(&ExecutionContext::root(), 3)
        .await
        .unwrap();

    assert_eq!(result, 31);
    assert_eq!(second.parent_runs.load(Ordering::SeqCst), 1);
    assert_eq!(second.child_runs.load(Ordering::SeqCst), 0);

    let rows = repo.rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status == JobStatus::Done));

    // third run: everything resolves from the store
    let third = build_tree(&Runner::new(reopen(&pool).await), false);
    assert_eq!(
        third
            .parent
            .call(&ExecutionContext::root(), 3)
            .await
            .unwrap(),
        31
    );
    assert_eq!(third.parent_runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn every_child_points_at_an_earlier_row() {
    let repo = Arc::new(
        SqliteRepository::connect(&SqliteConfig::in_memory())
            .await
            .unwrap(),
    );
    let runner = Runner::new(repo.clone());

    let leaf = runner.wrap("leaf", |_cx, d: u64| async move { Ok(d) });
    let branch = runner.wrap("branch", move |cx, id: u64| {
        let leaf = leaf.clone();
        async move {
            let left = cx.fork();
            let right = cx.fork();
            let (a, b) = tokio::join!(leaf.call(&left, 10), leaf.call(&right, 20));
            Ok::<_, RunError>(id + a? + b?)
        }
    });
    let root = runner.wrap("root", move |cx, (): ()| {
        let branch = branch.clone();
        async move {
            let mut total = 0;
            for id in 0..3 {
                total += branch.call(&cx, id).await?;
            }
            Ok::<_, RunError>(total)
        }
    });

    assert_eq!(root.call(&ExecutionContext::root(), ()).await.unwrap(), 93);

    let rows = repo.rows().await.unwrap();
    // root + 3 branches + 2 leaves per branch
    assert_eq!(rows.len(), 10);

    let mut seen = HashSet::new();
    for row in &rows {
        match row.parent_id {
            None => assert_eq!(row.function_id, "root"),
            Some(parent) => assert!(seen.contains(&parent), "{row:?} precedes its parent"),
        }
        seen.insert(row.id);
    }

    let counts = repo.counts_by_status().await.unwrap();
    assert_eq!(counts.done, 10);
}
