//! Concurrency tests for the lease pool and the coordinator under load.
//!
//! Verifies mutual exclusion (never more than N holders over N resources),
//! release hygiene, and the capacity-exhaustion story from the in-memory
//! side of the store contract.

use std::collections::HashSet;
use std::sync::Arc;

use corral::config::CoordinatorConfig;
use corral::coordinator::{JobCoordinatorBuilder, RunOutcome, NO_RESOURCE_MESSAGE};
use corral::pool::ResourcePool;
use corral::run::RunId;
use corral_testkit::{
    login_request, vault_for_resources, ExecutorScript, InMemoryResourcePool, InMemoryRunLedger,
    ScriptedExecutor,
};

#[tokio::test]
async fn concurrent_acquires_never_exceed_pool_size() {
    let pool = Arc::new(InMemoryResourcePool::with_resources(3));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            pool.acquire(RunId::new()).await.unwrap()
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(resource) = handle.await.unwrap() {
            claimed.push(resource);
        }
    }

    assert_eq!(claimed.len(), 3, "exactly pool-size claims succeed");
    let distinct: HashSet<_> = claimed.iter().map(|r| r.id.clone()).collect();
    assert_eq!(distinct.len(), 3, "no resource was handed out twice");
    assert_eq!(pool.available_count().await.unwrap(), 0);
}

#[tokio::test]
async fn release_is_idempotent_and_scoped_to_the_holder() {
    let pool = InMemoryResourcePool::with_resources(2);

    let holder_a = RunId::new();
    let holder_b = RunId::new();
    pool.acquire(holder_a).await.unwrap().expect("claim a");
    pool.acquire(holder_b).await.unwrap().expect("claim b");

    pool.release(holder_a).await.unwrap();
    assert_eq!(pool.available_count().await.unwrap(), 1);

    // Releasing again, or releasing a run that holds nothing, changes nothing.
    pool.release(holder_a).await.unwrap();
    pool.release(RunId::new()).await.unwrap();
    assert_eq!(pool.available_count().await.unwrap(), 1);
    assert!(pool.held_by(holder_b).is_some());
}

#[tokio::test]
async fn snapshot_counts_track_claims() {
    let pool = InMemoryResourcePool::with_resources(3);
    let holder = RunId::new();
    pool.acquire(holder).await.unwrap().expect("claim");

    let snapshot = pool.snapshot().await.unwrap();
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.available, 2);
    assert_eq!(snapshot.locked, 1);

    pool.release(holder).await.unwrap();
    let snapshot = pool.snapshot().await.unwrap();
    assert_eq!(snapshot.available, 3);
    assert_eq!(snapshot.locked, 0);
}

/// Two cases race for two resources, a third finds the pool empty, and a
/// fourth succeeds once capacity frees up.
#[tokio::test]
async fn coordinator_under_contention_serves_pool_size_and_recovers() {
    let resources = 2;
    let pool = Arc::new(InMemoryResourcePool::with_resources(resources));
    let ledger = Arc::new(InMemoryRunLedger::new());
    let executor = Arc::new(ScriptedExecutor::new());

    let coordinator = Arc::new(
        JobCoordinatorBuilder::new(CoordinatorConfig::default())
            .with_pool(Arc::clone(&pool))
            .with_ledger(Arc::clone(&ledger))
            .with_vault(Arc::new(vault_for_resources(resources)))
            .with_executor(Arc::clone(&executor))
            .build()
            .expect("coordinator builds"),
    );

    let mut handles = Vec::new();
    for case in ["case-a", "case-b"] {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.handle(login_request(case)).await
        }));
    }
    for handle in handles {
        let handled = handle.await.unwrap();
        assert!(
            matches!(handled.outcome, RunOutcome::Completed { .. }),
            "got {:?}",
            handled.outcome
        );
    }

    // Both runs released, so a late request is served from a full pool.
    assert_eq!(pool.available_count().await.unwrap(), resources);
    let handled = coordinator.handle(login_request("case-c")).await;
    assert!(matches!(handled.outcome, RunOutcome::Completed { .. }));
    executor.assert_execution_count_eq(3);
}

/// A and B hold both resources while C arrives; C fails with the
/// no-resource message, and D succeeds once A and B have released.
#[tokio::test]
async fn late_request_fails_while_pool_is_held_and_succeeds_after() {
    let pool = Arc::new(InMemoryResourcePool::with_resources(2));
    let ledger = Arc::new(InMemoryRunLedger::new());
    // Slow enough that A and B still hold their leases when C arrives.
    let executor = Arc::new(ScriptedExecutor::with_script(ExecutorScript::succeed_after(
        "ok", 500,
    )));

    let coordinator = Arc::new(
        JobCoordinatorBuilder::new(CoordinatorConfig::default())
            .with_pool(Arc::clone(&pool))
            .with_ledger(Arc::clone(&ledger))
            .with_vault(Arc::new(vault_for_resources(2)))
            .with_executor(Arc::clone(&executor))
            .build()
            .expect("coordinator builds"),
    );

    let mut holders = Vec::new();
    for case in ["case-a", "case-b"] {
        let coordinator = Arc::clone(&coordinator);
        holders.push(tokio::spawn(async move {
            coordinator.handle(login_request(case)).await
        }));
    }

    // Wait until both leases are held before sending C.
    while pool.available_count().await.unwrap() > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let handled = coordinator.handle(login_request("case-c")).await;
    match handled.outcome {
        RunOutcome::Failed { message, .. } => assert_eq!(message, NO_RESOURCE_MESSAGE),
        other => panic!("expected Failed, got {other:?}"),
    }

    for holder in holders {
        let handled = holder.await.unwrap();
        assert!(matches!(handled.outcome, RunOutcome::Completed { .. }));
    }

    let handled = coordinator.handle(login_request("case-d")).await;
    assert!(matches!(handled.outcome, RunOutcome::Completed { .. }));
    assert_eq!(pool.available_count().await.unwrap(), 2);
}

#[tokio::test]
async fn request_against_a_drained_pool_fails_then_succeeds_after_release() {
    let pool = Arc::new(InMemoryResourcePool::with_resources(1));
    let ledger = Arc::new(InMemoryRunLedger::new());
    let executor = Arc::new(ScriptedExecutor::new());

    let coordinator = JobCoordinatorBuilder::new(CoordinatorConfig::default())
        .with_pool(Arc::clone(&pool))
        .with_ledger(Arc::clone(&ledger))
        .with_vault(Arc::new(vault_for_resources(1)))
        .with_executor(Arc::clone(&executor))
        .build()
        .expect("coordinator builds");

    // Drain the pool out-of-band, as a concurrent holder would.
    let out_of_band = RunId::new();
    pool.acquire(out_of_band).await.unwrap().expect("drain");

    let handled = coordinator.handle(login_request("case-c")).await;
    match handled.outcome {
        RunOutcome::Failed { message, .. } => assert_eq!(message, NO_RESOURCE_MESSAGE),
        other => panic!("expected Failed, got {other:?}"),
    }

    pool.release(out_of_band).await.unwrap();
    let handled = coordinator.handle(login_request("case-d")).await;
    assert!(matches!(handled.outcome, RunOutcome::Completed { .. }));
}
