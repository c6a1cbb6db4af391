//! Integration tests for the PostgreSQL pool and ledger backends.
//!
//! Requires a running Postgres instance with the corral schema applied.
//! Run with: `cargo test --test postgres_backend --features postgres -- --ignored`

#![cfg(feature = "postgres")]

use corral::gate::AdmissionCeiling;
use corral::ledger::{AdmissionOutcome, RunLedger};
use corral::persistence::{PostgresResourcePool, PostgresRunLedger};
use corral::pool::ResourcePool;
use corral::run::{CaseId, RunId, RunStatus, TerminalStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

async fn connect() -> PgPool {
    PgPool::connect(&std::env::var("DATABASE_URL").expect("DATABASE_URL required"))
        .await
        .expect("connect")
}

/// Insert a resource row with a test-scoped id so parallel runs never collide.
async fn insert_resource(pool: &PgPool, scope: &str, n: usize) -> String {
    let id = format!("{scope}-cred-{n}");
    sqlx::query(
        r#"
        INSERT INTO corral_resources (id, status, holder_run_id, secret_ref, last_updated)
        VALUES ($1, 'available', NULL, $2, NOW())
        "#,
    )
    .bind(&id)
    .bind(format!("secret/{id}"))
    .execute(pool)
    .await
    .expect("insert_resource");
    id
}

async fn resource_status(pool: &PgPool, id: &str) -> (String, Option<Uuid>) {
    let row = sqlx::query("SELECT status, holder_run_id FROM corral_resources WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("resource_status");
    (
        row.try_get("status").expect("status column"),
        row.try_get("holder_run_id").expect("holder column"),
    )
}

async fn cleanup(pool: &PgPool, scope: &str) {
    sqlx::query("DELETE FROM corral_resources WHERE id LIKE $1 || '%'")
        .bind(scope)
        .execute(pool)
        .await
        .ok();
    sqlx::query("DELETE FROM corral_runs WHERE case_id LIKE $1 || '%'")
        .bind(scope)
        .execute(pool)
        .await
        .ok();
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn acquire_claims_exactly_one_row_and_release_frees_it() {
    let pg = connect().await;
    let scope = format!("test-claim-{}", Uuid::new_v4());
    let resource_id = insert_resource(&pg, &scope, 1).await;

    let pool = PostgresResourcePool::new(pg.clone());
    let run_id = RunId::new();

    let claimed = pool
        .acquire(run_id)
        .await
        .expect("acquire")
        .expect("one resource available");
    assert_eq!(claimed.id.as_str(), resource_id);

    let (status, holder) = resource_status(&pg, &resource_id).await;
    assert_eq!(status, "locked");
    assert_eq!(holder, Some(run_id.0));

    pool.release(run_id).await.expect("release");
    let (status, holder) = resource_status(&pg, &resource_id).await;
    assert_eq!(status, "available");
    assert_eq!(holder, None);

    cleanup(&pg, &scope).await;
}

/// Many concurrent acquires over few rows: the conditional UPDATE with
/// `FOR UPDATE SKIP LOCKED` must never hand one row to two runs.
#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn concurrent_acquires_hand_out_distinct_rows() {
    let pg = connect().await;
    let scope = format!("test-race-{}", Uuid::new_v4());
    for n in 1..=3 {
        insert_resource(&pg, &scope, n).await;
    }

    let pool = PostgresResourcePool::new(pg.clone());
    let mut handles = Vec::new();
    for _ in 0..12 {
        let pool = pool.clone();
        handles.push(tokio::spawn(
            async move { pool.acquire(RunId::new()).await },
        ));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(resource) = handle.await.expect("join").expect("acquire") {
            // Only count rows from this test's scope; other suites may be
            // running against the same database.
            if resource.id.as_str().starts_with(&scope) {
                claimed.push(resource.id);
            }
        }
    }

    let distinct: std::collections::HashSet<_> = claimed.iter().collect();
    assert_eq!(distinct.len(), claimed.len(), "a row was claimed twice");
    assert!(claimed.len() <= 3);

    cleanup(&pg, &scope).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn release_does_not_touch_other_holders() {
    let pg = connect().await;
    let scope = format!("test-scoped-release-{}", Uuid::new_v4());
    insert_resource(&pg, &scope, 1).await;
    insert_resource(&pg, &scope, 2).await;

    let pool = PostgresResourcePool::new(pg.clone());
    let holder_a = RunId::new();
    let holder_b = RunId::new();
    let claimed_a = pool.acquire(holder_a).await.expect("acquire").expect("row");
    let claimed_b = pool.acquire(holder_b).await.expect("acquire").expect("row");

    pool.release(holder_a).await.expect("release");
    // Releasing a holder with no lease is a no-op.
    pool.release(RunId::new()).await.expect("release no-op");

    let (status_a, _) = resource_status(&pg, claimed_a.id.as_str()).await;
    let (status_b, holder) = resource_status(&pg, claimed_b.id.as_str()).await;
    assert_eq!(status_a, "available");
    assert_eq!(status_b, "locked");
    assert_eq!(holder, Some(holder_b.0));

    cleanup(&pg, &scope).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn ledger_blocks_running_and_succeeded_but_not_failed() {
    let pg = connect().await;
    let scope = format!("test-blocking-{}", Uuid::new_v4());
    let ledger = PostgresRunLedger::new(pg.clone());
    let case = CaseId::new(format!("{scope}-case"));

    let first = RunId::new();
    let outcome = ledger
        .create(first, &case, AdmissionCeiling::Unlimited)
        .await
        .expect("create");
    assert!(matches!(outcome, AdmissionOutcome::Admitted));

    // Running blocks.
    let blocking = ledger.find_blocking(&case).await.expect("find_blocking");
    assert_eq!(blocking.map(|r| r.run_id), Some(first));

    // Succeeded still blocks.
    ledger
        .complete(first, TerminalStatus::Succeeded, None)
        .await
        .expect("complete");
    let blocking = ledger.find_blocking(&case).await.expect("find_blocking");
    assert_eq!(
        blocking.map(|r| r.status),
        Some(RunStatus::Succeeded)
    );

    // Failed does not.
    let second = RunId::new();
    let failed_case = CaseId::new(format!("{scope}-failed"));
    ledger
        .create(second, &failed_case, AdmissionCeiling::Unlimited)
        .await
        .expect("create");
    ledger
        .complete(second, TerminalStatus::Failed, Some("boom".into()))
        .await
        .expect("complete");
    let blocking = ledger
        .find_blocking(&failed_case)
        .await
        .expect("find_blocking");
    assert!(blocking.is_none());

    cleanup(&pg, &scope).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn terminal_transition_is_a_no_op_on_already_terminal_rows() {
    let pg = connect().await;
    let scope = format!("test-terminal-{}", Uuid::new_v4());
    let ledger = PostgresRunLedger::new(pg.clone());
    let case = CaseId::new(format!("{scope}-case"));

    let run_id = RunId::new();
    ledger
        .create(run_id, &case, AdmissionCeiling::Unlimited)
        .await
        .expect("create");
    ledger
        .complete(run_id, TerminalStatus::Succeeded, None)
        .await
        .expect("complete");

    // A late Failed write must not overwrite the landed terminal status.
    ledger
        .complete(run_id, TerminalStatus::Failed, Some("late writer".into()))
        .await
        .expect("complete no-op");

    let run = ledger
        .find_run(run_id)
        .await
        .expect("find_run")
        .expect("row");
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.error_message, None);

    cleanup(&pg, &scope).await;
}

/// Concurrent ceiling-gated creates must never admit past the limit; the
/// advisory lock serializes the count-then-insert.
#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn admission_ceiling_holds_under_concurrent_creates() {
    let pg = connect().await;
    let scope = format!("test-ceiling-{}", Uuid::new_v4());
    let ledger = PostgresRunLedger::new(pg.clone());

    // The ceiling counts all Running rows in the table, so other suites
    // would interfere; tolerate that by only asserting the upper bound.
    let ceiling = AdmissionCeiling::Limit(2);
    let mut handles = Vec::new();
    for n in 0..6 {
        let ledger = ledger.clone();
        let case = CaseId::new(format!("{scope}-case-{n}"));
        handles.push(tokio::spawn(async move {
            ledger.create(RunId::new(), &case, ceiling).await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if matches!(
            handle.await.expect("join").expect("create"),
            AdmissionOutcome::Admitted
        ) {
            admitted += 1;
        }
    }
    assert!(admitted <= 2, "ceiling of 2 admitted {admitted}");

    cleanup(&pg, &scope).await;
}
