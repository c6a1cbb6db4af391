//! In-memory coordinator demo.
//!
//! Drives a handful of requests through the full coordinator state machine
//! over the in-memory backends from corral-testkit, including a duplicate
//! delivery and more requests than resources, and prints what happened.
//!
//! Run with: `cargo run --example in_memory_coordinator`

use std::sync::Arc;

use corral::config::CoordinatorConfig;
use corral::coordinator::{JobCoordinatorBuilder, RunOutcome};
use corral::pool::ResourcePool;
use corral_testkit::{
    login_request, vault_for_resources, ExecutorScript, InMemoryResourcePool, InMemoryRunLedger,
    ScriptedExecutor,
};

fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed { run_id, summary } => {
            format!("completed run {} ({})", run_id, summary.message)
        }
        RunOutcome::Failed { run_id, message } => {
            format!("failed run {} ({})", run_id, message)
        }
        RunOutcome::Skipped {
            prior_run_id,
            prior_status,
        } => format!("skipped, prior run {} is {}", prior_run_id, prior_status),
        RunOutcome::Refused => "refused by the admission ceiling".to_string(),
        RunOutcome::Rejected { error } => format!("rejected ({})", error),
        RunOutcome::StoreUnavailable { message } => {
            format!("store unavailable ({})", message)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let resources = 2;
    let pool = Arc::new(InMemoryResourcePool::with_resources(resources));
    let ledger = Arc::new(InMemoryRunLedger::new());
    // A slow executor makes the contention visible: with three concurrent
    // cases over two resources, one request usually finds the pool empty.
    let executor = Arc::new(ScriptedExecutor::with_script(ExecutorScript::succeed_after(
        "logged in",
        150,
    )));

    let coordinator = Arc::new(
        JobCoordinatorBuilder::new(CoordinatorConfig::default())
            .with_pool(Arc::clone(&pool))
            .with_ledger(Arc::clone(&ledger))
            .with_vault(Arc::new(vault_for_resources(resources)))
            .with_executor(Arc::clone(&executor))
            .build()?,
    );

    println!("pool: {} resources", resources);
    println!();

    // Three distinct cases race for two resources.
    let mut handles = Vec::new();
    for case in ["case-alpha", "case-beta", "case-gamma"] {
        let coordinator = Arc::clone(&coordinator);
        handles.push((
            case,
            tokio::spawn(async move { coordinator.handle(login_request(case)).await }),
        ));
    }
    for (case, handle) in handles {
        let handled = handle.await?;
        println!("{case}: {}", describe(&handled.outcome));
    }
    println!();

    // Redeliver case-alpha: skipped if it succeeded, re-attempted if the
    // race left it failed.
    let handled = coordinator.handle(login_request("case-alpha")).await;
    println!("case-alpha (redelivered): {}", describe(&handled.outcome));

    // A malformed request never reaches the ledger.
    let handled = coordinator
        .handle(corral::run::JobRequest::new("", serde_json::json!({})))
        .await;
    println!("empty case id: {}", describe(&handled.outcome));
    println!();

    let snapshot = pool.snapshot().await?;
    println!(
        "pool after the dust settles: {} available, {} locked of {}",
        snapshot.available, snapshot.locked, snapshot.total
    );
    println!("runs recorded: {}", ledger.rows().len());
    println!("executor invocations: {}", executor.record().len());

    Ok(())
}
