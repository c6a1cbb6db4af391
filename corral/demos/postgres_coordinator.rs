//! PostgreSQL-backed coordinator demo.
//!
//! Runs the full coordinator against the Postgres pool and ledger, with a
//! stub executor standing in for the real automation. Both the lease pool
//! and the run ledger live in the database, so several copies of this
//! process can race safely over the same rows.
//!
//! # Prerequisites
//!
//! 1. PostgreSQL server running locally or accessible via network
//! 2. Database created: `createdb corral_example`
//! 3. Schema applied: `psql corral_example -f corral/migrations/001_initial_schema.sql`
//!
//! # Running
//!
//! ```bash
//! export DATABASE_URL="postgres://localhost/corral_example"
//! cargo run --example postgres_coordinator --features postgres
//! ```

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use corral::config::{CoordinatorConfig, PersistenceConfig};
use corral::coordinator::{JobCoordinatorBuilder, RunOutcome};
use corral::error::{ExecutionError, VaultError};
use corral::executor::{AutomationExecutor, ExecutionSummary};
use corral::persistence::{self, PostgresResourcePool, PostgresRunLedger};
use corral::pool::ResourcePool;
use corral::run::JobRequest;
use corral::vault::CredentialVault;
use secrecy::{ExposeSecret, SecretString};

/// Vault stub mapping secret refs to fixed values.
struct DemoVault {
    secrets: HashMap<String, String>,
}

#[async_trait]
impl CredentialVault for DemoVault {
    async fn get_secret(&self, name: &str) -> Result<SecretString, VaultError> {
        self.secrets
            .get(name)
            .map(|value| SecretString::from(value.clone()))
            .ok_or_else(|| VaultError::NotFound(name.to_string()))
    }
}

/// Executor stub that pretends to drive a login flow.
struct DemoExecutor;

#[async_trait]
impl AutomationExecutor for DemoExecutor {
    async fn execute(
        &self,
        credentials: &SecretString,
        payload: &serde_json::Value,
    ) -> Result<ExecutionSummary, ExecutionError> {
        println!(
            "[EXECUTE] logging in with a {}-byte credential, payload: {}",
            credentials.expose_secret().len(),
            payload
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        Ok(ExecutionSummary::new("login flow completed"))
    }
}

async fn seed_resources(pg: &sqlx::PgPool, count: usize) -> anyhow::Result<()> {
    for n in 1..=count {
        sqlx::query(
            r#"
            INSERT INTO corral_resources (id, status, holder_run_id, secret_ref, last_updated)
            VALUES ($1, 'available', NULL, $2, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(format!("demo-cred-{n}"))
        .bind(format!("secret/demo-cred-{n}"))
        .execute(pg)
        .await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PersistenceConfig {
        connection_string: env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/corral_example".into()),
        max_connections: 5,
        min_connections: 1,
        acquire_timeout_seconds: 5,
    };
    let pg = persistence::connect(&config).await?;

    let resources = 2;
    seed_resources(&pg, resources).await?;

    let mut secrets = HashMap::new();
    for n in 1..=resources {
        secrets.insert(format!("secret/demo-cred-{n}"), format!("s3cret-{n}"));
    }

    let pool = Arc::new(PostgresResourcePool::new(pg.clone()));
    let ledger = Arc::new(PostgresRunLedger::new(pg.clone()));

    let coordinator = Arc::new(
        JobCoordinatorBuilder::new(CoordinatorConfig::default())
            .with_pool(Arc::clone(&pool))
            .with_ledger(ledger)
            .with_vault(Arc::new(DemoVault { secrets }))
            .with_executor(Arc::new(DemoExecutor))
            .build()?,
    );

    // Three cases race for two database-backed resources.
    let mut handles = Vec::new();
    for n in 1..=3 {
        let coordinator = Arc::clone(&coordinator);
        let case = format!("demo-case-{n}");
        handles.push(tokio::spawn(async move {
            let request = JobRequest::new(
                case.clone(),
                serde_json::json!({
                    "action": "login",
                    "target": "https://example.test/login",
                }),
            );
            (case, coordinator.handle(request).await)
        }));
    }

    for handle in handles {
        let (case, handled) = handle.await?;
        match handled.outcome {
            RunOutcome::Completed { run_id, summary } => {
                println!("{case}: completed run {run_id} ({})", summary.message);
            }
            RunOutcome::Failed { run_id, message } => {
                println!("{case}: failed run {run_id} ({message})");
            }
            other => println!("{case}: {other:?}"),
        }
    }

    // A second delivery of an already-succeeded case is skipped.
    let request = JobRequest::new(
        "demo-case-1",
        serde_json::json!({"action": "login", "target": "https://example.test/login"}),
    );
    let handled = coordinator.handle(request).await;
    println!("demo-case-1 (redelivered): {:?}", handled.outcome);

    let snapshot = pool.snapshot().await?;
    println!(
        "pool: {} available, {} locked of {}",
        snapshot.available, snapshot.locked, snapshot.total
    );

    Ok(())
}
