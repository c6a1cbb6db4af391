//! PostgreSQL-backed resource pool and run ledger.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE corral_resources (
//!     id            TEXT PRIMARY KEY,
//!     status        TEXT NOT NULL DEFAULT 'available',
//!     holder_run_id UUID NULL,
//!     secret_ref    TEXT NOT NULL,
//!     last_updated  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE corral_runs (
//!     run_id        UUID PRIMARY KEY,
//!     case_id       TEXT NOT NULL,
//!     status        TEXT NOT NULL,
//!     error_message TEXT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE INDEX corral_runs_case_idx ON corral_runs (case_id, status);
//! ```
//!
//! The database is the only coordination point between coordinator
//! instances: the claim is a single conditional `UPDATE` and admission is a
//! single advisory-locked insert, so no process-local synchronization is
//! needed anywhere.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::config::PersistenceConfig;
use crate::error::{LedgerError, PoolError};
use crate::gate::AdmissionCeiling;
use crate::ledger::{AdmissionOutcome, RunLedger};
use crate::pool::{PoolSnapshot, ResourcePool};
use crate::resource::{Resource, ResourceId, ResourceStatus};
use crate::run::{CaseId, RunId, RunRecord, RunStatus, TerminalStatus};

/// Advisory lock key serializing admission-gated run inserts.
const ADMISSION_LOCK_KEY: i64 = 0x636f_7272_616c;

/// Open a connection pool from persistence settings.
pub async fn connect(config: &PersistenceConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect(&config.connection_string)
        .await
}

/// PostgreSQL-backed implementation of the resource pool.
#[derive(Clone, Debug)]
pub struct PostgresResourcePool {
    pool: PgPool,
}

impl PostgresResourcePool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_resource_status(value: &str) -> Result<ResourceStatus, PoolError> {
    match value {
        "available" => Ok(ResourceStatus::Available),
        "locked" => Ok(ResourceStatus::Locked),
        other => Err(PoolError::Decode(format!(
            "unknown resource status: {other}"
        ))),
    }
}

fn map_resource_row(row: &PgRow) -> Result<Resource, PoolError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| PoolError::Decode(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| PoolError::Decode(e.to_string()))?;
    let holder: Option<Uuid> = row
        .try_get("holder_run_id")
        .map_err(|e| PoolError::Decode(e.to_string()))?;
    let secret_ref: String = row
        .try_get("secret_ref")
        .map_err(|e| PoolError::Decode(e.to_string()))?;
    let last_updated: DateTime<Utc> = row
        .try_get("last_updated")
        .map_err(|e| PoolError::Decode(e.to_string()))?;

    Ok(Resource {
        id: ResourceId::from(id),
        status: parse_resource_status(&status)?,
        holder_run_id: holder.map(RunId),
        secret_ref,
        last_updated,
    })
}

#[async_trait]
impl ResourcePool for PostgresResourcePool {
    async fn acquire(&self, run_id: RunId) -> Result<Option<Resource>, PoolError> {
        // One statement: pick an arbitrary available row and lock it. The
        // FOR UPDATE SKIP LOCKED subselect means racing claimants skip each
        // other's candidate instead of blocking or double-claiming.
        let row = sqlx::query(
            r#"
            UPDATE corral_resources
            SET status = 'locked',
                holder_run_id = $1,
                last_updated = NOW()
            WHERE id = (
                SELECT id
                FROM corral_resources
                WHERE status = 'available'
                ORDER BY random()
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, status, holder_run_id, secret_ref, last_updated
            "#,
        )
        .bind(run_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let resource = map_resource_row(&row)?;
                debug!(run_id = %run_id, resource_id = %resource.id, "resource claimed");
                Ok(Some(resource))
            }
            None => Ok(None),
        }
    }

    async fn release(&self, run_id: RunId) -> Result<(), PoolError> {
        let res = sqlx::query(
            r#"
            UPDATE corral_resources
            SET status = 'available',
                holder_run_id = NULL,
                last_updated = NOW()
            WHERE holder_run_id = $1
              AND status = 'locked'
            "#,
        )
        .bind(run_id.0)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            debug!(run_id = %run_id, "release no-op: no resource held");
        }
        Ok(())
    }

    async fn available_count(&self) -> Result<usize, PoolError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::bigint AS count
            FROM corral_resources
            WHERE status = 'available'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| PoolError::Decode(e.to_string()))?;
        Ok(count as usize)
    }

    async fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'available')::bigint AS available,
                COUNT(*) FILTER (WHERE status = 'locked')::bigint AS locked
            FROM corral_resources
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let available: i64 = row
            .try_get("available")
            .map_err(|e| PoolError::Decode(e.to_string()))?;
        let locked: i64 = row
            .try_get("locked")
            .map_err(|e| PoolError::Decode(e.to_string()))?;
        Ok(PoolSnapshot::new(available as usize, locked as usize))
    }
}

/// PostgreSQL-backed implementation of the run ledger.
#[derive(Clone, Debug)]
pub struct PostgresRunLedger {
    pool: PgPool,
}

impl PostgresRunLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_run_status(value: &str) -> Result<RunStatus, LedgerError> {
    match value {
        "running" => Ok(RunStatus::Running),
        "succeeded" => Ok(RunStatus::Succeeded),
        "failed" => Ok(RunStatus::Failed),
        other => Err(LedgerError::Decode(format!("unknown run status: {other}"))),
    }
}

fn map_run_row(row: &PgRow) -> Result<RunRecord, LedgerError> {
    let run_id: Uuid = row
        .try_get("run_id")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let case_id: String = row
        .try_get("case_id")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let error_message: Option<String> = row
        .try_get("error_message")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|e| LedgerError::Decode(e.to_string()))?;

    Ok(RunRecord {
        run_id: RunId(run_id),
        case_id: CaseId::from(case_id),
        status: parse_run_status(&status)?,
        error_message,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl RunLedger for PostgresRunLedger {
    async fn find_blocking(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<RunRecord>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT run_id, case_id, status, error_message, created_at, updated_at
            FROM corral_runs
            WHERE case_id = $1
              AND status IN ('running', 'succeeded')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(case_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_run_row).transpose()
    }

    async fn create(
        &self,
        run_id: RunId,
        case_id: &CaseId,
        ceiling: AdmissionCeiling,
    ) -> Result<AdmissionOutcome, LedgerError> {
        match ceiling {
            AdmissionCeiling::Unlimited => {
                sqlx::query(
                    r#"
                    INSERT INTO corral_runs (
                        run_id, case_id, status, error_message, created_at, updated_at
                    )
                    VALUES ($1, $2, 'running', NULL, NOW(), NOW())
                    "#,
                )
                .bind(run_id.0)
                .bind(case_id.as_str())
                .execute(&self.pool)
                .await?;

                Ok(AdmissionOutcome::Admitted)
            }
            AdmissionCeiling::Limit(_) => {
                // The running count and the insert must be one atomic step;
                // a plain count-then-insert lets two requests both pass
                // under the ceiling. The advisory lock serializes admission
                // for the duration of this transaction only.
                let mut tx = self.pool.begin().await?;

                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(ADMISSION_LOCK_KEY)
                    .execute(&mut *tx)
                    .await?;

                let row = sqlx::query(
                    r#"
                    SELECT COUNT(*)::bigint AS count
                    FROM corral_runs
                    WHERE status = 'running'
                    "#,
                )
                .fetch_one(&mut *tx)
                .await?;
                let running: i64 = row
                    .try_get("count")
                    .map_err(|e| LedgerError::Decode(e.to_string()))?;

                if !ceiling.admits(running as u64) {
                    tx.rollback().await?;
                    return Ok(AdmissionOutcome::Refused);
                }

                sqlx::query(
                    r#"
                    INSERT INTO corral_runs (
                        run_id, case_id, status, error_message, created_at, updated_at
                    )
                    VALUES ($1, $2, 'running', NULL, NOW(), NOW())
                    "#,
                )
                .bind(run_id.0)
                .bind(case_id.as_str())
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(AdmissionOutcome::Admitted)
            }
        }
    }

    async fn complete(
        &self,
        run_id: RunId,
        status: TerminalStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError> {
        let res = sqlx::query(
            r#"
            UPDATE corral_runs
            SET status = $2,
                error_message = $3,
                updated_at = NOW()
            WHERE run_id = $1
              AND status = 'running'
            "#,
        )
        .bind(run_id.0)
        .bind(status.as_str())
        .bind(&error_message)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            debug!(run_id = %run_id, "terminal transition no-op: run already terminal");
        }
        Ok(())
    }

    async fn running_count(&self) -> Result<u64, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::bigint AS count
            FROM corral_runs
            WHERE status = 'running'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(count as u64)
    }

    async fn find_run(&self, run_id: RunId) -> Result<Option<RunRecord>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT run_id, case_id, status, error_message, created_at, updated_at
            FROM corral_runs
            WHERE run_id = $1
            "#,
        )
        .bind(run_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_run_row).transpose()
    }
}
