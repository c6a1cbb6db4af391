use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::resource::Resource;
use crate::run::RunId;

/// Trait for resource pool backends that manage credential leases.
///
/// Implementors provide the atomic conditional-claim primitive that is the
/// distributed mutex over the pool: concurrent `acquire` calls racing for
/// the same resource must never both succeed. All mutation of resource rows
/// goes through this trait.
#[async_trait]
pub trait ResourcePool: Send + Sync {
    /// Attempt to claim one available resource for `run_id`.
    ///
    /// Selection among available resources is arbitrary, with no ordering
    /// guarantee. The claim must be a single indivisible operation against
    /// the store, not a read followed by a separate write. Returns
    /// `Ok(None)` when no resource is available or the conditional update
    /// lost a race; that is a normal outcome, not an error.
    async fn acquire(&self, run_id: RunId) -> Result<Option<Resource>, PoolError>;

    /// Release whatever resource `run_id` currently holds.
    ///
    /// Unconditional and idempotent: releasing when nothing is held is a
    /// no-op, and a release never frees a resource held by a different run.
    async fn release(&self, run_id: RunId) -> Result<(), PoolError>;

    /// Number of resources currently available for claiming.
    async fn available_count(&self) -> Result<usize, PoolError>;

    /// Point-in-time view of the pool for monitoring.
    async fn snapshot(&self) -> Result<PoolSnapshot, PoolError>;
}

/// Snapshot of pool state at a point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Timestamp when the snapshot was taken.
    pub sampled_at: DateTime<Utc>,
    /// Number of resources available for claiming.
    pub available: usize,
    /// Number of resources currently held by a run.
    pub locked: usize,
    /// Total number of resources in the pool.
    pub total: usize,
}

impl PoolSnapshot {
    pub fn new(available: usize, locked: usize) -> Self {
        Self {
            sampled_at: Utc::now(),
            available,
            locked,
            total: available + locked,
        }
    }
}
