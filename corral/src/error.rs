use std::time::Duration;

use thiserror::Error;

/// Request rejected before any ledger row was created.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("case id must not be empty")]
    EmptyCaseId,
    #[error("payload must be a JSON object")]
    PayloadNotObject,
}

/// Failure talking to the resource pool store.
///
/// An empty pool is not an error; [`ResourcePool::acquire`] reports that as
/// `Ok(None)`.
///
/// [`ResourcePool::acquire`]: crate::pool::ResourcePool::acquire
#[derive(Clone, Debug, Error)]
pub enum PoolError {
    #[error("resource store unavailable: {0}")]
    Store(String),
    #[error("resource row could not be decoded: {0}")]
    Decode(String),
}

/// Failure talking to the run ledger store.
#[derive(Clone, Debug, Error)]
pub enum LedgerError {
    #[error("run ledger unavailable: {0}")]
    Store(String),
    #[error("run row could not be decoded: {0}")]
    Decode(String),
}

/// Failure retrieving a credential from the vault.
#[derive(Clone, Debug, Error)]
pub enum VaultError {
    #[error("secret {0} not found")]
    NotFound(String),
    #[error("access to secret {0} denied")]
    Denied(String),
    #[error("vault unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by (or imposed on) the automation executor.
#[derive(Clone, Debug, Error)]
pub enum ExecutionError {
    #[error("execution failed: {0}")]
    Failed(String),
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("credential fetch failed: {0}")]
    Credential(#[from] VaultError),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for PoolError {
    fn from(err: sqlx::Error) -> Self {
        PoolError::Store(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Store(err.to_string())
    }
}
