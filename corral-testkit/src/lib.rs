//! In-memory backends and scripted collaborators for testing corral.
//!
//! Provides [`InMemoryResourcePool`] and [`InMemoryRunLedger`] as
//! store-free implementations of the core traits, plus [`ScriptedExecutor`]
//! and [`StaticVault`] stubs for the external collaborators. All of them
//! support store-failure injection so coordinator failure paths can be
//! exercised deterministically.

mod executor;
mod ledger;
mod pool;
mod vault;

pub use executor::{ExecutionRecord, ExecutorScript, ScriptedExecutor};
pub use ledger::InMemoryRunLedger;
pub use pool::InMemoryResourcePool;
pub use vault::StaticVault;

use corral::run::JobRequest;

/// Build a vault holding the secrets referenced by
/// [`InMemoryResourcePool::with_resources`].
pub fn vault_for_resources(count: usize) -> StaticVault {
    let vault = StaticVault::new();
    for n in 1..=count {
        vault.insert(format!("secret/cred-{n}"), format!("hunter2-{n}"));
    }
    vault
}

/// Build a well-formed request for `case` with a minimal login payload.
pub fn login_request(case: &str) -> JobRequest {
    JobRequest::new(
        case,
        serde_json::json!({
            "action": "login",
            "target": "https://example.test/login",
        }),
    )
}
