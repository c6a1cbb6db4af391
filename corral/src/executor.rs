use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Outcome summary reported by a successful execution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Free-form message from the executor (e.g. the page banner text).
    pub message: String,
}

impl ExecutionSummary {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trait for the external automation step.
///
/// Opaque to the coordinator beyond success/failure and a message. The
/// implementation drives the browser (or whatever the job needs) with the
/// leased resource's credentials; it must report failures through the
/// `Result`, never panic through the coordinator.
#[async_trait]
pub trait AutomationExecutor: Send + Sync {
    async fn execute(
        &self,
        credentials: &SecretString,
        payload: &serde_json::Value,
    ) -> Result<ExecutionSummary, ExecutionError>;
}

/// Run the executor bounded by a timeout.
///
/// The executor invocation is the longest-running, most failure-prone step;
/// a hang is converted into [`ExecutionError::Timeout`] so the coordinator
/// can release the lease and mark the run failed in bounded time.
pub async fn execute_with_timeout<X: AutomationExecutor + ?Sized>(
    executor: &X,
    credentials: &SecretString,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<ExecutionSummary, ExecutionError> {
    match tokio::time::timeout(timeout, executor.execute(credentials, payload)).await {
        Ok(result) => result,
        Err(_) => Err(ExecutionError::Timeout(timeout)),
    }
}
