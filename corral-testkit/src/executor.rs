use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use corral::error::ExecutionError;
use corral::executor::{AutomationExecutor, ExecutionSummary};

/// What the scripted executor should do on its next invocations.
#[derive(Clone, Debug)]
pub enum ExecutorScript {
    Succeed { summary: String, delay_ms: u64 },
    Fail { message: String },
}

impl ExecutorScript {
    pub fn succeed(summary: impl Into<String>) -> Self {
        Self::Succeed {
            summary: summary.into(),
            delay_ms: 0,
        }
    }

    pub fn succeed_after(summary: impl Into<String>, delay_ms: u64) -> Self {
        Self::Succeed {
            summary: summary.into(),
            delay_ms,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionRecord {
    pub credentials: String,
    pub payload: serde_json::Value,
}

/// Executor that follows a preset script and records every invocation.
#[derive(Clone)]
pub struct ScriptedExecutor {
    executions: Arc<Mutex<Vec<ExecutionRecord>>>,
    script: Arc<Mutex<ExecutorScript>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::with_script(ExecutorScript::succeed("ok"))
    }

    pub fn with_script(script: ExecutorScript) -> Self {
        Self {
            executions: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(script)),
        }
    }

    pub fn set_script(&self, script: ExecutorScript) {
        *self.script.lock() = script;
    }

    pub fn record(&self) -> Vec<ExecutionRecord> {
        self.executions.lock().clone()
    }

    pub fn assert_execution_count_eq(&self, expected: usize) {
        assert_eq!(
            self.executions.lock().len(),
            expected,
            "Expected {} executions, got {}",
            expected,
            self.executions.lock().len()
        );
    }

    pub fn clear(&self) {
        self.executions.lock().clear();
    }
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        credentials: &SecretString,
        payload: &serde_json::Value,
    ) -> Result<ExecutionSummary, ExecutionError> {
        self.executions.lock().push(ExecutionRecord {
            credentials: credentials.expose_secret().to_string(),
            payload: payload.clone(),
        });

        let script = self.script.lock().clone();
        match script {
            ExecutorScript::Succeed { summary, delay_ms } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(ExecutionSummary::new(summary))
            }
            ExecutorScript::Fail { message } => Err(ExecutionError::Failed(message)),
        }
    }
}
