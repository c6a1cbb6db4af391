use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique identifier for one physical run attempt.
///
/// Every attempt gets its own `RunId`, even when several attempts share the
/// same logical [`CaseId`] across redeliveries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl RunId {
    /// Create a new run ID using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied key identifying the logical job.
///
/// Used for idempotency: the same case may map to several runs across
/// redeliveries, but to at most one successful execution.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CaseId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CaseId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of a run.
///
/// Transitions are monotonic: `Running` moves to exactly one of `Succeeded`
/// or `Failed` and never back.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Whether a run in this state blocks a new attempt for the same case.
    ///
    /// `Succeeded` blocks forever; `Running` blocks so that two concurrent
    /// deliveries of one case cannot both reach execution. A `Failed` run
    /// lets a redelivery re-attempt the case.
    pub fn blocks_new_attempt(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Succeeded)
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status recorded when a run finishes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TerminalStatus {
    Succeeded,
    Failed,
}

impl TerminalStatus {
    pub fn as_run_status(&self) -> RunStatus {
        match self {
            TerminalStatus::Succeeded => RunStatus::Succeeded,
            TerminalStatus::Failed => RunStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.as_run_status().as_str()
    }
}

/// One row in the run ledger: a single attempt and its outcome.
///
/// Rows are never deleted; the ledger is the audit trail for job outcomes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub case_id: CaseId,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create a fresh `Running` record for a newly admitted attempt.
    pub fn admitted(run_id: RunId, case_id: CaseId) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            case_id,
            status: RunStatus::Running,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An inbound job request as delivered by the ingestion transport.
///
/// The payload is opaque to the coordinator beyond being a JSON object; it
/// is handed to the automation executor untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRequest {
    pub case_id: CaseId,
    pub payload: serde_json::Value,
}

impl JobRequest {
    pub fn new(case_id: impl Into<CaseId>, payload: serde_json::Value) -> Self {
        Self {
            case_id: case_id.into(),
            payload,
        }
    }

    /// Validate the request shape before any ledger row is created.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.case_id.is_empty() {
            return Err(ValidationError::EmptyCaseId);
        }
        if !self.payload.is_object() {
            return Err(ValidationError::PayloadNotObject);
        }
        Ok(())
    }
}
