use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::gate::AdmissionCeiling;
use crate::run::{CaseId, RunId, RunRecord, TerminalStatus};

/// Result of an admission-gated run creation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AdmissionOutcome {
    /// The run row was inserted with status `Running`.
    Admitted,
    /// The admission ceiling blocked the insert; no row was created.
    Refused,
}

/// Trait for run ledger backends that record attempts and outcomes.
///
/// The ledger is the distributed deduplication mechanism over job identity:
/// the blocking lookup plus the admission-gated insert decide, per case,
/// whether a new attempt may run. Rows are never deleted.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Find the run, if any, that blocks a new attempt for this case.
    ///
    /// A case is blocked by a `Succeeded` run (the job already executed to
    /// completion) and by a `Running` run (an attempt is in flight). A
    /// `Failed` run does not block, so redelivery after failure may
    /// re-attempt.
    async fn find_blocking(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<RunRecord>, LedgerError>;

    /// Insert a new `Running` run for this attempt, subject to the ceiling.
    ///
    /// With `AdmissionCeiling::Limit(n)` the insert only happens while fewer
    /// than `n` runs are `Running`, enforced atomically by the store; a
    /// blocked insert returns [`AdmissionOutcome::Refused`] without creating
    /// a row. Must tolerate the case already having a terminal run under a
    /// different `run_id` — idempotency is the caller's blocking check, not
    /// a store uniqueness constraint on `case_id`.
    async fn create(
        &self,
        run_id: RunId,
        case_id: &CaseId,
        ceiling: AdmissionCeiling,
    ) -> Result<AdmissionOutcome, LedgerError>;

    /// Record the terminal status of a run.
    ///
    /// Guarded: only a `Running` row transitions. Completing an
    /// already-terminal run is a no-op rather than a double write.
    async fn complete(
        &self,
        run_id: RunId,
        status: TerminalStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError>;

    /// Number of runs currently in `Running` status.
    async fn running_count(&self) -> Result<u64, LedgerError>;

    /// Look up a single run by its attempt id.
    async fn find_run(&self, run_id: RunId) -> Result<Option<RunRecord>, LedgerError>;
}
