use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use corral::error::LedgerError;
use corral::gate::AdmissionCeiling;
use corral::ledger::{AdmissionOutcome, RunLedger};
use corral::run::{CaseId, RunId, RunRecord, RunStatus, TerminalStatus};

/// In-memory run ledger.
///
/// One mutex guards the row vector, so the running-count check and the
/// insert inside `create` are atomic, matching the store-side admission
/// guarantee of the production backend.
#[derive(Clone)]
pub struct InMemoryRunLedger {
    runs: Arc<Mutex<Vec<RunRecord>>>,
    failing: Arc<Mutex<bool>>,
    complete_failures_remaining: Arc<Mutex<u32>>,
}

impl InMemoryRunLedger {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(false)),
            complete_failures_remaining: Arc::new(Mutex::new(0)),
        }
    }

    /// Insert a pre-existing row, bypassing admission (for test setup).
    pub fn seed_run(&self, record: RunRecord) {
        self.runs.lock().push(record);
    }

    /// Make every subsequent call fail with a store error until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Make the next `count` calls to `complete` fail with a store error.
    pub fn fail_next_completes(&self, count: u32) {
        *self.complete_failures_remaining.lock() = count;
    }

    /// All recorded rows, in insertion order.
    pub fn rows(&self) -> Vec<RunRecord> {
        self.runs.lock().clone()
    }

    /// All rows for a case, in insertion order.
    pub fn rows_for_case(&self, case_id: &CaseId) -> Vec<RunRecord> {
        self.runs
            .lock()
            .iter()
            .filter(|r| &r.case_id == case_id)
            .cloned()
            .collect()
    }

    fn check_failing(&self) -> Result<(), LedgerError> {
        if *self.failing.lock() {
            Err(LedgerError::Store("injected store failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryRunLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunLedger for InMemoryRunLedger {
    async fn find_blocking(
        &self,
        case_id: &CaseId,
    ) -> Result<Option<RunRecord>, LedgerError> {
        self.check_failing()?;
        Ok(self
            .runs
            .lock()
            .iter()
            .rev()
            .find(|r| &r.case_id == case_id && r.status.blocks_new_attempt())
            .cloned())
    }

    async fn create(
        &self,
        run_id: RunId,
        case_id: &CaseId,
        ceiling: AdmissionCeiling,
    ) -> Result<AdmissionOutcome, LedgerError> {
        self.check_failing()?;
        let mut runs = self.runs.lock();

        let running = runs
            .iter()
            .filter(|r| r.status == RunStatus::Running)
            .count() as u64;
        if !ceiling.admits(running) {
            return Ok(AdmissionOutcome::Refused);
        }

        runs.push(RunRecord::admitted(run_id, case_id.clone()));
        Ok(AdmissionOutcome::Admitted)
    }

    async fn complete(
        &self,
        run_id: RunId,
        status: TerminalStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError> {
        self.check_failing()?;
        {
            let mut remaining = self.complete_failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(LedgerError::Store(
                    "injected terminal-write failure".to_string(),
                ));
            }
        }

        let mut runs = self.runs.lock();
        if let Some(run) = runs
            .iter_mut()
            .find(|r| r.run_id == run_id && r.status == RunStatus::Running)
        {
            run.status = status.as_run_status();
            run.error_message = error_message;
            run.updated_at = Utc::now();
        } else {
            tracing::debug!(run_id = %run_id, "terminal transition no-op");
        }
        Ok(())
    }

    async fn running_count(&self) -> Result<u64, LedgerError> {
        self.check_failing()?;
        Ok(self
            .runs
            .lock()
            .iter()
            .filter(|r| r.status == RunStatus::Running)
            .count() as u64)
    }

    async fn find_run(&self, run_id: RunId) -> Result<Option<RunRecord>, LedgerError> {
        self.check_failing()?;
        Ok(self
            .runs
            .lock()
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned())
    }
}
