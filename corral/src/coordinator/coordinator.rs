use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::config::CoordinatorConfig;
use crate::error::{ExecutionError, ValidationError};
use crate::events::{RunEvent, RunEventPayload, RunEventPublisher};
use crate::executor::{execute_with_timeout, AutomationExecutor, ExecutionSummary};
use crate::ledger::{AdmissionOutcome, RunLedger};
use crate::pool::ResourcePool;
use crate::resource::Resource;
use crate::run::{JobRequest, RunId, RunStatus, TerminalStatus};
use crate::telemetry;
use crate::vault::CredentialVault;

/// Error message recorded when the pool had no claimable resource.
///
/// Kept distinguishable from execution failures so ledger consumers can
/// tell capacity exhaustion from a broken job.
pub const NO_RESOURCE_MESSAGE: &str = "no available resource";

/// Terminal-equivalent outcome of handling one inbound request.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// The run executed and reached `Succeeded`.
    Completed {
        run_id: RunId,
        summary: ExecutionSummary,
    },
    /// The run reached `Failed` (no resource, vault, executor, or timeout).
    Failed { run_id: RunId, message: String },
    /// A blocking run for the same case already exists; nothing was done.
    Skipped {
        prior_run_id: RunId,
        prior_status: RunStatus,
    },
    /// The admission ceiling refused the attempt; no run row was created.
    Refused,
    /// The request was malformed; no run row was created.
    Rejected { error: ValidationError },
    /// The store was unreachable before a run row could be created.
    StoreUnavailable { message: String },
}

/// Acknowledgment the ingestion transport should return for a request.
///
/// `Success` stops redelivery (duplicates, refusals, and post-admission
/// failures are all final from the transport's point of view; job-level
/// outcomes live in the run ledger). `Redeliver` asks the at-least-once
/// transport to try again, and is only used for transient store failures
/// before any run row exists.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IngestAck {
    Success,
    Redeliver,
}

/// Outcome plus the acknowledgment to hand back to the transport.
#[derive(Clone, Debug)]
pub struct HandledRun {
    pub outcome: RunOutcome,
    pub ack: IngestAck,
}

impl HandledRun {
    fn ack_success(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            ack: IngestAck::Success,
        }
    }

    fn redeliver(message: String) -> Self {
        Self {
            outcome: RunOutcome::StoreUnavailable { message },
            ack: IngestAck::Redeliver,
        }
    }
}

/// Coordinates one run per inbound request over injected collaborators.
///
/// Holds no mutable state of its own: all coordination happens through the
/// shared store behind the pool and ledger traits, so any number of
/// coordinator instances across processes stay correct.
pub struct JobCoordinator<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    config: CoordinatorConfig,
    pool: Arc<P>,
    ledger: Arc<L>,
    vault: Arc<V>,
    executor: Arc<X>,
    events: Arc<dyn RunEventPublisher>,
}

impl<P, L, V, X> fmt::Debug for JobCoordinator<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("config", &self.config)
            .field("pool_type", &type_name::<P>())
            .field("ledger_type", &type_name::<L>())
            .field("vault_type", &type_name::<V>())
            .field("executor_type", &type_name::<X>())
            .finish()
    }
}

impl<P, L, V, X> JobCoordinator<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    pub(crate) fn new(
        config: CoordinatorConfig,
        pool: Arc<P>,
        ledger: Arc<L>,
        vault: Arc<V>,
        executor: Arc<X>,
        events: Arc<dyn RunEventPublisher>,
    ) -> Self {
        Self {
            config,
            pool,
            ledger,
            vault,
            executor,
            events,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<dyn RunEventPublisher> {
        Arc::clone(&self.events)
    }

    /// Drive one inbound request through the full state machine.
    ///
    /// Every failure past admission is converted into a terminal run status;
    /// nothing propagates out of this call mid-lease.
    pub async fn handle(&self, request: JobRequest) -> HandledRun {
        let span = telemetry::run_handle_span(request.case_id.as_str());
        self.handle_inner(request).instrument(span).await
    }

    async fn handle_inner(&self, request: JobRequest) -> HandledRun {
        if let Err(error) = request.validate() {
            tracing::warn!(case_id = %request.case_id, %error, "request rejected");
            return HandledRun::ack_success(RunOutcome::Rejected { error });
        }
        let case_id = request.case_id.clone();

        // Idempotency gate: Succeeded and Running runs both block.
        let blocking = match self.ledger.find_blocking(&case_id).await {
            Ok(blocking) => blocking,
            Err(error) => {
                tracing::warn!(case_id = %case_id, %error, "idempotency check failed, requesting redelivery");
                return HandledRun::redeliver(error.to_string());
            }
        };
        if let Some(prior) = blocking {
            telemetry::record_run_skipped(case_id.as_str(), prior.status.as_str());
            self.publish(RunEvent::new(
                case_id.clone(),
                RunEventPayload::Skipped {
                    prior_run_id: prior.run_id,
                    prior_status: prior.status,
                },
            ))
            .await;
            return HandledRun::ack_success(RunOutcome::Skipped {
                prior_run_id: prior.run_id,
                prior_status: prior.status,
            });
        }

        // Run row is created before the lock attempt: a crash between here
        // and acquire shows up as a stuck Running row, not a lost request.
        let run_id = RunId::new();
        match self
            .ledger
            .create(run_id, &case_id, self.config.admission_ceiling)
            .await
        {
            Ok(AdmissionOutcome::Admitted) => {}
            Ok(AdmissionOutcome::Refused) => {
                tracing::info!(case_id = %case_id, "admission ceiling refused request");
                telemetry::record_run_refused(case_id.as_str());
                self.publish(RunEvent::new(
                    case_id.clone(),
                    RunEventPayload::Refused { run_id },
                ))
                .await;
                return HandledRun::ack_success(RunOutcome::Refused);
            }
            Err(error) => {
                tracing::warn!(case_id = %case_id, %error, "run creation failed, requesting redelivery");
                return HandledRun::redeliver(error.to_string());
            }
        }
        telemetry::record_run_admitted(case_id.as_str());
        self.publish(RunEvent::new(
            case_id.clone(),
            RunEventPayload::Admitted { run_id },
        ))
        .await;

        let acquired = self
            .pool
            .acquire(run_id)
            .instrument(telemetry::acquire_span(run_id.to_string()))
            .await;
        let resource = match acquired {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                // Nothing was claimed, so there is nothing to release.
                return self
                    .fail_without_resource(run_id, &case_id, NO_RESOURCE_MESSAGE.to_string())
                    .await;
            }
            Err(error) => {
                let message = format!("resource store failure: {error}");
                return self.fail_without_resource(run_id, &case_id, message).await;
            }
        };
        tracing::debug!(run_id = %run_id, resource_id = %resource.id, "resource locked");
        telemetry::record_resource_locked(resource.id.as_str());
        self.publish(RunEvent::new(
            case_id.clone(),
            RunEventPayload::ResourceLocked {
                run_id,
                resource_id: resource.id.clone(),
            },
        ))
        .await;

        let timing = telemetry::record_run_start(run_id.to_string());
        let exec_result = telemetry::instrument_execute(
            run_id.to_string(),
            resource.id.as_str(),
            self.execute_leased(&resource, &request.payload),
        )
        .await;

        // Release runs exactly once on every path after a successful
        // acquire, before the terminal write.
        match self.pool.release(run_id).await {
            Ok(()) => {
                telemetry::record_resource_released(resource.id.as_str());
                self.publish(RunEvent::new(
                    case_id.clone(),
                    RunEventPayload::ResourceReleased {
                        run_id,
                        resource_id: resource.id.clone(),
                    },
                ))
                .await;
            }
            Err(error) => {
                tracing::error!(
                    run_id = %run_id,
                    resource_id = %resource.id,
                    %error,
                    "resource release failed; lease left to store recovery"
                );
            }
        }

        match exec_result {
            Ok(summary) => {
                self.finish(run_id, TerminalStatus::Succeeded, None).await;
                telemetry::record_run_end(timing, case_id.as_str(), "succeeded");
                self.publish(RunEvent::new(
                    case_id.clone(),
                    RunEventPayload::Completed { run_id },
                ))
                .await;
                HandledRun::ack_success(RunOutcome::Completed { run_id, summary })
            }
            Err(error) => {
                let message = error.to_string();
                self.finish(run_id, TerminalStatus::Failed, Some(message.clone()))
                    .await;
                telemetry::record_run_end(timing, case_id.as_str(), "failed");
                self.publish(RunEvent::new(
                    case_id.clone(),
                    RunEventPayload::Failed {
                        run_id,
                        message: message.clone(),
                    },
                ))
                .await;
                HandledRun::ack_success(RunOutcome::Failed { run_id, message })
            }
        }
    }

    /// Terminal failure for a run that never held a resource.
    async fn fail_without_resource(
        &self,
        run_id: RunId,
        case_id: &crate::run::CaseId,
        message: String,
    ) -> HandledRun {
        tracing::warn!(run_id = %run_id, case_id = %case_id, message, "run failed before execution");
        self.finish(run_id, TerminalStatus::Failed, Some(message.clone()))
            .await;
        self.publish(RunEvent::new(
            case_id.clone(),
            RunEventPayload::Failed {
                run_id,
                message: message.clone(),
            },
        ))
        .await;
        HandledRun::ack_success(RunOutcome::Failed { run_id, message })
    }

    async fn execute_leased(
        &self,
        resource: &Resource,
        payload: &serde_json::Value,
    ) -> Result<ExecutionSummary, ExecutionError> {
        let credentials = self.vault.get_secret(&resource.secret_ref).await?;
        execute_with_timeout(
            self.executor.as_ref(),
            &credentials,
            payload,
            self.config.executor_timeout(),
        )
        .await
    }

    /// Write the terminal status, retrying independently of the executor
    /// result. A run whose terminal write never lands stays Running in the
    /// ledger, which is the observable signal for operators.
    async fn finish(
        &self,
        run_id: RunId,
        status: TerminalStatus,
        error_message: Option<String>,
    ) {
        let attempts = self.config.complete_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self
                .ledger
                .complete(run_id, status, error_message.clone())
                .await
            {
                Ok(()) => {
                    telemetry::record_run_completed(status.as_str());
                    return;
                }
                Err(error) if attempt < attempts => {
                    tracing::warn!(
                        run_id = %run_id,
                        %error,
                        attempt,
                        "terminal status write failed, retrying"
                    );
                    tokio::time::sleep(self.config.complete_retry_backoff()).await;
                }
                Err(error) => {
                    tracing::error!(
                        run_id = %run_id,
                        %error,
                        "terminal status write abandoned; run left Running"
                    );
                }
            }
        }
    }

    async fn publish(&self, event: RunEvent) {
        if let Err(error) = self.events.publish(event).await {
            tracing::error!(%error, "run event publish failed");
        }
    }
}
