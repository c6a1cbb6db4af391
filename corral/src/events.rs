use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::resource::ResourceId;
use crate::run::{CaseId, RunId, RunStatus};

/// Metadata envelope attached to every run event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub correlation_id: Uuid,
    pub case_id: CaseId,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(case_id: CaseId, correlation_id: Option<Uuid>) -> Self {
        Self {
            version: 1,
            correlation_id: correlation_id.unwrap_or_else(Uuid::now_v7),
            case_id,
            timestamp: Utc::now(),
        }
    }
}

/// Run lifecycle event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunEvent {
    pub meta: EventMeta,
    pub payload: RunEventPayload,
}

impl RunEvent {
    pub fn new(case_id: CaseId, payload: RunEventPayload) -> Self {
        Self {
            meta: EventMeta::new(case_id, None),
            payload,
        }
    }
}

/// Event payload emitted for run lifecycle transitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RunEventPayload {
    /// A run row was created and the attempt admitted.
    Admitted { run_id: RunId },
    /// The request duplicated a blocking run and was skipped.
    Skipped {
        prior_run_id: RunId,
        prior_status: RunStatus,
    },
    /// The admission ceiling refused the attempt; no run row exists.
    Refused { run_id: RunId },
    /// A resource was claimed for the run.
    ResourceLocked {
        run_id: RunId,
        resource_id: ResourceId,
    },
    /// The run's resource was returned to the pool.
    ResourceReleased {
        run_id: RunId,
        resource_id: ResourceId,
    },
    /// The run reached `Succeeded`.
    Completed { run_id: RunId },
    /// The run reached `Failed`.
    Failed { run_id: RunId, message: String },
}

/// Trait for publishing run lifecycle events.
///
/// Publishing is best-effort observability: the coordinator logs publish
/// failures and carries on, it never fails a run over them.
#[async_trait]
pub trait RunEventPublisher: Send + Sync {
    /// Publish a run event to all subscribers.
    async fn publish(&self, event: RunEvent) -> anyhow::Result<()>;

    /// Subscribe to run events, returning a broadcast receiver.
    fn subscribe(&self) -> broadcast::Receiver<RunEvent>;
}

/// In-process broadcast bus for run events.
///
/// Multiple subscribers receive the same events (fan-out). Events published
/// while no subscriber exists are dropped.
#[derive(Clone, Debug)]
pub struct InProcEventBus {
    tx: broadcast::Sender<RunEvent>,
}

impl InProcEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl RunEventPublisher for InProcEventBus {
    async fn publish(&self, event: RunEvent) -> anyhow::Result<()> {
        // A send error just means no subscriber is listening.
        let _ = self.tx.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_fans_out_to_subscribers() {
        let bus = InProcEventBus::new(8);
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        let run_id = RunId::new();
        bus.publish(RunEvent::new(
            CaseId::from("case-1"),
            RunEventPayload::Admitted { run_id },
        ))
        .await
        .unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.meta.case_id.as_str(), "case-1");
            assert!(matches!(
                event.payload,
                RunEventPayload::Admitted { run_id: id } if id == run_id
            ));
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = InProcEventBus::new(8);
        let result = bus
            .publish(RunEvent::new(
                CaseId::from("case-1"),
                RunEventPayload::Completed {
                    run_id: RunId::new(),
                },
            ))
            .await;
        assert!(result.is_ok());
    }
}
