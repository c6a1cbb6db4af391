//! Corral - Credential lease pool and idempotent run coordination.
//!
//! A foundational crate for safely sharing a small pool of exclusive
//! credentials ("resources") across concurrently-arriving, at-least-once
//! delivered job requests, while guaranteeing each logical job executes to
//! completion at most once.
//!
//! # Core Concepts
//!
//! - **Resource**: A unit of shared, exclusively-held credential capacity,
//!   leased to one run at a time through the [`ResourcePool`] trait's atomic
//!   conditional claim.
//!
//! - **Run**: One physical attempt to process a job request, recorded in the
//!   [`RunLedger`]. Runs carry their own [`RunId`]; the caller-supplied
//!   [`CaseId`] identifies the logical job across redeliveries.
//!
//! - **Coordinator**: The [`JobCoordinator`] drives each inbound request
//!   through idempotency check, admission, resource locking, execution, and
//!   guaranteed release, converting every failure into a terminal ledger
//!   status.
//!
//! - **Events**: [`RunEventPublisher`] and [`InProcEventBus`] broadcast run
//!   lifecycle transitions for reactive workflows and observability.
//!
//! # Feature Flags
//!
//! - `postgres` - PostgreSQL persistence support via sqlx
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use corral::*;
//! use corral::coordinator::JobCoordinatorBuilder;
//!
//! let coordinator = JobCoordinatorBuilder::new(CoordinatorConfig::default())
//!     .with_pool(pool)
//!     .with_ledger(ledger)
//!     .with_vault(vault)
//!     .with_executor(executor)
//!     .build()?;
//!
//! let handled = coordinator.handle(request).await;
//! ```

/// Run coordination state machine and builder.
///
/// The `coordinator` module provides [`JobCoordinator`], the per-request
/// state machine, along with [`RunOutcome`], [`IngestAck`], and
/// [`JobCoordinatorBuilder`].
pub mod coordinator;

/// Configuration structures for persistence and coordinator settings.
pub mod config;

/// The failure taxonomy.
///
/// The `error` module defines the typed errors that flow through the core:
/// [`ValidationError`], [`PoolError`], [`LedgerError`], [`VaultError`], and
/// [`ExecutionError`].
pub mod error;

/// Run lifecycle event publishing and subscription.
///
/// The `events` module provides [`RunEvent`] and [`RunEventPayload`] for
/// event data, the [`RunEventPublisher`] trait, and [`InProcEventBus`] for
/// in-process broadcasting.
pub mod events;

/// External automation executor interface.
pub mod executor;

/// Admission ceiling policy.
pub mod gate;

/// Run ledger trait and admission outcomes.
///
/// The `ledger` module defines the [`RunLedger`] trait for ledger backends:
/// the idempotency lookup, the admission-gated insert, and the guarded
/// terminal transition.
pub mod ledger;

/// Resource pool trait and snapshotting.
///
/// The `pool` module defines the [`ResourcePool`] trait for pool backends
/// and [`PoolSnapshot`] for monitoring pool capacity.
pub mod pool;

/// Resource data model.
pub mod resource;

/// Run data model and inbound request validation.
pub mod run;

/// Tracing and telemetry instrumentation.
pub mod telemetry;

/// Credential vault interface.
pub mod vault;

#[cfg(feature = "metrics")]
/// Prometheus metrics, enabled with the `metrics` feature.
pub mod metrics;

#[cfg(feature = "postgres")]
/// PostgreSQL persistence implementations, enabled with the `postgres`
/// feature.
pub mod persistence;

pub use config::*;
pub use coordinator::{
    HandledRun, IngestAck, JobCoordinator, JobCoordinatorBuilder, RunOutcome,
    NO_RESOURCE_MESSAGE,
};
pub use error::*;
pub use events::*;
pub use executor::*;
pub use gate::*;
pub use ledger::*;
pub use pool::*;
pub use resource::*;
pub use run::*;
pub use vault::*;
