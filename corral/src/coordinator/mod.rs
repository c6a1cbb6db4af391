//! Run coordination: the state machine that drives one inbound request
//! through idempotency check, admission, resource locking, execution,
//! release, and the terminal ledger write.

mod builder;
#[allow(clippy::module_inception)]
mod coordinator;

pub use builder::JobCoordinatorBuilder;
pub use coordinator::{
    HandledRun, IngestAck, JobCoordinator, RunOutcome, NO_RESOURCE_MESSAGE,
};
