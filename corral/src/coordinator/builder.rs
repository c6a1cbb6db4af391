use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::events::{InProcEventBus, RunEventPublisher};
use crate::executor::AutomationExecutor;
use crate::ledger::RunLedger;
use crate::pool::ResourcePool;
use crate::vault::CredentialVault;

use super::coordinator::JobCoordinator;

/// Builder for constructing a [`JobCoordinator`] with explicit dependencies.
///
/// The builder validates that all required collaborators are provided before
/// constructing the coordinator. The event publisher is the only optional
/// dependency; it defaults to an in-process bus.
///
/// # Example
///
/// ```ignore
/// use corral::coordinator::JobCoordinatorBuilder;
///
/// let coordinator = JobCoordinatorBuilder::new(config)
///     .with_pool(pool)
///     .with_ledger(ledger)
///     .with_vault(vault)
///     .with_executor(executor)
///     .build()?;
/// ```
pub struct JobCoordinatorBuilder<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    config: CoordinatorConfig,
    pool: Option<Arc<P>>,
    ledger: Option<Arc<L>>,
    vault: Option<Arc<V>>,
    executor: Option<Arc<X>>,
    events: Option<Arc<dyn RunEventPublisher>>,
}

impl<P, L, V, X> fmt::Debug for JobCoordinatorBuilder<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("JobCoordinatorBuilder");
        debug.field("config", &self.config);
        debug.field("pool_set", &self.pool.is_some());
        debug.field("ledger_set", &self.ledger.is_some());
        debug.field("vault_set", &self.vault.is_some());
        debug.field("executor_set", &self.executor.is_some());
        debug.field("events_set", &self.events.is_some());

        if self.pool.is_some() {
            debug.field("pool_type", &type_name::<P>());
        }
        if self.ledger.is_some() {
            debug.field("ledger_type", &type_name::<L>());
        }
        if self.executor.is_some() {
            debug.field("executor_type", &type_name::<X>());
        }

        debug.finish()
    }
}

impl<P, L, V, X> JobCoordinatorBuilder<P, L, V, X>
where
    P: ResourcePool + 'static,
    L: RunLedger + 'static,
    V: CredentialVault + 'static,
    X: AutomationExecutor + 'static,
{
    /// Create a new builder with the given coordinator configuration.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            pool: None,
            ledger: None,
            vault: None,
            executor: None,
            events: None,
        }
    }

    /// Set the resource pool.
    pub fn with_pool(mut self, pool: Arc<P>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the run ledger.
    pub fn with_ledger(mut self, ledger: Arc<L>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the credential vault.
    pub fn with_vault(mut self, vault: Arc<V>) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Set the automation executor.
    pub fn with_executor(mut self, executor: Arc<X>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the run event publisher.
    pub fn with_events(mut self, events: Arc<dyn RunEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate the dependencies and construct the coordinator.
    pub fn build(self) -> anyhow::Result<JobCoordinator<P, L, V, X>> {
        let pool = self
            .pool
            .ok_or_else(|| anyhow::anyhow!("resource pool is required"))?;
        let ledger = self
            .ledger
            .ok_or_else(|| anyhow::anyhow!("run ledger is required"))?;
        let vault = self
            .vault
            .ok_or_else(|| anyhow::anyhow!("credential vault is required"))?;
        let executor = self
            .executor
            .ok_or_else(|| anyhow::anyhow!("automation executor is required"))?;
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InProcEventBus::default()));

        Ok(JobCoordinator::new(
            self.config,
            pool,
            ledger,
            vault,
            executor,
            events,
        ))
    }
}
