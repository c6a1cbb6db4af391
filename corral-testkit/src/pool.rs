use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use corral::error::PoolError;
use corral::pool::{PoolSnapshot, ResourcePool};
use corral::resource::{Resource, ResourceId, ResourceStatus};
use corral::run::RunId;

/// In-memory resource pool.
///
/// A single mutex guards the whole table, so each `acquire` is atomic the
/// way the store's conditional update is in production. Selection among
/// available resources follows the map's iteration order, which is
/// arbitrary, matching the no-ordering guarantee of the trait.
#[derive(Clone)]
pub struct InMemoryResourcePool {
    resources: Arc<Mutex<HashMap<ResourceId, Resource>>>,
    failing: Arc<Mutex<bool>>,
}

impl InMemoryResourcePool {
    pub fn new() -> Self {
        Self {
            resources: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(false)),
        }
    }

    /// Build a pool of `count` resources named `cred-1..cred-count`, each
    /// with a `secret/cred-N` vault reference.
    pub fn with_resources(count: usize) -> Self {
        let pool = Self::new();
        for n in 1..=count {
            pool.seed(Resource::available(
                format!("cred-{n}"),
                format!("secret/cred-{n}"),
            ));
        }
        pool
    }

    /// Insert a resource, as out-of-band provisioning would.
    pub fn seed(&self, resource: Resource) {
        self.resources.lock().insert(resource.id.clone(), resource);
    }

    /// Make every subsequent call fail with a store error until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// The resource currently held by `run_id`, if any.
    pub fn held_by(&self, run_id: RunId) -> Option<Resource> {
        self.resources
            .lock()
            .values()
            .find(|r| r.holder_run_id == Some(run_id))
            .cloned()
    }

    fn check_failing(&self) -> Result<(), PoolError> {
        if *self.failing.lock() {
            Err(PoolError::Store("injected store failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryResourcePool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourcePool for InMemoryResourcePool {
    async fn acquire(&self, run_id: RunId) -> Result<Option<Resource>, PoolError> {
        self.check_failing()?;
        let mut resources = self.resources.lock();

        let candidate = resources
            .values()
            .find(|r| r.is_available())
            .map(|r| r.id.clone());

        match candidate {
            Some(id) => {
                let resource = resources.get_mut(&id).expect("candidate exists");
                resource.status = ResourceStatus::Locked;
                resource.holder_run_id = Some(run_id);
                resource.last_updated = Utc::now();
                Ok(Some(resource.clone()))
            }
            None => Ok(None),
        }
    }

    async fn release(&self, run_id: RunId) -> Result<(), PoolError> {
        self.check_failing()?;
        let mut resources = self.resources.lock();

        for resource in resources.values_mut() {
            if resource.holder_run_id == Some(run_id) {
                resource.status = ResourceStatus::Available;
                resource.holder_run_id = None;
                resource.last_updated = Utc::now();
            }
        }
        Ok(())
    }

    async fn available_count(&self) -> Result<usize, PoolError> {
        self.check_failing()?;
        Ok(self
            .resources
            .lock()
            .values()
            .filter(|r| r.is_available())
            .count())
    }

    async fn snapshot(&self) -> Result<PoolSnapshot, PoolError> {
        self.check_failing()?;
        let resources = self.resources.lock();
        let available = resources.values().filter(|r| r.is_available()).count();
        let locked = resources.len() - available;
        Ok(PoolSnapshot::new(available, locked))
    }
}
