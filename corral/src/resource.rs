use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

/// Stable identifier for a leasable resource.
///
/// Resources are provisioned out-of-band; the coordinator never creates or
/// deletes them.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lease state of a resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Available,
    Locked,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Locked => "locked",
        }
    }
}

impl Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of shared, exclusively-held credential capacity.
///
/// Invariant: `status == Locked` iff `holder_run_id` is `Some`, and at most
/// one run holds a given resource at any time. The store's conditional
/// update, not any in-process lock, enforces this across processes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub status: ResourceStatus,
    pub holder_run_id: Option<RunId>,
    /// Vault key under which this resource's credential is stored.
    pub secret_ref: String,
    pub last_updated: DateTime<Utc>,
}

impl Resource {
    /// Create an unheld resource, as provisioning would.
    pub fn available(id: impl Into<ResourceId>, secret_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ResourceStatus::Available,
            holder_run_id: None,
            secret_ref: secret_ref.into(),
            last_updated: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ResourceStatus::Available && self.holder_run_id.is_none()
    }
}
