//! Protected systems (targets) and the backup jobs bound to them.
//!
//! Both are read-only from this crate's point of view: they are created and
//! updated elsewhere and only ever projected into views.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::id::{JobId, PolicyId, StoreId, TargetId};

/// A protected system under backup management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub summary: String,
    /// Backup plugin used to protect this system (e.g. `fs`, `postgres`).
    pub plugin: String,
    pub endpoint: String,
    pub notes: String,
    /// Aggregate health flag (`ok` on the wire).
    pub healthy: bool,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            summary: String::new(),
            plugin: plugin.into(),
            endpoint: String::new(),
            notes: String::new(),
            healthy: true,
        }
    }
}

impl Entity for Target {
    type Id = TargetId;
    const KIND: &'static str = "system";

    fn id(&self) -> &TargetId {
        &self.id
    }
}

/// Reference to the storage endpoint a job writes archives to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRef {
    pub id: StoreId,
    pub name: String,
    pub summary: String,
    pub plugin: String,
}

/// Keep policy: how many archives and for how many days.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keep {
    pub n: u32,
    pub days: u32,
}

/// Reference to the retention policy governing a job's archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRef {
    pub id: PolicyId,
    pub name: String,
    pub summary: String,
    pub days: u32,
}

/// A named, scheduled backup configuration bound to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub target_id: TargetId,
    /// Schedule expression (e.g. `daily 4am`).
    pub schedule: String,
    /// Source endpoint label.
    pub from: String,
    /// Destination label.
    pub to: String,
    pub store: StoreRef,
    pub keep: Keep,
    pub retention: RetentionRef,
    pub healthy: bool,
}

impl Entity for Job {
    type Id = JobId;
    const KIND: &'static str = "job";

    fn id(&self) -> &JobId {
        &self.id
    }
}
