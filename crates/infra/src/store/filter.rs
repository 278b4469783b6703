//! Query filters shared by all store implementations.

use vigil_core::{Archive, ArchiveStatus, Target, TargetId, Task};

/// Target listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// Name to search for; substring match (case-insensitive) unless `exact`.
    pub name: Option<String>,
    pub exact: bool,
    pub plugin: Option<String>,
    /// `Some(true)`: only targets with at least one job.
    /// `Some(false)`: only targets without jobs.
    pub used: Option<bool>,
}

impl TargetFilter {
    pub fn matches(&self, target: &Target, has_jobs: bool) -> bool {
        let name_ok = match &self.name {
            None => true,
            Some(n) if self.exact => target.name == *n,
            Some(n) => target.name.to_lowercase().contains(&n.to_lowercase()),
        };
        let plugin_ok = self.plugin.as_ref().is_none_or(|p| target.plugin == *p);
        let used_ok = self.used.is_none_or(|u| u == has_jobs);
        name_ok && plugin_ok && used_ok
    }
}

/// Task listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub target_id: Option<TargetId>,
    pub relevant_only: bool,
}

impl TaskFilter {
    pub fn relevant_for(target_id: TargetId) -> Self {
        Self {
            target_id: Some(target_id),
            relevant_only: true,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.target_id.is_none_or(|t| task.target_id == t) && (!self.relevant_only || task.relevant)
    }
}

/// Archive listing filter. An empty `statuses` list matches any status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveFilter {
    pub target_id: Option<TargetId>,
    pub statuses: Vec<ArchiveStatus>,
}

impl ArchiveFilter {
    pub fn valid_for(target_id: TargetId) -> Self {
        Self {
            target_id: Some(target_id),
            statuses: vec![ArchiveStatus::Valid],
        }
    }

    pub fn matches(&self, archive: &Archive) -> bool {
        self.target_id.is_none_or(|t| archive.target_id == t)
            && (self.statuses.is_empty() || self.statuses.contains(&archive.status))
    }
}
