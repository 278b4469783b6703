//! Tasks: single executions of an operation against a target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{ArchiveId, JobId, TargetId, TaskId};

/// Operation a task executes.
///
/// The execution engine owns this vocabulary; unknown labels are carried
/// through untouched in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskOp {
    Backup,
    Restore,
    Purge,
    TestStore,
    AgentStatus,
    Other(String),
}

impl TaskOp {
    pub fn as_str(&self) -> &str {
        match self {
            TaskOp::Backup => "backup",
            TaskOp::Restore => "restore",
            TaskOp::Purge => "purge",
            TaskOp::TestStore => "test-store",
            TaskOp::AgentStatus => "agent-status",
            TaskOp::Other(s) => s,
        }
    }
}

impl From<&str> for TaskOp {
    fn from(value: &str) -> Self {
        match value {
            "backup" => TaskOp::Backup,
            "restore" => TaskOp::Restore,
            "purge" => TaskOp::Purge,
            "test-store" => TaskOp::TestStore,
            "agent-status" => TaskOp::AgentStatus,
            other => TaskOp::Other(other.to_string()),
        }
    }
}

impl From<String> for TaskOp {
    fn from(value: String) -> Self {
        TaskOp::from(value.as_str())
    }
}

impl From<TaskOp> for String {
    fn from(value: TaskOp) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for TaskOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle labels that mean the engine is finished with a task.
pub const FINISHED_STATUSES: [&str; 3] = ["done", "failed", "canceled"];

/// One execution instance of an operation against a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub target_id: TargetId,
    pub job_id: Option<JobId>,
    pub op: TaskOp,
    /// Free-form lifecycle label owned by the execution engine.
    pub status: String,
    pub owner: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ok: bool,
    /// Operator disposition, if one has been recorded.
    pub disposition: Option<String>,
    /// Operator notes.
    pub notes: String,
    archive_id: Option<ArchiveId>,
    /// Whether the task is surfaced in default views. Maintained by relevance
    /// reconciliation only.
    pub relevant: bool,
}

impl Task {
    pub fn new(id: TaskId, target_id: TargetId, op: TaskOp, status: impl Into<String>) -> Self {
        Self {
            id,
            target_id,
            job_id: None,
            op,
            status: status.into(),
            owner: String::new(),
            started_at: None,
            ok: false,
            disposition: None,
            notes: String::new(),
            archive_id: None,
            relevant: true,
        }
    }

    pub fn archive_id(&self) -> Option<ArchiveId> {
        self.archive_id
    }

    /// Record the archive this task produced.
    ///
    /// Only successful backups produce archives.
    pub fn link_archive(&mut self, archive_id: ArchiveId) -> DomainResult<()> {
        if self.op != TaskOp::Backup || !self.ok {
            return Err(DomainError::invariant(format!(
                "task {} ({}, ok={}) cannot reference an archive",
                self.id, self.op, self.ok
            )));
        }
        self.archive_id = Some(archive_id);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        FINISHED_STATUSES.contains(&self.status.as_str())
    }
}

impl Entity for Task {
    type Id = TaskId;
    const KIND: &'static str = "task";

    fn id(&self) -> &TaskId {
        &self.id
    }
}
