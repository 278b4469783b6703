//! Archives: data artifacts produced by successful backup tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use crate::id::{ArchiveId, TargetId, TaskId};

/// Archive lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArchiveStatus {
    Valid,
    Invalid,
    Purged,
    ManuallyPurged,
    Expired,
    Other(String),
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ArchiveStatus::Valid => "valid",
            ArchiveStatus::Invalid => "invalid",
            ArchiveStatus::Purged => "purged",
            ArchiveStatus::ManuallyPurged => "manually-purged",
            ArchiveStatus::Expired => "expired",
            ArchiveStatus::Other(s) => s,
        }
    }

    /// Whether the archive's data is gone for good.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            ArchiveStatus::Purged | ArchiveStatus::ManuallyPurged | ArchiveStatus::Expired
        )
    }
}

impl From<&str> for ArchiveStatus {
    fn from(value: &str) -> Self {
        match value {
            "valid" => ArchiveStatus::Valid,
            "invalid" => ArchiveStatus::Invalid,
            "purged" => ArchiveStatus::Purged,
            "manually-purged" => ArchiveStatus::ManuallyPurged,
            "expired" => ArchiveStatus::Expired,
            other => ArchiveStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ArchiveStatus {
    fn from(value: String) -> Self {
        ArchiveStatus::from(value.as_str())
    }
}

impl From<ArchiveStatus> for String {
    fn from(value: ArchiveStatus) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive size. Storage backends do not always report one.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveSize {
    #[default]
    Unknown,
    Bytes(u64),
}

impl ArchiveSize {
    /// Wire encoding: `-1` when unknown.
    pub fn to_wire(self) -> i64 {
        match self {
            ArchiveSize::Unknown => -1,
            ArchiveSize::Bytes(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    pub fn from_wire(value: Option<i64>) -> Self {
        match value {
            Some(n) if n >= 0 => ArchiveSize::Bytes(n as u64),
            _ => ArchiveSize::Unknown,
        }
    }
}

/// A data artifact produced by exactly one backup task.
///
/// Only built through [`Archive::new`]; not deserializable, so the expiry
/// ordering always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    pub id: ArchiveId,
    pub target_id: TargetId,
    /// The task that produced this archive.
    pub task_id: TaskId,
    /// Name of the schedule that produced it.
    pub schedule: String,
    taken_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    pub status: ArchiveStatus,
    pub notes: String,
    pub size: ArchiveSize,
}

impl Archive {
    /// Create an archive record. `expires_at` must not precede `taken_at`.
    pub fn new(
        id: ArchiveId,
        target_id: TargetId,
        task_id: TaskId,
        schedule: impl Into<String>,
        taken_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if expires_at < taken_at {
            return Err(DomainError::invariant(format!(
                "archive {id} expires ({expires_at}) before it was taken ({taken_at})"
            )));
        }
        Ok(Self {
            id,
            target_id,
            task_id,
            schedule: schedule.into(),
            taken_at,
            expires_at,
            status: ArchiveStatus::Valid,
            notes: String::new(),
            size: ArchiveSize::Unknown,
        })
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.status == ArchiveStatus::Valid
    }
}

impl Entity for Archive {
    type Id = ArchiveId;
    const KIND: &'static str = "archive";

    fn id(&self) -> &ArchiveId {
        &self.id
    }
}
