//! System view: a target joined with its jobs, relevant tasks, and the valid
//! archives those tasks produced.
//!
//! `compose_system_view` is pure. Callers fetch the rows (only relevant tasks,
//! only valid archives) and this module does the joining and derived fields.
//! Archives in any other status are dropped here as well, so a stale row can
//! never surface as a dead link.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::id::{ArchiveId, JobId, PolicyId, StoreId, TargetId, TaskId};
use crate::target::{Job, Target};
use crate::task::Task;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemView {
    pub uuid: TargetId,
    pub name: String,
    pub notes: String,
    pub ok: bool,
    pub jobs: Vec<SystemJob>,
    pub tasks: Vec<SystemTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemJob {
    pub uuid: JobId,
    pub schedule: String,
    pub from: String,
    pub to: String,
    pub ok: bool,
    pub store: JobStore,
    pub keep: JobKeep,
    pub retention: JobRetention,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStore {
    pub uuid: StoreId,
    pub name: String,
    pub summary: String,
    pub plugin: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobKeep {
    pub n: u32,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRetention {
    pub uuid: PolicyId,
    pub name: String,
    pub summary: String,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTask {
    pub uuid: TaskId,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub owner: String,
    /// Unix seconds; `0` when the task never started.
    pub started_at: i64,
    pub ok: bool,
    pub notes: String,
    pub disposition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<SystemArchive>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemArchive {
    pub uuid: ArchiveId,
    pub schedule: String,
    pub taken_at: i64,
    /// Whole days between taken and expiry, rounded down.
    pub expiry: i64,
    /// Bytes; `-1` when unknown.
    pub size: i64,
    pub ok: bool,
    pub notes: String,
}

/// Whole days between `taken_at` and `expires_at`, rounded toward negative
/// infinity.
pub fn expiry_days(taken_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    (expires_at.timestamp() - taken_at.timestamp()).div_euclid(SECONDS_PER_DAY)
}

/// Unix seconds, with `0` standing in for "never".
pub fn unix_or_zero(at: Option<DateTime<Utc>>) -> i64 {
    at.map(|t| t.timestamp()).unwrap_or(0)
}

impl From<&Job> for SystemJob {
    fn from(job: &Job) -> Self {
        Self {
            uuid: job.id,
            schedule: job.schedule.clone(),
            from: job.from.clone(),
            to: job.to.clone(),
            ok: job.healthy,
            store: JobStore {
                uuid: job.store.id,
                name: job.store.name.clone(),
                summary: job.store.summary.clone(),
                plugin: job.store.plugin.clone(),
            },
            keep: JobKeep {
                n: job.keep.n,
                days: job.keep.days,
            },
            retention: JobRetention {
                uuid: job.retention.id,
                name: job.retention.name.clone(),
                summary: job.retention.summary.clone(),
                days: job.retention.days,
            },
        }
    }
}

impl From<&Archive> for SystemArchive {
    fn from(archive: &Archive) -> Self {
        Self {
            uuid: archive.id,
            schedule: archive.schedule.clone(),
            taken_at: archive.taken_at().timestamp(),
            expiry: expiry_days(archive.taken_at(), archive.expires_at()),
            size: archive.size.to_wire(),
            ok: archive.is_valid(),
            notes: archive.notes.clone(),
        }
    }
}

impl SystemView {
    /// View of a target with its jobs and no task history.
    pub fn summary(target: &Target, jobs: &[Job]) -> Self {
        Self {
            uuid: target.id,
            name: target.name.clone(),
            notes: target.notes.clone(),
            ok: target.healthy,
            jobs: jobs.iter().map(SystemJob::from).collect(),
            tasks: Vec::new(),
        }
    }
}

/// Join a target's jobs, tasks and archives into a view.
///
/// Archives are matched to tasks by their owning task id; only `valid`
/// archives are attached. Task order is preserved.
pub fn compose_system_view(
    target: &Target,
    jobs: &[Job],
    tasks: &[Task],
    archives: &[Archive],
) -> SystemView {
    let by_task: HashMap<TaskId, &Archive> = archives
        .iter()
        .filter(|a| a.is_valid())
        .map(|a| (a.task_id, a))
        .collect();

    let tasks = tasks
        .iter()
        .map(|task| SystemTask {
            uuid: task.id,
            kind: task.op.to_string(),
            status: task.status.clone(),
            owner: task.owner.clone(),
            started_at: unix_or_zero(task.started_at),
            ok: task.ok,
            notes: task.notes.clone(),
            disposition: task.disposition.clone(),
            archive: by_task.get(&task.id).map(|a| SystemArchive::from(*a)),
        })
        .collect();

    SystemView {
        tasks,
        ..SystemView::summary(target, jobs)
    }
}
