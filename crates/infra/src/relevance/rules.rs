//! Task relevance rules.
//!
//! Relevance only ever goes from `true` to `false`. A finished task drops
//! out of default views when
//!
//! 1. every archive it produced is gone (purged or expired), or
//! 2. it did not succeed and a later successful run of the same job and
//!    operation exists.
//!
//! Pending and running tasks always stay visible.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use vigil_core::{Archive, JobId, Task, TaskId, TaskOp};

/// Tasks among `tasks` that should now be marked irrelevant.
///
/// `tasks` must contain every task of each job involved (superseding runs are
/// looked up among them); `archives` must cover the same targets.
pub fn newly_irrelevant<'a, T, A>(tasks: T, archives: A) -> Vec<TaskId>
where
    T: IntoIterator<Item = &'a Task>,
    A: IntoIterator<Item = &'a Archive>,
{
    let tasks: Vec<&Task> = tasks.into_iter().collect();

    // (any valid, any gone) per owning task
    let mut artifacts: HashMap<TaskId, (bool, bool)> = HashMap::new();
    for a in archives {
        let e = artifacts.entry(a.task_id).or_default();
        e.0 |= a.is_valid();
        e.1 |= a.status.is_gone();
    }

    let mut latest_success: HashMap<(JobId, TaskOp), DateTime<Utc>> = HashMap::new();
    for t in tasks.iter().filter(|t| t.ok) {
        if let (Some(job), Some(started)) = (t.job_id, t.started_at) {
            let e = latest_success.entry((job, t.op.clone())).or_insert(started);
            if started > *e {
                *e = started;
            }
        }
    }

    tasks
        .iter()
        .filter(|t| t.relevant && t.is_finished())
        .filter(|t| {
            let artifacts_gone = matches!(artifacts.get(&t.id), Some((false, true)));
            let superseded = !t.ok
                && match (t.job_id, t.started_at) {
                    (Some(job), Some(started)) => latest_success
                        .get(&(job, t.op.clone()))
                        .is_some_and(|latest| *latest > started),
                    _ => false,
                };
            artifacts_gone || superseded
        })
        .map(|t| t.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vigil_core::{ArchiveId, ArchiveStatus, TargetId};

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn run(target: TargetId, job: JobId, ok: bool, status: &str, started: Option<i64>) -> Task {
        let mut t = Task::new(TaskId::new(), target, TaskOp::Backup, status);
        t.job_id = Some(job);
        t.ok = ok;
        t.started_at = started.map(at);
        t
    }

    fn archive(task: &Task, status: ArchiveStatus) -> Archive {
        let mut a = Archive::new(ArchiveId::new(), task.target_id, task.id, "daily", at(0), at(48)).unwrap();
        a.status = status;
        a
    }

    #[test]
    fn failure_superseded_by_later_success() {
        let tgt = TargetId::new();
        let job = JobId::new();
        let failed = run(tgt, job, false, "failed", Some(1));
        let success = run(tgt, job, true, "done", Some(2));

        let out = newly_irrelevant([&failed, &success], []);
        assert_eq!(out, vec![failed.id]);
    }

    #[test]
    fn failure_after_last_success_stays() {
        let tgt = TargetId::new();
        let job = JobId::new();
        let success = run(tgt, job, true, "done", Some(1));
        let failed = run(tgt, job, false, "failed", Some(2));

        assert!(newly_irrelevant([&failed, &success], []).is_empty());
    }

    #[test]
    fn other_jobs_do_not_supersede() {
        let tgt = TargetId::new();
        let failed = run(tgt, JobId::new(), false, "failed", Some(1));
        let success = run(tgt, JobId::new(), true, "done", Some(2));

        assert!(newly_irrelevant([&failed, &success], []).is_empty());
    }

    #[test]
    fn purged_artifact_drops_task() {
        let tgt = TargetId::new();
        let done = run(tgt, JobId::new(), true, "done", Some(1));
        let purged = archive(&done, ArchiveStatus::Purged);

        assert_eq!(newly_irrelevant([&done], [&purged]), vec![done.id]);
    }

    #[test]
    fn invalid_artifact_keeps_task() {
        let tgt = TargetId::new();
        let done = run(tgt, JobId::new(), true, "done", Some(1));
        let invalid = archive(&done, ArchiveStatus::Invalid);

        assert!(newly_irrelevant([&done], [&invalid]).is_empty());
    }

    #[test]
    fn running_tasks_are_never_dropped() {
        let tgt = TargetId::new();
        let job = JobId::new();
        let running = run(tgt, job, false, "running", Some(1));
        let success = run(tgt, job, true, "done", Some(2));

        assert!(newly_irrelevant([&running, &success], []).is_empty());
    }

    #[test]
    fn already_irrelevant_tasks_are_not_reported() {
        let tgt = TargetId::new();
        let job = JobId::new();
        let mut failed = run(tgt, job, false, "failed", Some(1));
        failed.relevant = false;
        let success = run(tgt, job, true, "done", Some(2));

        assert!(newly_irrelevant([&failed, &success], []).is_empty());
    }
}
