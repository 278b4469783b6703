//! Task relevance: which historical tasks still belong in the default view.
//!
//! The rules themselves live in [`rules`] (in-memory) and in the Postgres
//! store's `UPDATE`; [`RelevanceReconciler`] is the entrypoint services call,
//! and [`sweeper`] runs the global pass in the background.

pub mod rules;
pub mod sweeper;

use tracing::{info, instrument};

use crate::store::{RelevanceReport, RelevanceScope, StoreError, SystemStore};

pub use sweeper::{RelevanceSweeper, RelevanceSweeperHandle};

/// Re-derives task relevance through a [`SystemStore`].
#[derive(Debug, Clone)]
pub struct RelevanceReconciler<S> {
    store: S,
}

impl<S> RelevanceReconciler<S>
where
    S: SystemStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run one relevance pass over `scope`. Idempotent.
    #[instrument(skip(self), fields(scope = %scope), err)]
    pub async fn recompute(&self, scope: RelevanceScope) -> Result<RelevanceReport, StoreError> {
        let report = self.store.recompute_task_relevance(scope).await?;
        if report.marked_irrelevant > 0 {
            info!(
                scope = %scope,
                marked_irrelevant = report.marked_irrelevant,
                "tasks marked irrelevant"
            );
        }
        Ok(report)
    }

    pub async fn recompute_all(&self) -> Result<RelevanceReport, StoreError> {
        self.recompute(RelevanceScope::All).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use vigil_core::{JobId, Target, TargetId, Task, TaskId, TaskOp};

    use crate::store::InMemorySystemStore;

    fn superseded_failure(store: &InMemorySystemStore, target: &Target) -> Task {
        let job = JobId::new();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();

        let mut failed = Task::new(TaskId::new(), target.id, TaskOp::Backup, "failed");
        failed.job_id = Some(job);
        failed.started_at = Some(t0);
        let mut success = Task::new(TaskId::new(), target.id, TaskOp::Backup, "done");
        success.job_id = Some(job);
        success.ok = true;
        success.started_at = Some(t0 + Duration::days(1));

        store.insert_task(failed.clone()).unwrap();
        store.insert_task(success).unwrap();
        failed
    }

    #[tokio::test]
    async fn second_pass_changes_nothing() {
        let store = InMemorySystemStore::arc();
        let target = Target::new(TargetId::new(), "files-01", "fs");
        store.insert_target(target.clone()).unwrap();
        let failed = superseded_failure(&store, &target);

        let reconciler = RelevanceReconciler::new(store.clone());
        let first = reconciler.recompute_all().await.unwrap();
        assert_eq!(first.marked_irrelevant, 1);
        assert!(!store.task(failed.id).unwrap().unwrap().relevant);
        let relevant_after_first = store.relevant_task_ids().unwrap();

        let second = reconciler.recompute_all().await.unwrap();
        assert_eq!(second, RelevanceReport::default());
        assert_eq!(store.relevant_task_ids().unwrap(), relevant_after_first);
    }

    #[tokio::test]
    async fn scoped_pass_leaves_other_targets_alone() {
        let store = Arc::new(InMemorySystemStore::new());
        let a = Target::new(TargetId::new(), "a", "fs");
        let b = Target::new(TargetId::new(), "b", "fs");
        store.insert_target(a.clone()).unwrap();
        store.insert_target(b.clone()).unwrap();
        let failed_a = superseded_failure(&store, &a);
        let failed_b = superseded_failure(&store, &b);

        let reconciler = RelevanceReconciler::new(store.clone());
        let report = reconciler.recompute(RelevanceScope::Target(a.id)).await.unwrap();

        assert_eq!(report.marked_irrelevant, 1);
        assert!(!store.task(failed_a.id).unwrap().unwrap().relevant);
        assert!(store.task(failed_b.id).unwrap().unwrap().relevant);
    }
}
