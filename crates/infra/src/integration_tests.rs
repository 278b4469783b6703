//! Integration tests for the annotate → reconcile → view pipeline.
//!
//! Verifies:
//! - A batch with an invalid entry changes nothing
//! - Annotations apply in order and a store failure stops the batch
//! - Re-applying a batch is idempotent
//! - Purged archives vanish from the view and their tasks drop out

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use vigil_core::annotation::TaskAnnotationUpdate;
    use vigil_core::{
        Archive, ArchiveId, ArchiveStatus, Job, JobId, RawAnnotation, Target, TargetId, Task,
        TaskId, TaskOp,
    };

    use crate::annotations::AnnotationApplier;
    use crate::error::ServiceError;
    use crate::store::{
        ArchiveFilter, InMemorySystemStore, RelevanceReport, RelevanceScope, StoreError,
        SystemStore, TargetFilter, TaskFilter,
    };
    use crate::system_view::ViewBuilder;

    /// Wraps the in-memory store and fails selected calls.
    #[derive(Debug, Clone)]
    struct FailingStore {
        inner: Arc<InMemorySystemStore>,
        fail_task: Option<TaskId>,
        fail_recompute: Arc<AtomicBool>,
    }

    impl FailingStore {
        fn new(inner: Arc<InMemorySystemStore>) -> Self {
            Self {
                inner,
                fail_task: None,
                fail_recompute: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait::async_trait]
    impl SystemStore for FailingStore {
        async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
            self.inner.get_target(id).await
        }

        async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<Target>, StoreError> {
            self.inner.list_targets(filter).await
        }

        async fn list_jobs(&self, target_id: TargetId) -> Result<Vec<Job>, StoreError> {
            self.inner.list_jobs(target_id).await
        }

        async fn list_archives(&self, filter: &ArchiveFilter) -> Result<Vec<Archive>, StoreError> {
            self.inner.list_archives(filter).await
        }

        async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks(filter).await
        }

        async fn update_task_annotation(
            &self,
            target_id: TargetId,
            task_id: TaskId,
            update: &TaskAnnotationUpdate,
        ) -> Result<(), StoreError> {
            if self.fail_task == Some(task_id) {
                return Err(StoreError::Backend("disk quota exceeded".into()));
            }
            self.inner.update_task_annotation(target_id, task_id, update).await
        }

        async fn update_archive_annotation(
            &self,
            target_id: TargetId,
            archive_id: ArchiveId,
            notes: &str,
        ) -> Result<(), StoreError> {
            self.inner.update_archive_annotation(target_id, archive_id, notes).await
        }

        async fn recompute_task_relevance(
            &self,
            scope: RelevanceScope,
        ) -> Result<RelevanceReport, StoreError> {
            if self.fail_recompute.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("statement timeout".into()));
            }
            self.inner.recompute_task_relevance(scope).await
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 1, 0, 0).unwrap()
    }

    fn raw(v: serde_json::Value) -> Vec<RawAnnotation> {
        serde_json::from_value(v).unwrap()
    }

    struct Fixture {
        store: Arc<InMemorySystemStore>,
        target: Target,
        tasks: Vec<Task>,
    }

    /// One target with three failed backup tasks of distinct jobs.
    fn fixture() -> Fixture {
        let store = InMemorySystemStore::arc();
        let target = Target::new(TargetId::new(), "mail-01", "fs");
        store.insert_target(target.clone()).unwrap();

        let tasks: Vec<Task> = (0..3)
            .map(|i| {
                let mut t = Task::new(TaskId::new(), target.id, TaskOp::Backup, "failed");
                t.job_id = Some(JobId::new());
                t.started_at = Some(t0() + Duration::hours(i));
                store.insert_task(t.clone()).unwrap();
                t
            })
            .collect();

        Fixture {
            store,
            target,
            tasks,
        }
    }

    #[tokio::test]
    async fn bogus_entry_rejects_batch_before_any_write() {
        let f = fixture();
        let x = &f.tasks[0];
        let applier = AnnotationApplier::new(f.store.clone());

        let err = applier
            .apply_raw(
                f.target.id,
                raw(json!([
                    {"type": "task", "uuid": x.id.to_string(), "notes": "ok"},
                    {"type": "bogus", "uuid": x.id.to_string()},
                ])),
            )
            .await
            .unwrap_err();

        match err {
            ServiceError::Validation(msg) => assert!(msg.contains("bogus"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.store.task(x.id).unwrap().unwrap().notes, "");
    }

    #[tokio::test]
    async fn store_failure_mid_batch_keeps_earlier_items_only() {
        let f = fixture();
        let mut failing = FailingStore::new(f.store.clone());
        failing.fail_task = Some(f.tasks[1].id);
        let applier = AnnotationApplier::new(failing);

        let batch = raw(json!(
            f.tasks
                .iter()
                .map(|t| json!({"type": "task", "uuid": t.id.to_string(), "notes": "seen"}))
                .collect::<Vec<_>>()
        ));
        let err = applier.apply_raw(f.target.id, batch).await.unwrap_err();

        match err {
            ServiceError::Annotate { entity, id, .. } => {
                assert_eq!(entity, "task");
                assert_eq!(id, f.tasks[1].id.to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let notes: Vec<String> = f
            .tasks
            .iter()
            .map(|t| f.store.task(t.id).unwrap().unwrap().notes)
            .collect();
        assert_eq!(notes, vec!["seen", "", ""]);
    }

    #[tokio::test]
    async fn reconcile_failure_keeps_annotations() {
        let f = fixture();
        let failing = FailingStore::new(f.store.clone());
        failing.fail_recompute.store(true, Ordering::SeqCst);
        let applier = AnnotationApplier::new(failing);
        let x = &f.tasks[0];

        let err = applier
            .apply_raw(
                f.target.id,
                raw(json!([{"type": "task", "uuid": x.id.to_string(), "notes": "noted"}])),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Reconcile(_)));
        assert_eq!(f.store.task(x.id).unwrap().unwrap().notes, "noted");
    }

    #[tokio::test]
    async fn reapplying_a_batch_is_idempotent() {
        let f = fixture();
        let applier = AnnotationApplier::new(f.store.clone());
        let batch = json!([
            {"type": "task", "uuid": f.tasks[0].id.to_string(), "disposition": "ignored", "notes": "known issue"},
            {"type": "task", "uuid": f.tasks[2].id.to_string(), "clear": "true"},
        ]);

        applier.apply_raw(f.target.id, raw(batch.clone())).await.unwrap();
        let first = f.store.list_tasks(&TaskFilter::default()).await.unwrap();

        let again = applier.apply_raw(f.target.id, raw(batch)).await.unwrap();
        let second = f.store.list_tasks(&TaskFilter::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(again.relevance.marked_irrelevant, 0);
    }

    #[tokio::test]
    async fn clear_resets_only_operator_fields() {
        let f = fixture();
        let x = &f.tasks[1];
        let applier = AnnotationApplier::new(f.store.clone());

        applier
            .apply_raw(
                f.target.id,
                raw(json!([{"type": "task", "uuid": x.id.to_string(), "disposition": "triaged", "notes": "vendor bug"}])),
            )
            .await
            .unwrap();
        applier
            .apply_raw(
                f.target.id,
                raw(json!([{"type": "task", "uuid": x.id.to_string(), "clear": true}])),
            )
            .await
            .unwrap();

        let stored = f.store.task(x.id).unwrap().unwrap();
        assert_eq!(stored.disposition, None);
        assert_eq!(stored.notes, "");
        assert_eq!(stored.status, x.status);
        assert_eq!(stored.started_at, x.started_at);
        assert_eq!(stored.ok, x.ok);
    }

    #[tokio::test]
    async fn purged_archive_disappears_and_task_drops_out() {
        let f = fixture();
        let mut backup = Task::new(TaskId::new(), f.target.id, TaskOp::Backup, "done");
        backup.ok = true;
        backup.started_at = Some(t0());
        let archive = Archive::new(
            ArchiveId::new(),
            f.target.id,
            backup.id,
            "hourly",
            t0(),
            t0() + Duration::days(2),
        )
        .unwrap();
        backup.link_archive(archive.id).unwrap();
        f.store.insert_task(backup.clone()).unwrap();
        f.store.insert_archive(archive.clone()).unwrap();

        let views = ViewBuilder::new(f.store.clone());
        let before = views.build_system_view(f.target.id).await.unwrap();
        let shown = before.tasks.iter().find(|t| t.uuid == backup.id).unwrap();
        assert_eq!(shown.archive.as_ref().map(|a| a.uuid), Some(archive.id));

        f.store
            .set_archive_status(archive.id, ArchiveStatus::Purged)
            .unwrap();
        let hidden = views.build_system_view(f.target.id).await.unwrap();
        let shown = hidden.tasks.iter().find(|t| t.uuid == backup.id).unwrap();
        assert!(shown.archive.is_none());

        // An annotation batch triggers the scoped relevance pass.
        let outcome = AnnotationApplier::new(f.store.clone())
            .apply_raw(
                f.target.id,
                raw(json!([{"type": "archive", "uuid": archive.id.to_string(), "notes": "purged by ops"}])),
            )
            .await
            .unwrap();
        assert_eq!(outcome.relevance.marked_irrelevant, 1);

        let after = views.build_system_view(f.target.id).await.unwrap();
        assert!(after.tasks.iter().all(|t| t.uuid != backup.id));
        assert_eq!(after.tasks.len(), 3);
    }
}
