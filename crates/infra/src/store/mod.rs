//! Persistence boundary for targets, jobs, tasks and archives.
//!
//! The view and annotation services only ever talk to a [`SystemStore`]; the
//! in-memory implementation backs dev/tests and the Postgres one backs
//! deployments. Each mutating call is a single atomic record update; nothing
//! here spans several records in one transaction.

pub mod filter;
pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use vigil_core::annotation::TaskAnnotationUpdate;
use vigil_core::{Archive, ArchiveId, Job, Target, TargetId, Task, TaskId};

pub use filter::{ArchiveFilter, TargetFilter, TaskFilter};
pub use in_memory::InMemorySystemStore;
pub use postgres::PostgresSystemStore;

/// Store-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Which tasks a relevance pass considers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RelevanceScope {
    All,
    Target(TargetId),
}

impl RelevanceScope {
    pub fn target(&self) -> Option<TargetId> {
        match self {
            RelevanceScope::All => None,
            RelevanceScope::Target(id) => Some(*id),
        }
    }

    pub fn includes(&self, task: &Task) -> bool {
        self.target().is_none_or(|t| task.target_id == t)
    }
}

impl core::fmt::Display for RelevanceScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RelevanceScope::All => f.write_str("all"),
            RelevanceScope::Target(id) => write!(f, "system:{id}"),
        }
    }
}

/// Outcome of a relevance pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RelevanceReport {
    /// Tasks that flipped from relevant to irrelevant in this pass.
    pub marked_irrelevant: u64,
}

/// Store operations consumed by the view and annotation services.
#[async_trait::async_trait]
pub trait SystemStore: Send + Sync {
    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError>;

    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<Target>, StoreError>;

    /// Jobs bound to a target, ordered by schedule.
    async fn list_jobs(&self, target_id: TargetId) -> Result<Vec<Job>, StoreError>;

    async fn list_archives(&self, filter: &ArchiveFilter) -> Result<Vec<Archive>, StoreError>;

    /// Tasks matching the filter, most recently started first (unstarted
    /// tasks lead).
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    /// Apply an operator annotation to one task of `target_id`.
    ///
    /// Returns `NotFound` if the task does not exist or belongs to another
    /// target.
    async fn update_task_annotation(
        &self,
        target_id: TargetId,
        task_id: TaskId,
        update: &TaskAnnotationUpdate,
    ) -> Result<(), StoreError>;

    /// Replace the notes on one archive of `target_id`.
    async fn update_archive_annotation(
        &self,
        target_id: TargetId,
        archive_id: ArchiveId,
        notes: &str,
    ) -> Result<(), StoreError>;

    /// Re-derive task relevance within `scope`. Idempotent.
    async fn recompute_task_relevance(
        &self,
        scope: RelevanceScope,
    ) -> Result<RelevanceReport, StoreError>;
}

#[async_trait::async_trait]
impl<S> SystemStore for Arc<S>
where
    S: SystemStore + ?Sized,
{
    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
        (**self).get_target(id).await
    }

    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<Target>, StoreError> {
        (**self).list_targets(filter).await
    }

    async fn list_jobs(&self, target_id: TargetId) -> Result<Vec<Job>, StoreError> {
        (**self).list_jobs(target_id).await
    }

    async fn list_archives(&self, filter: &ArchiveFilter) -> Result<Vec<Archive>, StoreError> {
        (**self).list_archives(filter).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        (**self).list_tasks(filter).await
    }

    async fn update_task_annotation(
        &self,
        target_id: TargetId,
        task_id: TaskId,
        update: &TaskAnnotationUpdate,
    ) -> Result<(), StoreError> {
        (**self).update_task_annotation(target_id, task_id, update).await
    }

    async fn update_archive_annotation(
        &self,
        target_id: TargetId,
        archive_id: ArchiveId,
        notes: &str,
    ) -> Result<(), StoreError> {
        (**self).update_archive_annotation(target_id, archive_id, notes).await
    }

    async fn recompute_task_relevance(
        &self,
        scope: RelevanceScope,
    ) -> Result<RelevanceReport, StoreError> {
        (**self).recompute_task_relevance(scope).await
    }
}
