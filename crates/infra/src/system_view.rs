//! Read side: compose system views from the store.

use tracing::{debug, instrument};

use vigil_core::{SystemView, TargetId, compose_system_view};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{ArchiveFilter, SystemStore, TargetFilter, TaskFilter};

/// Builds [`SystemView`]s for the HTTP layer.
///
/// Only `valid` archives and relevant tasks are shown. A store failure aborts
/// the whole view; partial views are never returned.
#[derive(Debug, Clone)]
pub struct ViewBuilder<S> {
    store: S,
}

impl<S> ViewBuilder<S>
where
    S: SystemStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(target_id = %target_id), err)]
    pub async fn build_system_view(&self, target_id: TargetId) -> ServiceResult<SystemView> {
        let target = self
            .store
            .get_target(target_id)
            .await
            .map_err(|e| ServiceError::store("get_target", e))?
            .ok_or_else(|| ServiceError::not_found("system", target_id))?;

        let archives = self
            .store
            .list_archives(&ArchiveFilter::valid_for(target_id))
            .await
            .map_err(|e| ServiceError::store("list_archives", e))?;

        let tasks = self
            .store
            .list_tasks(&TaskFilter::relevant_for(target_id))
            .await
            .map_err(|e| ServiceError::store("list_tasks", e))?;

        let jobs = self
            .store
            .list_jobs(target_id)
            .await
            .map_err(|e| ServiceError::store("list_jobs", e))?;

        debug!(
            jobs = jobs.len(),
            tasks = tasks.len(),
            archives = archives.len(),
            "composing system view"
        );
        Ok(compose_system_view(&target, &jobs, &tasks, &archives))
    }

    /// Systems matching `filter`, each with its jobs and no task history.
    #[instrument(skip(self), err)]
    pub async fn list_systems(&self, filter: &TargetFilter) -> ServiceResult<Vec<SystemView>> {
        let targets = self
            .store
            .list_targets(filter)
            .await
            .map_err(|e| ServiceError::store("list_targets", e))?;

        let mut out = Vec::with_capacity(targets.len());
        for target in &targets {
            let jobs = self
                .store
                .list_jobs(target.id)
                .await
                .map_err(|e| ServiceError::store("list_jobs", e))?;
            out.push(SystemView::summary(target, &jobs));
        }
        Ok(out)
    }
}
