//! Write side: apply operator annotation batches to a system's records.
//!
//! ```text
//! raw annotations
//!   ↓ resolve system (unknown → NotFound)
//!   ↓ decode (whole batch validated, nothing touched on failure)
//! AnnotationBatch
//!   ↓ apply each annotation in order (first failure stops the batch)
//!   ↓ relevance pass scoped to the system
//! AnnotateOutcome
//! ```
//!
//! Each annotation is one atomic store update. There is no batch-level
//! transaction: a failure on item k leaves items before k applied.

use serde::Serialize;
use tracing::{info, instrument, warn};

use vigil_core::{Annotation, AnnotationBatch, RawAnnotation, TargetId};

use crate::error::{ServiceError, ServiceResult};
use crate::relevance::RelevanceReconciler;
use crate::store::{RelevanceReport, RelevanceScope, StoreError, SystemStore};

/// Result of a fully applied batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnnotateOutcome {
    pub applied: usize,
    pub relevance: RelevanceReport,
}

#[derive(Debug, Clone)]
pub struct AnnotationApplier<S> {
    store: S,
    reconciler: RelevanceReconciler<S>,
}

impl<S> AnnotationApplier<S>
where
    S: SystemStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            reconciler: RelevanceReconciler::new(store.clone()),
            store,
        }
    }

    /// Resolve the system, validate wire annotations, then apply them.
    ///
    /// An unknown system is reported as `NotFound` even when the batch is
    /// also invalid. Both checks run before any write.
    #[instrument(skip(self, raw), fields(target_id = %target_id, batch_len = raw.len()), err)]
    pub async fn apply_raw(
        &self,
        target_id: TargetId,
        raw: Vec<RawAnnotation>,
    ) -> ServiceResult<AnnotateOutcome> {
        self.resolve_target(target_id).await?;
        let batch = AnnotationBatch::try_from(raw)?;
        self.apply_resolved(target_id, &batch).await
    }

    #[instrument(skip(self, batch), fields(target_id = %target_id, batch_len = batch.len()), err)]
    pub async fn apply_annotations(
        &self,
        target_id: TargetId,
        batch: &AnnotationBatch,
    ) -> ServiceResult<AnnotateOutcome> {
        self.resolve_target(target_id).await?;
        self.apply_resolved(target_id, batch).await
    }

    async fn resolve_target(&self, target_id: TargetId) -> ServiceResult<()> {
        self.store
            .get_target(target_id)
            .await
            .map_err(|e| ServiceError::store("get_target", e))?
            .ok_or_else(|| ServiceError::not_found("system", target_id))?;
        Ok(())
    }

    async fn apply_resolved(
        &self,
        target_id: TargetId,
        batch: &AnnotationBatch,
    ) -> ServiceResult<AnnotateOutcome> {
        let mut applied = 0usize;
        for annotation in batch {
            self.apply_one(target_id, annotation)
                .await
                .map_err(|source| {
                    warn!(
                        applied,
                        entity = annotation.kind(),
                        id = %annotation.subject(),
                        error = %source,
                        "annotation batch stopped"
                    );
                    match source {
                        StoreError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
                        source => ServiceError::Annotate {
                            entity: annotation.kind(),
                            id: annotation.subject(),
                            source,
                        },
                    }
                })?;
            applied += 1;
        }

        let relevance = self
            .reconciler
            .recompute(RelevanceScope::Target(target_id))
            .await
            .map_err(ServiceError::Reconcile)?;

        info!(
            applied,
            marked_irrelevant = relevance.marked_irrelevant,
            "annotations applied"
        );
        Ok(AnnotateOutcome { applied, relevance })
    }

    async fn apply_one(&self, target_id: TargetId, annotation: &Annotation) -> Result<(), StoreError> {
        match annotation {
            Annotation::Task(a) => {
                self.store
                    .update_task_annotation(target_id, a.task_id, &a.update)
                    .await
            }
            Annotation::Archive(a) => {
                self.store
                    .update_archive_annotation(target_id, a.archive_id, &a.notes)
                    .await
            }
        }
    }
}
