//! In-memory system store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vigil_core::annotation::TaskAnnotationUpdate;
use vigil_core::{
    Archive, ArchiveId, ArchiveStatus, Entity, Job, Target, TargetId, Task, TaskId,
};

use super::{
    ArchiveFilter, RelevanceReport, RelevanceScope, StoreError, SystemStore, TargetFilter,
    TaskFilter,
};
use crate::relevance::rules;

type Table<E> = RwLock<HashMap<<E as Entity>::Id, E>>;

/// In-memory system store.
///
/// Each table sits behind its own `RwLock`; every trait method takes at most
/// one write lock, so single-record updates are atomic. When both the task and
/// archive tables are needed, tasks are locked first.
#[derive(Debug, Default)]
pub struct InMemorySystemStore {
    targets: Table<Target>,
    jobs: Table<Job>,
    tasks: Table<Task>,
    archives: Table<Archive>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
}

fn upsert<E: Entity>(table: &Table<E>, entity: E) -> Result<(), StoreError> {
    write(table)?.insert(*entity.id(), entity);
    Ok(())
}

impl InMemorySystemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert_target(&self, target: Target) -> Result<(), StoreError> {
        upsert(&self.targets, target)
    }

    pub fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        upsert(&self.jobs, job)
    }

    pub fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        upsert(&self.tasks, task)
    }

    pub fn insert_archive(&self, archive: Archive) -> Result<(), StoreError> {
        upsert(&self.archives, archive)
    }

    pub fn task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(read(&self.tasks)?.get(&id).cloned())
    }

    pub fn archive(&self, id: ArchiveId) -> Result<Option<Archive>, StoreError> {
        Ok(read(&self.archives)?.get(&id).cloned())
    }

    /// Move an archive to a new lifecycle status (e.g. after a purge).
    pub fn set_archive_status(&self, id: ArchiveId, status: ArchiveStatus) -> Result<(), StoreError> {
        let mut archives = write(&self.archives)?;
        let archive = archives
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(Archive::KIND, id))?;
        archive.status = status;
        Ok(())
    }

    /// Ids of all relevant tasks, sorted. Handy for comparing relevance sets.
    pub fn relevant_task_ids(&self) -> Result<Vec<TaskId>, StoreError> {
        let mut ids: Vec<TaskId> = read(&self.tasks)?
            .values()
            .filter(|t| t.relevant)
            .map(|t| t.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl SystemStore for InMemorySystemStore {
    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
        Ok(read(&self.targets)?.get(&id).cloned())
    }

    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<Target>, StoreError> {
        let targets = read(&self.targets)?;
        let jobs = read(&self.jobs)?;

        let mut out: Vec<Target> = targets
            .values()
            .filter(|t| {
                let has_jobs = jobs.values().any(|j| j.target_id == t.id);
                filter.matches(t, has_jobs)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn list_jobs(&self, target_id: TargetId) -> Result<Vec<Job>, StoreError> {
        let mut out: Vec<Job> = read(&self.jobs)?
            .values()
            .filter(|j| j.target_id == target_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.schedule.cmp(&b.schedule).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn list_archives(&self, filter: &ArchiveFilter) -> Result<Vec<Archive>, StoreError> {
        let mut out: Vec<Archive> = read(&self.archives)?
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.taken_at().cmp(&a.taken_at()).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut out: Vec<Task> = read(&self.tasks)?
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        out.sort_by_key(|t| (t.started_at.is_some(), std::cmp::Reverse(t.started_at), t.id));
        Ok(out)
    }

    async fn update_task_annotation(
        &self,
        target_id: TargetId,
        task_id: TaskId,
        update: &TaskAnnotationUpdate,
    ) -> Result<(), StoreError> {
        let mut tasks = write(&self.tasks)?;
        match tasks.get_mut(&task_id) {
            Some(task) if task.target_id == target_id => {
                update.apply(task);
                Ok(())
            }
            _ => Err(StoreError::not_found(Task::KIND, task_id)),
        }
    }

    async fn update_archive_annotation(
        &self,
        target_id: TargetId,
        archive_id: ArchiveId,
        notes: &str,
    ) -> Result<(), StoreError> {
        let mut archives = write(&self.archives)?;
        match archives.get_mut(&archive_id) {
            Some(archive) if archive.target_id == target_id => {
                archive.notes = notes.to_string();
                Ok(())
            }
            _ => Err(StoreError::not_found(Archive::KIND, archive_id)),
        }
    }

    async fn recompute_task_relevance(
        &self,
        scope: RelevanceScope,
    ) -> Result<RelevanceReport, StoreError> {
        let mut tasks = write(&self.tasks)?;
        let archives = read(&self.archives)?;

        let stale = rules::newly_irrelevant(
            tasks.values().filter(|t| scope.includes(t)),
            archives
                .values()
                .filter(|a| scope.target().is_none_or(|t| a.target_id == t)),
        );

        for id in &stale {
            if let Some(task) = tasks.get_mut(id) {
                task.relevant = false;
            }
        }

        Ok(RelevanceReport {
            marked_irrelevant: stale.len() as u64,
        })
    }
}
