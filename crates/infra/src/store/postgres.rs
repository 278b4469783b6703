//! Postgres-backed system store.
//!
//! ## Schema
//!
//! `SCHEMA` creates the tables this store reads and writes (`targets`,
//! `stores`, `retention`, `jobs`, `tasks`, `archives`). Rows are owned by the
//! scheduling/execution side of the service; this store only reads them and
//! updates annotation columns and `tasks.relevant`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database (any code) | `Backend` (code + message) |
//! | PoolClosed | `Backend` |
//! | Other (network, decode, ...) | `Backend` |
//!
//! `NotFound` is produced by this module when an update touches no row.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use vigil_core::annotation::TaskAnnotationUpdate;
use vigil_core::{
    Archive, ArchiveId, ArchiveSize, ArchiveStatus, Entity, Job, JobId, Keep, PolicyId,
    RetentionRef, StoreId, StoreRef, Target, TargetId, Task, TaskId, TaskOp,
};

use super::{
    ArchiveFilter, RelevanceReport, RelevanceScope, StoreError, SystemStore, TargetFilter,
    TaskFilter,
};

/// DDL for the tables used by [`PostgresSystemStore`]. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS targets (
    uuid      UUID PRIMARY KEY,
    name      TEXT NOT NULL,
    summary   TEXT NOT NULL DEFAULT '',
    plugin    TEXT NOT NULL,
    endpoint  TEXT NOT NULL DEFAULT '',
    notes     TEXT NOT NULL DEFAULT '',
    healthy   BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS stores (
    uuid     UUID PRIMARY KEY,
    name     TEXT NOT NULL,
    summary  TEXT NOT NULL DEFAULT '',
    plugin   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS retention (
    uuid         UUID PRIMARY KEY,
    name         TEXT NOT NULL,
    summary      TEXT NOT NULL DEFAULT '',
    expiry_days  INTEGER NOT NULL CHECK (expiry_days >= 0)
);

CREATE TABLE IF NOT EXISTS jobs (
    uuid            UUID PRIMARY KEY,
    target_uuid     UUID NOT NULL REFERENCES targets (uuid),
    store_uuid      UUID NOT NULL REFERENCES stores (uuid),
    retention_uuid  UUID NOT NULL REFERENCES retention (uuid),
    schedule        TEXT NOT NULL,
    source          TEXT NOT NULL DEFAULT '',
    destination     TEXT NOT NULL DEFAULT '',
    keep_n          INTEGER NOT NULL DEFAULT 0,
    keep_days       INTEGER NOT NULL DEFAULT 0,
    healthy         BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS tasks (
    uuid          UUID PRIMARY KEY,
    target_uuid   UUID NOT NULL REFERENCES targets (uuid),
    job_uuid      UUID NULL REFERENCES jobs (uuid),
    op            TEXT NOT NULL,
    status        TEXT NOT NULL,
    owner         TEXT NOT NULL DEFAULT '',
    started_at    TIMESTAMPTZ NULL,
    ok            BOOLEAN NOT NULL DEFAULT FALSE,
    disposition   TEXT NULL,
    notes         TEXT NOT NULL DEFAULT '',
    archive_uuid  UUID NULL,
    relevant      BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE INDEX IF NOT EXISTS tasks_target_relevant ON tasks (target_uuid, relevant);

CREATE TABLE IF NOT EXISTS archives (
    uuid         UUID PRIMARY KEY,
    target_uuid  UUID NOT NULL REFERENCES targets (uuid),
    task_uuid    UUID NOT NULL REFERENCES tasks (uuid),
    schedule     TEXT NOT NULL DEFAULT '',
    taken_at     TIMESTAMPTZ NOT NULL,
    expires_at   TIMESTAMPTZ NOT NULL,
    status       TEXT NOT NULL DEFAULT 'valid',
    notes        TEXT NOT NULL DEFAULT '',
    size         BIGINT NULL,
    CHECK (expires_at >= taken_at)
);

CREATE INDEX IF NOT EXISTS archives_target_status ON archives (target_uuid, status);
"#;

/// Name search is a literal, case-insensitive substring match (`%` and `_`
/// in the search term are not wildcards), same as `TargetFilter::matches`.
const LIST_TARGETS_SQL: &str = r#"
SELECT t.uuid, t.name, t.summary, t.plugin, t.endpoint, t.notes, t.healthy
FROM targets t
WHERE ($1::text IS NULL OR
       (CASE WHEN $2::bool THEN t.name = $1
             ELSE strpos(lower(t.name), lower($1)) > 0 END))
  AND ($3::text IS NULL OR t.plugin = $3)
  AND ($4::bool IS NULL OR
       EXISTS (SELECT 1 FROM jobs j WHERE j.target_uuid = t.uuid) = $4)
ORDER BY t.name ASC, t.uuid ASC
"#;

/// Postgres-backed system store.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync`. Every mutation is a
/// single `UPDATE` statement and therefore atomic on its own.
#[derive(Debug, Clone)]
pub struct PostgresSystemStore {
    pool: Arc<PgPool>,
}

impl PostgresSystemStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create missing tables and indexes.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn non_negative(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

fn target_from_row(row: &PgRow) -> Result<Target, sqlx::Error> {
    Ok(Target {
        id: TargetId::from_uuid(row.try_get("uuid")?),
        name: row.try_get("name")?,
        summary: row.try_get("summary")?,
        plugin: row.try_get("plugin")?,
        endpoint: row.try_get("endpoint")?,
        notes: row.try_get("notes")?,
        healthy: row.try_get("healthy")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    Ok(Job {
        id: JobId::from_uuid(row.try_get("uuid")?),
        target_id: TargetId::from_uuid(row.try_get("target_uuid")?),
        schedule: row.try_get("schedule")?,
        from: row.try_get("source")?,
        to: row.try_get("destination")?,
        store: StoreRef {
            id: StoreId::from_uuid(row.try_get("store_uuid")?),
            name: row.try_get("store_name")?,
            summary: row.try_get("store_summary")?,
            plugin: row.try_get("store_plugin")?,
        },
        keep: Keep {
            n: non_negative(row.try_get("keep_n")?),
            days: non_negative(row.try_get("keep_days")?),
        },
        retention: RetentionRef {
            id: PolicyId::from_uuid(row.try_get("retention_uuid")?),
            name: row.try_get("retention_name")?,
            summary: row.try_get("retention_summary")?,
            days: non_negative(row.try_get("retention_days")?),
        },
        healthy: row.try_get("healthy")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_task", e);

    let op: String = row.try_get("op").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let mut task = Task::new(
        TaskId::from_uuid(row.try_get("uuid").map_err(decode)?),
        TargetId::from_uuid(row.try_get("target_uuid").map_err(decode)?),
        TaskOp::from(op),
        status,
    );
    task.job_id = row
        .try_get::<Option<Uuid>, _>("job_uuid")
        .map_err(decode)?
        .map(JobId::from_uuid);
    task.owner = row.try_get("owner").map_err(decode)?;
    task.started_at = row.try_get("started_at").map_err(decode)?;
    task.ok = row.try_get("ok").map_err(decode)?;
    task.disposition = row.try_get("disposition").map_err(decode)?;
    task.notes = row.try_get("notes").map_err(decode)?;
    task.relevant = row.try_get("relevant").map_err(decode)?;

    if let Some(archive) = row.try_get::<Option<Uuid>, _>("archive_uuid").map_err(decode)? {
        task.link_archive(ArchiveId::from_uuid(archive))
            .map_err(|e| StoreError::Backend(format!("inconsistent task row: {e}")))?;
    }
    Ok(task)
}

fn archive_from_row(row: &PgRow) -> Result<Archive, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_archive", e);

    let taken_at: DateTime<Utc> = row.try_get("taken_at").map_err(decode)?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;

    let mut archive = Archive::new(
        ArchiveId::from_uuid(row.try_get("uuid").map_err(decode)?),
        TargetId::from_uuid(row.try_get("target_uuid").map_err(decode)?),
        TaskId::from_uuid(row.try_get("task_uuid").map_err(decode)?),
        row.try_get::<String, _>("schedule").map_err(decode)?,
        taken_at,
        expires_at,
    )
    .map_err(|e| StoreError::Backend(format!("inconsistent archive row: {e}")))?;
    archive.status = ArchiveStatus::from(status);
    archive.notes = row.try_get("notes").map_err(decode)?;
    archive.size = ArchiveSize::from_wire(row.try_get("size").map_err(decode)?);
    Ok(archive)
}

#[async_trait::async_trait]
impl SystemStore for PostgresSystemStore {
    #[instrument(skip(self), fields(target_id = %id), err)]
    async fn get_target(&self, id: TargetId) -> Result<Option<Target>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, name, summary, plugin, endpoint, notes, healthy
            FROM targets
            WHERE uuid = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_target", e))?;

        row.as_ref()
            .map(target_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_target", e))
    }

    #[instrument(skip(self), err)]
    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<Target>, StoreError> {
        let rows = sqlx::query(LIST_TARGETS_SQL)
            .bind(filter.name.as_deref())
            .bind(filter.exact)
            .bind(filter.plugin.as_deref())
            .bind(filter.used)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_targets", e))?;

        rows.iter()
            .map(target_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_targets", e))
    }

    #[instrument(skip(self), fields(target_id = %target_id), err)]
    async fn list_jobs(&self, target_id: TargetId) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                j.uuid, j.target_uuid, j.schedule, j.source, j.destination,
                j.keep_n, j.keep_days, j.healthy,
                s.uuid AS store_uuid, s.name AS store_name,
                s.summary AS store_summary, s.plugin AS store_plugin,
                r.uuid AS retention_uuid, r.name AS retention_name,
                r.summary AS retention_summary, r.expiry_days AS retention_days
            FROM jobs j
            INNER JOIN stores s ON s.uuid = j.store_uuid
            INNER JOIN retention r ON r.uuid = j.retention_uuid
            WHERE j.target_uuid = $1
            ORDER BY j.schedule ASC, j.uuid ASC
            "#,
        )
        .bind(target_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        rows.iter()
            .map(job_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_jobs", e))
    }

    #[instrument(skip(self), err)]
    async fn list_archives(&self, filter: &ArchiveFilter) -> Result<Vec<Archive>, StoreError> {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT uuid, target_uuid, task_uuid, schedule, taken_at, expires_at,
                   status, notes, size
            FROM archives
            WHERE ($1::uuid IS NULL OR target_uuid = $1)
              AND (cardinality($2::text[]) = 0 OR status = ANY($2))
            ORDER BY taken_at DESC, uuid ASC
            "#,
        )
        .bind(filter.target_id.map(Uuid::from))
        .bind(&statuses)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_archives", e))?;

        rows.iter().map(archive_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT uuid, target_uuid, job_uuid, op, status, owner, started_at, ok,
                   disposition, notes, archive_uuid, relevant
            FROM tasks
            WHERE ($1::uuid IS NULL OR target_uuid = $1)
              AND (NOT $2 OR relevant)
            ORDER BY started_at DESC NULLS FIRST, uuid ASC
            "#,
        )
        .bind(filter.target_id.map(Uuid::from))
        .bind(filter.relevant_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tasks", e))?;

        rows.iter().map(task_from_row).collect()
    }

    #[instrument(skip(self, update), fields(target_id = %target_id, task_id = %task_id), err)]
    async fn update_task_annotation(
        &self,
        target_id: TargetId,
        task_id: TaskId,
        update: &TaskAnnotationUpdate,
    ) -> Result<(), StoreError> {
        // Clear first, then set: a supplied value always wins over `clear`.
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET disposition = CASE
                    WHEN $3::text IS NOT NULL THEN $3
                    WHEN $5 THEN NULL
                    ELSE disposition
                END,
                notes = CASE
                    WHEN $4::text IS NOT NULL THEN $4
                    WHEN $5 THEN ''
                    ELSE notes
                END
            WHERE target_uuid = $1 AND uuid = $2
            "#,
        )
        .bind(target_id.as_uuid())
        .bind(task_id.as_uuid())
        .bind(update.disposition.as_deref())
        .bind(update.notes.as_deref())
        .bind(update.clear)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_task_annotation", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Task::KIND, task_id));
        }
        Ok(())
    }

    #[instrument(skip(self, notes), fields(target_id = %target_id, archive_id = %archive_id), err)]
    async fn update_archive_annotation(
        &self,
        target_id: TargetId,
        archive_id: ArchiveId,
        notes: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE archives
            SET notes = $3
            WHERE target_uuid = $1 AND uuid = $2
            "#,
        )
        .bind(target_id.as_uuid())
        .bind(archive_id.as_uuid())
        .bind(notes)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_archive_annotation", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Archive::KIND, archive_id));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(scope = %scope), err)]
    async fn recompute_task_relevance(
        &self,
        scope: RelevanceScope,
    ) -> Result<RelevanceReport, StoreError> {
        // Same rules as `relevance::rules::newly_irrelevant`.
        let result = sqlx::query(
            r#"
            UPDATE tasks AS t
            SET relevant = FALSE
            WHERE t.relevant
              AND ($1::uuid IS NULL OR t.target_uuid = $1)
              AND t.status IN ('done', 'failed', 'canceled')
              AND (
                    (EXISTS (SELECT 1 FROM archives a
                             WHERE a.task_uuid = t.uuid
                               AND a.status IN ('purged', 'manually-purged', 'expired'))
                     AND NOT EXISTS (SELECT 1 FROM archives a
                                     WHERE a.task_uuid = t.uuid AND a.status = 'valid'))
                 OR (NOT t.ok
                     AND t.job_uuid IS NOT NULL
                     AND t.started_at IS NOT NULL
                     AND EXISTS (SELECT 1 FROM tasks s
                                 WHERE s.job_uuid = t.job_uuid
                                   AND s.op = t.op
                                   AND s.ok
                                   AND s.started_at > t.started_at))
              )
            "#,
        )
        .bind(scope.target().map(Uuid::from))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recompute_task_relevance", e))?;

        Ok(RelevanceReport {
            marked_irrelevant: result.rows_affected(),
        })
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::Backend(format!(
                "database error in {operation} [{code}]: {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_backend_error() {
        let err = map_sqlx_error("list_tasks", sqlx::Error::PoolClosed);
        assert_eq!(
            err,
            StoreError::Backend("connection pool closed in list_tasks".to_string())
        );
    }

    #[test]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(non_negative(-3), 0);
        assert_eq!(non_negative(14), 14);
    }

    #[test]
    fn schema_declares_every_table() {
        for table in ["targets", "stores", "retention", "jobs", "tasks", "archives"] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing {table}"
            );
        }
    }

    #[test]
    fn name_search_has_no_pattern_wildcards() {
        assert!(!LIST_TARGETS_SQL.to_ascii_uppercase().contains("LIKE"));
        assert!(LIST_TARGETS_SQL.contains("strpos(lower(t.name), lower($1))"));
    }
}
