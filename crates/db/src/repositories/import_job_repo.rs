//! Repository for the `import_jobs` table.

use ledgerlift_core::import_job::JobCounters;
use ledgerlift_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use ledgerlift_core::types::DbId;
use sqlx::PgPool;

use crate::models::import_job::{CreateImportJob, ImportJob};
use crate::models::status::ImportJobStatusId;

/// Column list for import_jobs queries.
const COLUMNS: &str = "id, tenant_id, name, description, source_system, status_id, config, \
    total_records, processed_records, successful_records, failed_records, \
    errors, warnings, summary, metadata, created_by, \
    scheduled_start_at, started_at, completed_at, created_at, updated_at";

/// Provides persistence operations for import jobs.
pub struct ImportJobRepo;

impl ImportJobRepo {
    /// Insert a new job in `pending`, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateImportJob) -> Result<ImportJob, sqlx::Error> {
        let metadata = input
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "INSERT INTO import_jobs
                (tenant_id, name, description, source_system, status_id, config,
                 metadata, created_by, scheduled_start_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(input.tenant_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.source_system)
            .bind(ImportJobStatusId::Pending.id())
            .bind(&input.config)
            .bind(&metadata)
            .bind(input.created_by)
            .bind(input.scheduled_start_at)
            .fetch_one(pool)
            .await
    }

    /// Find a job by ID within a tenant.
    pub async fn find_by_id(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_jobs WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's jobs, newest first.
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJob>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(offset);
        let query = format!(
            "SELECT {COLUMNS} FROM import_jobs
             WHERE tenant_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Pending jobs whose scheduled start is unset or has passed, oldest
    /// first, across all tenants.
    pub async fn list_due_pending(pool: &PgPool, limit: i64) -> Result<Vec<ImportJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_jobs
             WHERE status_id = $1
               AND (scheduled_start_at IS NULL OR scheduled_start_at <= NOW())
             ORDER BY created_at ASC, id ASC
             LIMIT $2"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(ImportJobStatusId::Pending.id())
            .bind(limit.max(1))
            .fetch_all(pool)
            .await
    }

    /// Move a `pending` job to `running` and stamp `started_at`.
    ///
    /// Returns `None` when the job is not pending, so two executors cannot
    /// both start it.
    pub async fn mark_running(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET status_id = $3, started_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND status_id = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(ImportJobStatusId::Running.id())
            .bind(ImportJobStatusId::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the counters of a job. Values are absolute, so replaying a
    /// checkpoint is harmless.
    pub async fn update_counters(
        pool: &PgPool,
        id: DbId,
        counters: &JobCounters,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET
                total_records = $2,
                processed_records = $3,
                successful_records = $4,
                failed_records = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(counters.total_records)
            .bind(counters.processed_records)
            .bind(counters.successful_records)
            .bind(counters.failed_records)
            .fetch_optional(pool)
            .await
    }

    /// Move a `running` job to a terminal status with its final counters,
    /// logs, and summary.
    #[allow(clippy::too_many_arguments)]
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        status: ImportJobStatusId,
        counters: &JobCounters,
        errors: &serde_json::Value,
        warnings: &serde_json::Value,
        summary: Option<&serde_json::Value>,
    ) -> Result<Option<ImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE import_jobs SET
                status_id = $2,
                total_records = $3,
                processed_records = $4,
                successful_records = $5,
                failed_records = $6,
                errors = $7,
                warnings = $8,
                summary = COALESCE($9, summary),
                completed_at = NOW()
             WHERE id = $1 AND status_id = $10
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportJob>(&query)
            .bind(id)
            .bind(status.id())
            .bind(counters.total_records)
            .bind(counters.processed_records)
            .bind(counters.successful_records)
            .bind(counters.failed_records)
            .bind(errors)
            .bind(warnings)
            .bind(summary)
            .bind(ImportJobStatusId::Running.id())
            .fetch_optional(pool)
            .await
    }
}
