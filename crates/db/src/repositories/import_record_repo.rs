//! Repository for the append-only `import_records` ledger.

use ledgerlift_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use ledgerlift_core::types::DbId;
use sqlx::PgPool;

use crate::models::import_record::{CreateImportRecord, ImportRecord, StatusCount};

/// Column list for import_records queries.
const COLUMNS: &str = "id, tenant_id, job_id, source_row_id, entity_type, status_id, \
    original_data, transformed_data, quality_score, validation_errors, \
    validation_warnings, is_duplicate, duplicate_of, canonical_id, reason, \
    processed_at, created_at";

/// Provides append and read operations for ledger entries. There is no
/// update or delete; the table rejects both.
pub struct ImportRecordRepo;

impl ImportRecordRepo {
    /// Append a batch of ledger entries in one transaction.
    ///
    /// Entries already present for `(job_id, source_row_id)` are left
    /// untouched, so a retried batch does not duplicate rows. Returns the
    /// number of rows actually inserted.
    pub async fn append_batch(
        pool: &PgPool,
        entries: &[CreateImportRecord],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for e in entries {
            let result = sqlx::query(
                "INSERT INTO import_records
                    (tenant_id, job_id, source_row_id, entity_type, status_id,
                     original_data, transformed_data, quality_score,
                     validation_errors, validation_warnings, is_duplicate,
                     duplicate_of, canonical_id, reason)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                 ON CONFLICT (job_id, source_row_id) DO NOTHING",
            )
            .bind(e.tenant_id)
            .bind(e.job_id)
            .bind(&e.source_row_id)
            .bind(&e.entity_type)
            .bind(e.status_id)
            .bind(&e.original_data)
            .bind(&e.transformed_data)
            .bind(e.quality_score)
            .bind(&e.validation_errors)
            .bind(&e.validation_warnings)
            .bind(e.is_duplicate)
            .bind(&e.duplicate_of)
            .bind(e.canonical_id)
            .bind(&e.reason)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// List a job's ledger entries in insertion order.
    pub async fn list_by_job(
        pool: &PgPool,
        tenant_id: DbId,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportRecord>, sqlx::Error> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);
        let offset = clamp_offset(offset);
        let query = format!(
            "SELECT {COLUMNS} FROM import_records
             WHERE tenant_id = $1 AND job_id = $2
             ORDER BY id ASC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, ImportRecord>(&query)
            .bind(tenant_id)
            .bind(job_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Number of ledger entries for a job.
    pub async fn count_by_job(
        pool: &PgPool,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM import_records WHERE tenant_id = $1 AND job_id = $2",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Ledger entry counts per status name for a job.
    pub async fn status_counts(
        pool: &PgPool,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT s.name AS status, COUNT(r.id) AS count
             FROM import_record_statuses s
             LEFT JOIN import_records r
               ON r.status_id = s.id AND r.tenant_id = $1 AND r.job_id = $2
             GROUP BY s.id, s.name
             ORDER BY s.id",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(pool)
        .await
    }
}
