//! Persistence seam for the pipeline.
//!
//! [`ImportStore`] covers everything the orchestrator persists: jobs, the
//! ledger, and canonical entity writes. [`PgImportStore`] is the production
//! implementation; [`MemoryImportStore`] backs previews and tests.

pub mod canonical;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use ledgerlift_core::duplicate_detection::ExistingRecord;
use ledgerlift_core::entity::TargetEntity;
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::import_job::{JobCounters, JobStatus, JobSummary};
use ledgerlift_core::types::DbId;
use ledgerlift_db::models::import_job::{CreateImportJob, ImportJob};
use ledgerlift_db::models::import_record::{CreateImportRecord, ImportRecord, StatusCount};

use crate::error::StoreError;

pub use memory::MemoryImportStore;
pub use postgres::PgImportStore;

/// Final state written when a job leaves `running`.
#[derive(Debug, Clone)]
pub struct JobCompletion<'a> {
    pub status: JobStatus,
    pub counters: &'a JobCounters,
    pub errors: &'a [String],
    pub warnings: &'a [String],
    pub summary: Option<&'a JobSummary>,
}

/// A canonical write requested by the importer.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalWrite<'a> {
    pub tenant_id: DbId,
    pub job_id: DbId,
    pub entity: TargetEntity,
    pub data: &'a RawRecord,
    /// Existing entity to overwrite; `None` inserts.
    pub update_id: Option<DbId>,
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn create_job(&self, input: &CreateImportJob) -> Result<ImportJob, StoreError>;

    async fn get_job(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError>;

    async fn list_jobs(
        &self,
        tenant_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJob>, StoreError>;

    /// Pending jobs that are due, across tenants, oldest first.
    async fn list_due_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, StoreError>;

    /// Compare-and-set `pending -> running`. `None` when the job is not
    /// pending.
    async fn mark_running(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError>;

    /// Overwrite the job's counters with absolute values.
    async fn save_counters(&self, job_id: DbId, counters: &JobCounters) -> Result<(), StoreError>;

    /// Move a running job to a terminal status.
    async fn finish_job(
        &self,
        job_id: DbId,
        completion: JobCompletion<'_>,
    ) -> Result<Option<ImportJob>, StoreError>;

    /// Duplicate-detection keys of the tenant's canonical entities.
    async fn existing_records(&self, tenant_id: DbId) -> Result<Vec<ExistingRecord>, StoreError>;

    /// Insert or update one canonical entity, returning its id.
    async fn write_record(&self, write: CanonicalWrite<'_>) -> Result<DbId, StoreError>;

    /// Append ledger entries; entries already present for a row are kept.
    async fn append_ledger(&self, entries: &[CreateImportRecord]) -> Result<u64, StoreError>;

    async fn list_ledger(
        &self,
        tenant_id: DbId,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportRecord>, StoreError>;

    async fn ledger_status_counts(
        &self,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<Vec<StatusCount>, StoreError>;
}
