//! [`ImportStore`] backed by PostgreSQL through the `ledgerlift-db` repos.

use async_trait::async_trait;
use ledgerlift_core::duplicate_detection::ExistingRecord;
use ledgerlift_core::entity::TargetEntity;
use ledgerlift_core::import_job::JobCounters;
use ledgerlift_core::types::DbId;
use ledgerlift_db::models::import_job::{CreateImportJob, ImportJob};
use ledgerlift_db::models::import_record::{CreateImportRecord, ImportRecord, StatusCount};
use ledgerlift_db::models::status::ImportJobStatusId;
use ledgerlift_db::repositories::{
    BusinessRepo, ClientRepo, ImportJobRepo, ImportRecordRepo, TransactionRepo,
};
use ledgerlift_db::DbPool;

use super::canonical;
use super::{CanonicalWrite, ImportStore, JobCompletion};
use crate::error::StoreError;

#[derive(Clone)]
pub struct PgImportStore {
    pool: DbPool,
}

impl PgImportStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn create_job(&self, input: &CreateImportJob) -> Result<ImportJob, StoreError> {
        Ok(ImportJobRepo::create(&self.pool, input).await?)
    }

    async fn get_job(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError> {
        Ok(ImportJobRepo::find_by_id(&self.pool, tenant_id, job_id).await?)
    }

    async fn list_jobs(
        &self,
        tenant_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJob>, StoreError> {
        Ok(ImportJobRepo::list_by_tenant(&self.pool, tenant_id, limit, offset).await?)
    }

    async fn list_due_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, StoreError> {
        Ok(ImportJobRepo::list_due_pending(&self.pool, limit).await?)
    }

    async fn mark_running(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError> {
        Ok(ImportJobRepo::mark_running(&self.pool, tenant_id, job_id).await?)
    }

    async fn save_counters(&self, job_id: DbId, counters: &JobCounters) -> Result<(), StoreError> {
        ImportJobRepo::update_counters(&self.pool, job_id, counters)
            .await?
            .ok_or(StoreError::NotFound { entity: "ImportJob", id: job_id })?;
        Ok(())
    }

    async fn finish_job(
        &self,
        job_id: DbId,
        completion: JobCompletion<'_>,
    ) -> Result<Option<ImportJob>, StoreError> {
        let errors = serde_json::to_value(completion.errors)?;
        let warnings = serde_json::to_value(completion.warnings)?;
        let summary = completion.summary.map(serde_json::to_value).transpose()?;
        Ok(ImportJobRepo::finish(
            &self.pool,
            job_id,
            ImportJobStatusId::from(completion.status),
            completion.counters,
            &errors,
            &warnings,
            summary.as_ref(),
        )
        .await?)
    }

    async fn existing_records(&self, tenant_id: DbId) -> Result<Vec<ExistingRecord>, StoreError> {
        let clients = ClientRepo::list_by_tenant(&self.pool, tenant_id).await?;
        let businesses = BusinessRepo::list_by_tenant(&self.pool, tenant_id).await?;
        let transactions = TransactionRepo::list_by_tenant(&self.pool, tenant_id).await?;

        let mut out = Vec::with_capacity(clients.len() + businesses.len() + transactions.len());
        out.extend(clients.iter().map(canonical::client_key));
        out.extend(businesses.iter().map(canonical::business_key));
        out.extend(transactions.iter().map(canonical::transaction_key));
        Ok(out)
    }

    async fn write_record(&self, write: CanonicalWrite<'_>) -> Result<DbId, StoreError> {
        let CanonicalWrite { tenant_id, job_id, entity, data, update_id } = write;
        let not_found = |id| StoreError::NotFound { entity: entity.as_str(), id };
        match entity {
            TargetEntity::Client => {
                let input = canonical::to_create_client(data, job_id)?;
                match update_id {
                    Some(id) => ClientRepo::update_from_import(&self.pool, tenant_id, id, &input)
                        .await?
                        .map(|c| c.id)
                        .ok_or_else(|| not_found(id)),
                    None => Ok(ClientRepo::create(&self.pool, tenant_id, &input).await?.id),
                }
            }
            TargetEntity::Business => {
                let input = canonical::to_create_business(data, job_id)?;
                match update_id {
                    Some(id) => BusinessRepo::update_from_import(&self.pool, tenant_id, id, &input)
                        .await?
                        .map(|b| b.id)
                        .ok_or_else(|| not_found(id)),
                    None => Ok(BusinessRepo::create(&self.pool, tenant_id, &input).await?.id),
                }
            }
            TargetEntity::Transaction => {
                let input = canonical::to_create_transaction(data, job_id)?;
                match update_id {
                    Some(id) => TransactionRepo::update_from_import(&self.pool, tenant_id, id, &input)
                        .await?
                        .map(|t| t.id)
                        .ok_or_else(|| not_found(id)),
                    None => Ok(TransactionRepo::create(&self.pool, tenant_id, &input).await?.id),
                }
            }
        }
    }

    async fn append_ledger(&self, entries: &[CreateImportRecord]) -> Result<u64, StoreError> {
        Ok(ImportRecordRepo::append_batch(&self.pool, entries).await?)
    }

    async fn list_ledger(
        &self,
        tenant_id: DbId,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportRecord>, StoreError> {
        Ok(ImportRecordRepo::list_by_job(&self.pool, tenant_id, job_id, limit, offset).await?)
    }

    async fn ledger_status_counts(
        &self,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<Vec<StatusCount>, StoreError> {
        Ok(ImportRecordRepo::status_counts(&self.pool, tenant_id, job_id).await?)
    }
}
