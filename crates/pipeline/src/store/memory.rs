//! In-process [`ImportStore`] for dry runs and tests.
//!
//! Mirrors the PostgreSQL store's guarantees: tenant scoping, the
//! `pending -> running -> terminal` compare-and-set, the counters check
//! constraint, and the append-only, idempotent ledger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use ledgerlift_core::duplicate_detection::{ExistingRecord, RecordKey};
use ledgerlift_core::entity::TargetEntity;
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::import_job::{JobCounters, JobStatus, RecordStatus};
use ledgerlift_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use ledgerlift_core::types::DbId;
use ledgerlift_db::models::import_job::{CreateImportJob, ImportJob};
use ledgerlift_db::models::import_record::{CreateImportRecord, ImportRecord, StatusCount};
use ledgerlift_db::models::status::{ImportJobStatusId, ImportRecordStatusId};

use super::canonical;
use super::{CanonicalWrite, ImportStore, JobCompletion};
use crate::error::StoreError;

type WriteFailure = Arc<dyn Fn(&RawRecord) -> bool + Send + Sync>;

/// A canonical entity held by the memory store.
#[derive(Debug, Clone)]
pub struct StoredEntity {
    pub id: DbId,
    pub tenant_id: DbId,
    pub entity: TargetEntity,
    pub data: RawRecord,
    pub source_job_id: Option<DbId>,
}

#[derive(Default)]
struct State {
    next_id: DbId,
    jobs: Vec<ImportJob>,
    ledger: Vec<ImportRecord>,
    entities: Vec<StoredEntity>,
    counter_history: Vec<(DbId, JobCounters)>,
    canonical_writes: usize,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default, Clone)]
pub struct MemoryImportStore {
    state: Arc<Mutex<State>>,
    fail_writes: Option<WriteFailure>,
}

impl MemoryImportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject canonical writes for records matching `predicate`.
    pub fn failing_writes_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RawRecord) -> bool + Send + Sync + 'static,
    {
        self.fail_writes = Some(Arc::new(predicate));
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an existing canonical entity for a tenant.
    pub fn seed_entity(&self, tenant_id: DbId, entity: TargetEntity, data: RawRecord) -> DbId {
        let mut state = self.lock();
        let id = state.next_id();
        state.entities.push(StoredEntity {
            id,
            tenant_id,
            entity,
            data,
            source_job_id: None,
        });
        id
    }

    pub fn entities(&self, tenant_id: DbId) -> Vec<StoredEntity> {
        self.lock()
            .entities
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Number of successful canonical inserts and updates.
    pub fn canonical_writes(&self) -> usize {
        self.lock().canonical_writes
    }

    /// Every counter checkpoint saved for a job, in order.
    pub fn counter_history(&self, job_id: DbId) -> Vec<JobCounters> {
        self.lock()
            .counter_history
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, c)| *c)
            .collect()
    }
}

fn check_counters(counters: &JobCounters) -> Result<(), StoreError> {
    if counters.is_consistent() {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("inconsistent job counters: {counters:?}")))
    }
}

#[async_trait]
impl ImportStore for MemoryImportStore {
    async fn create_job(&self, input: &CreateImportJob) -> Result<ImportJob, StoreError> {
        let mut state = self.lock();
        let now = Utc::now();
        let job = ImportJob {
            id: state.next_id(),
            tenant_id: input.tenant_id,
            name: input.name.clone(),
            description: input.description.clone(),
            source_system: input.source_system.clone(),
            status_id: ImportJobStatusId::Pending.id(),
            config: input.config.clone(),
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            failed_records: 0,
            errors: serde_json::json!([]),
            warnings: serde_json::json!([]),
            summary: None,
            metadata: input.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
            created_by: input.created_by,
            scheduled_start_at: input.scheduled_start_at,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn get_job(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.id == job_id && j.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_jobs(
        &self,
        tenant_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJob>, StoreError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT) as usize;
        let offset = clamp_offset(offset) as usize;
        let state = self.lock();
        let mut jobs: Vec<ImportJob> = state
            .jobs
            .iter()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_due_jobs(&self, limit: i64) -> Result<Vec<ImportJob>, StoreError> {
        let now = Utc::now();
        let state = self.lock();
        let mut jobs: Vec<ImportJob> = state
            .jobs
            .iter()
            .filter(|j| j.status_id == ImportJobStatusId::Pending.id())
            .filter(|j| j.scheduled_start_at.map_or(true, |at| at <= now))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(jobs.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn mark_running(&self, tenant_id: DbId, job_id: DbId) -> Result<Option<ImportJob>, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == job_id
                && j.tenant_id == tenant_id
                && j.status_id == ImportJobStatusId::Pending.id()
        }) else {
            return Ok(None);
        };
        job.status_id = ImportJobStatusId::Running.id();
        job.started_at = Some(Utc::now());
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn save_counters(&self, job_id: DbId, counters: &JobCounters) -> Result<(), StoreError> {
        check_counters(counters)?;
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or(StoreError::NotFound { entity: "ImportJob", id: job_id })?;
        job.total_records = counters.total_records;
        job.processed_records = counters.processed_records;
        job.successful_records = counters.successful_records;
        job.failed_records = counters.failed_records;
        job.updated_at = Utc::now();
        state.counter_history.push((job_id, *counters));
        Ok(())
    }

    async fn finish_job(
        &self,
        job_id: DbId,
        completion: JobCompletion<'_>,
    ) -> Result<Option<ImportJob>, StoreError> {
        check_counters(completion.counters)?;
        let errors = serde_json::to_value(completion.errors)?;
        let warnings = serde_json::to_value(completion.warnings)?;
        let summary = completion.summary.map(serde_json::to_value).transpose()?;

        let mut state = self.lock();
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status() == Some(JobStatus::Running))
        else {
            return Ok(None);
        };
        if !JobStatus::Running.can_transition_to(completion.status) {
            return Err(StoreError::Rejected(format!(
                "cannot finish job as {}",
                completion.status.as_str()
            )));
        }
        let counters = *completion.counters;
        job.status_id = ImportJobStatusId::from(completion.status).id();
        job.total_records = counters.total_records;
        job.processed_records = counters.processed_records;
        job.successful_records = counters.successful_records;
        job.failed_records = counters.failed_records;
        job.errors = errors;
        job.warnings = warnings;
        if summary.is_some() {
            job.summary = summary;
        }
        job.completed_at = Some(Utc::now());
        job.updated_at = Utc::now();
        let job = job.clone();
        state.counter_history.push((job_id, counters));
        Ok(Some(job))
    }

    async fn existing_records(&self, tenant_id: DbId) -> Result<Vec<ExistingRecord>, StoreError> {
        Ok(self
            .lock()
            .entities
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .map(|e| ExistingRecord {
                id: e.id,
                entity: e.entity,
                key: RecordKey::from_record(&e.data, e.entity),
            })
            .collect())
    }

    async fn write_record(&self, write: CanonicalWrite<'_>) -> Result<DbId, StoreError> {
        // Same shape checks as the PostgreSQL store.
        match write.entity {
            TargetEntity::Client => canonical::to_create_client(write.data, write.job_id).map(drop)?,
            TargetEntity::Business => canonical::to_create_business(write.data, write.job_id).map(drop)?,
            TargetEntity::Transaction => {
                canonical::to_create_transaction(write.data, write.job_id).map(drop)?
            }
        }
        if let Some(fail) = &self.fail_writes {
            if fail(write.data) {
                return Err(StoreError::Rejected("simulated write failure".into()));
            }
        }

        let mut state = self.lock();
        let id = match write.update_id {
            Some(id) => {
                let existing = state
                    .entities
                    .iter_mut()
                    .find(|e| e.id == id && e.tenant_id == write.tenant_id && e.entity == write.entity)
                    .ok_or(StoreError::NotFound { entity: write.entity.as_str(), id })?;
                for (field, value) in write.data {
                    if !value.is_empty() {
                        existing.data.insert(field.clone(), value.clone());
                    }
                }
                existing.source_job_id = Some(write.job_id);
                id
            }
            None => {
                let id = state.next_id();
                state.entities.push(StoredEntity {
                    id,
                    tenant_id: write.tenant_id,
                    entity: write.entity,
                    data: write.data.clone(),
                    source_job_id: Some(write.job_id),
                });
                id
            }
        };
        state.canonical_writes += 1;
        Ok(id)
    }

    async fn append_ledger(&self, entries: &[CreateImportRecord]) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let mut present: HashSet<(DbId, String)> = state
            .ledger
            .iter()
            .map(|r| (r.job_id, r.source_row_id.clone()))
            .collect();
        let mut inserted = 0;
        for e in entries {
            if !present.insert((e.job_id, e.source_row_id.clone())) {
                continue;
            }
            if let Some(q) = e.quality_score {
                if !(0.0..=1.0).contains(&q) {
                    return Err(StoreError::Rejected(format!("quality score {q} out of range")));
                }
            }
            let now = Utc::now();
            let record = ImportRecord {
                id: state.next_id(),
                tenant_id: e.tenant_id,
                job_id: e.job_id,
                source_row_id: e.source_row_id.clone(),
                entity_type: e.entity_type.clone(),
                status_id: e.status_id,
                original_data: e.original_data.clone(),
                transformed_data: e.transformed_data.clone(),
                quality_score: e.quality_score,
                validation_errors: e.validation_errors.clone(),
                validation_warnings: e.validation_warnings.clone(),
                is_duplicate: e.is_duplicate,
                duplicate_of: e.duplicate_of.clone(),
                canonical_id: e.canonical_id,
                reason: e.reason.clone(),
                processed_at: now,
                created_at: now,
            };
            state.ledger.push(record);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn list_ledger(
        &self,
        tenant_id: DbId,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportRecord>, StoreError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT) as usize;
        let offset = clamp_offset(offset) as usize;
        Ok(self
            .lock()
            .ledger
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.job_id == job_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ledger_status_counts(
        &self,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<Vec<StatusCount>, StoreError> {
        let state = self.lock();
        Ok([
            RecordStatus::Pending,
            RecordStatus::Processed,
            RecordStatus::Failed,
            RecordStatus::Skipped,
        ]
        .into_iter()
        .map(|status| {
            let id = ImportRecordStatusId::from(status).id();
            StatusCount {
                status: status.as_str().to_string(),
                count: state
                    .ledger
                    .iter()
                    .filter(|r| r.tenant_id == tenant_id && r.job_id == job_id && r.status_id == id)
                    .count() as i64,
            }
        })
        .collect())
    }
}
