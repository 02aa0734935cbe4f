//! Mutable state of one job execution.
//!
//! A [`JobRun`] is the single writer for a job's counters: phases mutate it
//! and persist absolute snapshots, so replaying a checkpoint never
//! double-counts.

use std::time::Instant;

use ledgerlift_core::field_value::{record_to_json, RawRecord};
use ledgerlift_core::import_job::{ImportJobConfig, JobCounters, JobResult, JobSummary, RecordStatus};
use ledgerlift_core::processing::{Disposition, ProcessedRecord};
use ledgerlift_core::types::DbId;
use ledgerlift_db::models::import_record::CreateImportRecord;
use ledgerlift_db::models::status::ImportRecordStatusId;

use crate::error::PipelineError;

/// Capped list of operator-facing messages.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<String>,
    cap: usize,
    dropped: usize,
}

impl MessageLog {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
            dropped: 0,
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        if self.entries.len() < self.cap {
            self.entries.push(message.into());
        } else {
            self.dropped += 1;
        }
    }

    /// Fatal errors always land, even past the cap.
    pub fn push_always(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut out = self.entries.clone();
        if self.dropped > 0 {
            out.push(format!("{} more messages omitted", self.dropped));
        }
        out
    }
}

/// Final fate of one source row.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub status: RecordStatus,
    pub canonical_id: Option<DbId>,
    pub reason: Option<String>,
}

impl RecordOutcome {
    pub fn skipped(reason: Option<String>) -> Self {
        Self::with_status(RecordStatus::Skipped, reason)
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::with_status(RecordStatus::Failed, Some(reason.into()))
    }

    pub fn imported(canonical_id: DbId) -> Self {
        Self {
            status: RecordStatus::Processed,
            canonical_id: Some(canonical_id),
            reason: None,
        }
    }

    pub fn with_status(status: RecordStatus, reason: Option<String>) -> Self {
        Self {
            status,
            canonical_id: None,
            reason,
        }
    }
}

pub struct JobRun {
    pub tenant_id: DbId,
    pub job_id: DbId,
    pub config: ImportJobConfig,
    pub counters: JobCounters,
    pub summary: JobSummary,
    pub errors: MessageLog,
    pub warnings: MessageLog,
    /// Extracted rows not yet transformed, with their row ids.
    pub unprocessed: Vec<(String, RawRecord)>,
    /// Transformed rows in source order.
    pub records: Vec<ProcessedRecord>,
    /// Parallel to `records`; `None` until the row's fate is known.
    pub outcomes: Vec<Option<RecordOutcome>>,
    started: Instant,
}

impl JobRun {
    pub fn new(tenant_id: DbId, job_id: DbId, config: ImportJobConfig, max_messages: usize) -> Self {
        Self {
            tenant_id,
            job_id,
            config,
            counters: JobCounters::default(),
            summary: JobSummary::default(),
            errors: MessageLog::new(max_messages),
            warnings: MessageLog::new(max_messages),
            unprocessed: Vec::new(),
            records: Vec::new(),
            outcomes: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn batch_size(&self) -> usize {
        (self.config.batch_size as usize).max(1)
    }

    pub fn disposition(&self, record: &ProcessedRecord) -> Disposition {
        record.disposition(&self.config.flags, self.config.quality_threshold)
    }

    /// Settle every row whose fate is still open after a fatal error.
    ///
    /// Transformed rows count as failed; rows never transformed are ledgered
    /// as failed without touching the counters.
    pub fn abort(&mut self, err: &PipelineError) {
        let reason = format!("job aborted before import: {err}");
        for outcome in self.outcomes.iter_mut().filter(|o| o.is_none()) {
            *outcome = Some(RecordOutcome::failed(reason.clone()));
            self.counters.failed_records += 1;
        }
    }

    /// Ledger entries for every extracted row, in source order.
    pub fn ledger_entries(&self, abort_reason: Option<&str>) -> Result<Vec<CreateImportRecord>, serde_json::Error> {
        let mut entries = Vec::with_capacity(self.records.len() + self.unprocessed.len());
        for (record, outcome) in self.records.iter().zip(&self.outcomes) {
            let outcome = outcome
                .clone()
                .unwrap_or_else(|| RecordOutcome::failed("record was not imported"));
            entries.push(CreateImportRecord {
                tenant_id: self.tenant_id,
                job_id: self.job_id,
                source_row_id: record.row_id.clone(),
                entity_type: record.entity.map(|e| e.as_str().to_string()),
                status_id: ImportRecordStatusId::from(outcome.status).id(),
                original_data: record_to_json(&record.original),
                transformed_data: record_to_json(&record.transformed),
                quality_score: record.ledger_quality_score(),
                validation_errors: serde_json::to_value(&record.validation.errors)?,
                validation_warnings: serde_json::to_value(&record.validation.warnings)?,
                is_duplicate: record.duplicate.is_duplicate,
                duplicate_of: record
                    .duplicate
                    .duplicate_of
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
                canonical_id: outcome.canonical_id,
                reason: outcome.reason,
            });
        }
        let reason = abort_reason.unwrap_or("job aborted before transformation");
        for (row_id, raw) in &self.unprocessed {
            entries.push(CreateImportRecord {
                tenant_id: self.tenant_id,
                job_id: self.job_id,
                source_row_id: row_id.clone(),
                entity_type: None,
                status_id: ImportRecordStatusId::Failed.id(),
                original_data: record_to_json(raw),
                transformed_data: serde_json::json!({}),
                quality_score: None,
                validation_errors: serde_json::json!([]),
                validation_warnings: serde_json::json!([]),
                is_duplicate: false,
                duplicate_of: None,
                canonical_id: None,
                reason: Some(reason.to_string()),
            });
        }
        Ok(entries)
    }

    pub fn finalize_summary(&mut self) -> &JobSummary {
        self.summary.total_records = self.counters.total_records;
        self.summary.processed_records = self.counters.processed_records;
        self.summary.successful_records = self.counters.successful_records;
        self.summary.failed_records = self.counters.failed_records;
        self.summary.duration_ms = self.started.elapsed().as_millis() as i64;
        &self.summary
    }

    pub fn result(&self, success: bool) -> JobResult {
        JobResult {
            success,
            total_processed: self.counters.processed_records,
            successful_records: self.counters.successful_records,
            failed_records: self.counters.failed_records,
            warnings: self.warnings.to_vec(),
            errors: self.errors.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_log_caps_and_reports_overflow() {
        let mut log = MessageLog::new(2);
        for i in 0..5 {
            log.push(format!("row {i}"));
        }
        log.push_always("fatal");
        let v = log.to_vec();
        assert_eq!(v, vec!["row 0", "row 1", "fatal", "3 more messages omitted"]);
    }
}
