//! The five ordered phases of a job run.
//!
//! Each phase checks the cancellation token between batches and persists
//! absolute counters after every batch it completes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ledgerlift_core::duplicate_detection::{DuplicateDetector, WeightedKeySimilarity};
use ledgerlift_core::import_job::RecordStatus;
use ledgerlift_core::processing::Disposition;
use ledgerlift_core::progress::Phase;
use ledgerlift_core::quality::meets_threshold;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::connectors::Connector;
use crate::error::{PipelineError, StoreError};
use crate::pool::{process_batch, RunContext};
use crate::progress::ProgressReporter;
use crate::run::{JobRun, RecordOutcome};
use crate::store::{CanonicalWrite, ImportStore};

pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Time budget of one phase.
///
/// Checked between batches and between canonical writes, so a phase never
/// abandons a row mid-flight. Only work that holds no row state (source
/// extraction, a batch still owned by `JobRun::unprocessed`) is cut off
/// when the deadline passes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    phase: Phase,
    limit: Duration,
    at: Instant,
}

impl Deadline {
    pub fn start(phase: Phase, limit: Duration) -> Self {
        Self {
            phase,
            limit,
            at: Instant::now() + limit,
        }
    }

    pub fn expired(&self) -> PipelineError {
        PipelineError::Timeout {
            phase: self.phase,
            secs: self.limit.as_secs(),
        }
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if Instant::now() >= self.at {
            Err(self.expired())
        } else {
            Ok(())
        }
    }

    /// Run `fut`, giving up once the deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| self.expired())?
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

pub(crate) async fn extract(
    store: &dyn ImportStore,
    run: &mut JobRun,
    connector: &Connector,
    deadline: Deadline,
    progress: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    progress.report(Phase::Extraction, 0, 1, format!("Extracting from {}", connector.name()));

    let rows = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
        rows = deadline.run(connector.extract(&run.config.source)) => rows?,
    };
    if rows.is_empty() {
        return Err(PipelineError::EmptySource);
    }

    run.counters.total_records = rows.len() as i64;
    run.unprocessed = rows
        .into_iter()
        .enumerate()
        .map(|(i, raw)| ((i + 1).to_string(), raw))
        .collect();
    store.save_counters(run.job_id, &run.counters).await?;

    tracing::info!(rows = run.unprocessed.len(), "Extraction complete");
    progress.report(
        Phase::Extraction,
        1,
        1,
        format!("Extracted {} records", run.unprocessed.len()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Transformation + validation + scoring
// ---------------------------------------------------------------------------

pub(crate) async fn transform(
    store: &dyn ImportStore,
    run: &mut JobRun,
    ctx: &Arc<RunContext>,
    workers: usize,
    deadline: Deadline,
    progress: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let total = run.unprocessed.len();
    let batch_size = run.batch_size();
    run.records.reserve(total);
    run.outcomes.reserve(total);

    while !run.unprocessed.is_empty() {
        ensure_active(cancel)?;
        deadline.check()?;
        let take = batch_size.min(run.unprocessed.len());
        // Rows leave `unprocessed` only once their results are in hand, so
        // an abort mid-batch still ledgers them.
        let rows = run.unprocessed[..take].to_vec();
        let processed = deadline.run(process_batch(ctx, rows, workers)).await?;
        run.unprocessed.drain(..take);

        for record in processed {
            for warning in &record.validation.warnings {
                run.warnings
                    .push(format!("row {}: {}", record.row_id, warning.message));
            }
            let outcome = match run.disposition(&record) {
                d @ Disposition::Filtered => {
                    run.summary.filtered += 1;
                    Some(RecordOutcome::skipped(
                        record.reason(d, run.config.quality_threshold),
                    ))
                }
                d @ Disposition::Invalid => {
                    let reason = record
                        .reason(d, run.config.quality_threshold)
                        .unwrap_or_default();
                    run.counters.failed_records += 1;
                    run.errors.push(format!("row {}: {reason}", record.row_id));
                    Some(RecordOutcome::failed(reason))
                }
                _ => None,
            };
            run.counters.processed_records += 1;
            run.records.push(record);
            run.outcomes.push(outcome);
        }

        store.save_counters(run.job_id, &run.counters).await?;
        let done = run.records.len();
        progress.report(
            Phase::Transformation,
            done,
            total,
            format!("Processed {done} of {total} records"),
        );
    }

    tracing::info!(
        processed = run.counters.processed_records,
        invalid = run.counters.failed_records,
        filtered = run.summary.filtered,
        "Transformation complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Duplicate detection
// ---------------------------------------------------------------------------

pub(crate) async fn detect_duplicates(
    store: &dyn ImportStore,
    run: &mut JobRun,
    deadline: Deadline,
    progress: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    ensure_active(cancel)?;
    let tenant_id = run.tenant_id;
    let existing = deadline
        .run(async move { store.existing_records(tenant_id).await.map_err(PipelineError::from) })
        .await?;
    let mut detector = DuplicateDetector::new(
        Box::new(WeightedKeySimilarity::default()),
        run.config.similarity_threshold,
    );
    detector.seed(existing);
    tracing::debug!(
        candidates = detector.len(),
        strategy = detector.strategy_name(),
        "Duplicate index seeded"
    );

    let total = run.records.len();
    let batch_size = run.batch_size();
    let threshold = run.config.quality_threshold;
    let mut start = 0;
    while start < total {
        ensure_active(cancel)?;
        deadline.check()?;
        let end = (start + batch_size).min(total);
        for idx in start..end {
            let settled = run.outcomes[idx].is_some();
            let record = &mut run.records[idx];
            let (Some(entity), Some(key)) = (record.entity, record.duplicate_key()) else {
                continue;
            };
            // Only rows that may be imported become candidates for later rows.
            let candidate = !settled && meets_threshold(record.validation.quality_score, threshold);
            record.duplicate = if candidate {
                detector.check_and_insert(&record.row_id, entity, key)
            } else {
                detector.check(entity, &key)
            };
            if record.duplicate.is_duplicate {
                run.summary.duplicates_found += 1;
            }
        }
        progress.report(
            Phase::DuplicateDetection,
            end,
            total,
            format!("Checked {end} of {total} records for duplicates"),
        );
        start = end;
        tokio::task::yield_now().await;
    }

    tracing::info!(duplicates = run.summary.duplicates_found, "Duplicate detection complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

pub(crate) async fn import(
    store: &dyn ImportStore,
    run: &mut JobRun,
    deadline: Deadline,
    progress: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let threshold = run.config.quality_threshold;
    let mut writes = Vec::new();
    for idx in 0..run.records.len() {
        if run.outcomes[idx].is_some() {
            continue;
        }
        let record = &run.records[idx];
        let disposition = run.disposition(record);
        if disposition.is_write() {
            writes.push((idx, disposition));
            continue;
        }
        let reason = record.reason(disposition, threshold);
        match disposition {
            Disposition::LowQuality => run.summary.quality_rejections += 1,
            Disposition::DuplicateSkipped => run.summary.duplicates_skipped += 1,
            Disposition::AwaitingReview => run.summary.awaiting_review += 1,
            _ => {}
        }
        if let Some(reason) = &reason {
            if disposition != Disposition::AwaitingReview {
                run.warnings.push(format!("row {}: {reason}", record.row_id));
            }
        }
        let status = disposition
            .ledger_status()
            .unwrap_or(RecordStatus::Skipped);
        run.outcomes[idx] = Some(RecordOutcome::with_status(status, reason));
    }

    let total = writes.len();
    if total == 0 {
        progress.report(Phase::Import, 0, 0, "No records eligible for import");
        return Ok(());
    }

    let mut done = 0;
    for chunk in writes.chunks(run.batch_size()) {
        ensure_active(cancel)?;
        for &(idx, disposition) in chunk {
            // Never cut a write short: a committed row must keep its outcome.
            deadline.check()?;
            let record = &run.records[idx];
            let Some(entity) = record.entity else {
                continue;
            };
            let update_id = match disposition {
                Disposition::Update(id) => Some(id),
                _ => None,
            };
            let write = CanonicalWrite {
                tenant_id: run.tenant_id,
                job_id: run.job_id,
                entity,
                data: &record.transformed,
                update_id,
            };
            match store.write_record(write).await {
                Ok(id) => {
                    run.counters.successful_records += 1;
                    if update_id.is_some() {
                        run.summary.updated += 1;
                    } else {
                        run.summary.created += 1;
                    }
                    run.outcomes[idx] = Some(RecordOutcome::imported(id));
                }
                Err(e) => {
                    tracing::warn!(row_id = %record.row_id, entity = %entity, error = %e, "Canonical write failed");
                    run.counters.failed_records += 1;
                    run.errors
                        .push(format!("row {}: write failed: {e}", record.row_id));
                    run.outcomes[idx] = Some(RecordOutcome::failed(e.to_string()));
                }
            }
        }
        done += chunk.len();
        store.save_counters(run.job_id, &run.counters).await?;
        progress.report(
            Phase::Import,
            done,
            total,
            format!("Imported {done} of {total} records"),
        );
    }

    tracing::info!(
        created = run.summary.created,
        updated = run.summary.updated,
        failed = run.counters.failed_records,
        "Import complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Append one ledger entry per extracted row. Safe to repeat: entries
/// already written for a row are kept.
pub(crate) async fn write_ledger(
    store: &dyn ImportStore,
    run: &JobRun,
    abort_reason: Option<&str>,
    deadline: Option<Deadline>,
    mut progress: Option<&mut ProgressReporter>,
) -> Result<u64, PipelineError> {
    let entries = run
        .ledger_entries(abort_reason)
        .map_err(StoreError::from)?;
    let total = entries.len();
    let mut written = 0;
    let mut done = 0;
    for chunk in entries.chunks(run.batch_size()) {
        if let Some(deadline) = &deadline {
            deadline.check()?;
        }
        written += store.append_ledger(chunk).await?;
        done += chunk.len();
        if let Some(p) = progress.as_deref_mut() {
            p.report(
                Phase::Ledger,
                done,
                total,
                format!("Recorded {done} of {total} ledger entries"),
            );
        }
    }
    Ok(written)
}
