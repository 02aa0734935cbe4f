//! Polls the store for due `pending` jobs and executes them one at a time.

use std::sync::Arc;
use std::time::Duration;

use ledgerlift_core::progress::ProgressUpdate;
use ledgerlift_core::types::DbId;
use ledgerlift_pipeline::{ImportPipeline, PipelineError, ProgressCallback};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Outcome counts for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs another worker started first.
    pub skipped: usize,
}

pub struct JobPoller {
    pipeline: ImportPipeline,
    poll_interval: Duration,
    jobs_per_poll: i64,
}

impl JobPoller {
    pub fn new(pipeline: ImportPipeline, config: &WorkerConfig) -> Self {
        Self {
            pipeline,
            poll_interval: config.poll_interval,
            jobs_per_poll: config.jobs_per_poll.max(1),
        }
    }

    pub fn with_schedule(pipeline: ImportPipeline, poll_interval: Duration, jobs_per_poll: i64) -> Self {
        Self {
            pipeline,
            poll_interval,
            jobs_per_poll: jobs_per_poll.max(1),
        }
    }

    /// Execute every job that is due right now.
    ///
    /// Stops early once `cancel` fires; the job in flight observes the same
    /// token and fails itself.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<PollSummary, PipelineError> {
        let jobs = self.pipeline.store().list_due_jobs(self.jobs_per_poll).await?;
        let mut summary = PollSummary::default();
        if jobs.is_empty() {
            tracing::debug!("No due import jobs");
            return Ok(summary);
        }
        tracing::info!(count = jobs.len(), "Picked up due import jobs");

        for job in jobs {
            if cancel.is_cancelled() {
                break;
            }
            let result = self
                .pipeline
                .execute_import_job(job.tenant_id, job.id, Some(log_progress(job.id)), cancel.clone())
                .await;
            match result {
                Ok(result) if result.success => {
                    summary.executed += 1;
                    summary.succeeded += 1;
                    tracing::info!(
                        job_id = job.id,
                        successful = result.successful_records,
                        failed = result.failed_records,
                        "Import job finished"
                    );
                }
                Ok(result) => {
                    summary.executed += 1;
                    summary.failed += 1;
                    tracing::warn!(
                        job_id = job.id,
                        error = result.errors.last().map(String::as_str).unwrap_or("unknown"),
                        "Import job failed"
                    );
                }
                Err(PipelineError::InvalidState { status, .. }) => {
                    summary.skipped += 1;
                    tracing::debug!(job_id = job.id, %status, "Import job already picked up");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    /// Poll on a fixed interval until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            jobs_per_poll = self.jobs_per_poll,
            "Import worker started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Import worker stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once(&cancel).await {
                        tracing::error!(error = %e, "Import worker poll failed");
                    }
                }
            }
        }
    }
}

fn log_progress(job_id: DbId) -> ProgressCallback {
    Arc::new(move |update: ProgressUpdate| {
        tracing::debug!(
            job_id,
            phase = %update.phase,
            completed = update.completed,
            total = update.total,
            percentage = update.percentage,
            "{}",
            update.message
        );
    })
}
