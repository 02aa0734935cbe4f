//! Job orchestration: creation, the execution state machine, and the read
//! surfaces used by operators.

use std::sync::Arc;

use ledgerlift_core::analysis::{analyze_data_structure, AnalysisReport};
use ledgerlift_core::import_job::{
    build_job_config, CreateImportJobRequest, ImportJobConfig, JobCounters, JobResult, JobStatus,
};
use ledgerlift_core::mapping::{mapping_templates, MappingSet};
use ledgerlift_core::progress::Phase;
use ledgerlift_core::source_system::SourceSystemType;
use ledgerlift_core::types::DbId;
use ledgerlift_core::validation::hooks::CustomRuleRegistry;
use ledgerlift_db::models::import_job::{CreateImportJob, ImportJob};
use ledgerlift_db::models::import_record::{ImportRecord, StatusCount};
use ledgerlift_events::bus::{
    IMPORT_JOB_COMPLETED, IMPORT_JOB_CREATED, IMPORT_JOB_FAILED, IMPORT_JOB_STARTED,
};
use ledgerlift_events::{EventBus, ImportEvent};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::connectors::Connector;
use crate::error::{PipelineError, StoreError};
use crate::phases::{self, Deadline};
use crate::pool::RunContext;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::run::JobRun;
use crate::store::{ImportStore, JobCompletion};

/// Entry point for creating, executing and inspecting import jobs.
///
/// Holds no per-job state; independent jobs may execute concurrently on
/// clones of the same pipeline.
#[derive(Clone)]
pub struct ImportPipeline {
    store: Arc<dyn ImportStore>,
    events: Arc<EventBus>,
    config: PipelineConfig,
    hooks: Arc<CustomRuleRegistry>,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn ImportStore>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            events,
            config: PipelineConfig::default(),
            hooks: Arc::new(CustomRuleRegistry::default()),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the custom validation hooks.
    pub fn with_hooks(mut self, hooks: CustomRuleRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn store(&self) -> &Arc<dyn ImportStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Configuration surfaces
    // -----------------------------------------------------------------------

    pub fn get_mapping_templates(&self, system: SourceSystemType) -> MappingSet {
        mapping_templates(system)
    }

    pub fn analyze_data_structure(
        &self,
        buffer: &[u8],
        system: SourceSystemType,
    ) -> Result<AnalysisReport, PipelineError> {
        Ok(analyze_data_structure(buffer, system)?)
    }

    /// Validate the request and persist a `pending` job.
    ///
    /// Nothing is extracted here; configuration problems surface as
    /// [`PipelineError::Configuration`].
    pub async fn create_import_job(
        &self,
        tenant_id: DbId,
        req: &CreateImportJobRequest,
        actor_id: Option<DbId>,
    ) -> Result<ImportJob, PipelineError> {
        let config = build_job_config(req).map_err(PipelineError::configuration)?;
        Connector::for_system(req.source_system, &self.config).validate(req.source_system, &config.source)?;

        let input = CreateImportJob {
            tenant_id,
            name: req.name.trim().to_string(),
            description: req.description.clone(),
            source_system: req.source_system.as_str().to_string(),
            config: serde_json::to_value(&config).map_err(StoreError::from)?,
            metadata: req.metadata.clone(),
            created_by: actor_id,
            scheduled_start_at: req.scheduled_start_at,
        };
        let job = self.store.create_job(&input).await?;

        tracing::info!(
            job_id = job.id,
            tenant_id,
            source_system = %req.source_system,
            "Import job created"
        );
        self.events.publish(
            ImportEvent::new(IMPORT_JOB_CREATED, tenant_id, job.id)
                .with_actor(actor_id)
                .with_payload(serde_json::json!({
                    "name": job.name,
                    "source_system": job.source_system,
                })),
        );
        Ok(job)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run a `pending` job to completion.
    ///
    /// Returns `Err` only when the job cannot be started (unknown, not
    /// pending, store unavailable). Once running, failures are recorded on
    /// the job and reported through an unsuccessful [`JobResult`].
    pub async fn execute_import_job(
        &self,
        tenant_id: DbId,
        job_id: DbId,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<JobResult, PipelineError> {
        let job = self
            .store
            .get_job(tenant_id, job_id)
            .await?
            .ok_or(PipelineError::NotFound { job_id })?;
        match job.status() {
            Some(JobStatus::Pending) => {}
            other => {
                return Err(PipelineError::InvalidState {
                    job_id,
                    status: other.map_or("unknown", |s| s.as_str()).to_string(),
                })
            }
        }
        let job = self
            .store
            .mark_running(tenant_id, job_id)
            .await?
            .ok_or_else(|| PipelineError::InvalidState {
                job_id,
                status: "running".to_string(),
            })?;

        let span = tracing::info_span!("import_job", job_id, tenant_id);
        self.run_job(job, on_progress, cancel).instrument(span).await
    }

    async fn run_job(
        &self,
        job: ImportJob,
        on_progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<JobResult, PipelineError> {
        tracing::info!(source_system = %job.source_system, "Import job started");
        self.events.publish(
            ImportEvent::new(IMPORT_JOB_STARTED, job.tenant_id, job.id).with_actor(job.created_by),
        );

        let (config, connector) = match self.prepare(&job) {
            Ok(prepared) => prepared,
            Err(e) => return self.fail_unstarted(&job, e).await,
        };

        let mut progress = ProgressReporter::new(on_progress);
        let mut run = JobRun::new(job.tenant_id, job.id, config, self.config.max_logged_messages);
        let outcome = match self.run_phases(&mut run, &connector, &mut progress, &cancel).await {
            Ok(()) => self.complete(&mut run).await,
            Err(e) => Err(e),
        };
        let result = match outcome {
            Ok(result) => Ok(result),
            Err(e) => self.fail(&mut run, e).await,
        };
        progress.finish().await;
        result
    }

    fn prepare(&self, job: &ImportJob) -> Result<(ImportJobConfig, Connector), PipelineError> {
        let system = SourceSystemType::from_str(&job.source_system).ok_or_else(|| {
            PipelineError::Configuration(format!("unknown source system '{}'", job.source_system))
        })?;
        let config: ImportJobConfig = serde_json::from_value(job.config.clone())
            .map_err(|e| PipelineError::Configuration(format!("stored job config is invalid: {e}")))?;
        let connector = Connector::for_system(system, &self.config);
        connector.validate(system, &config.source)?;
        Ok((config, connector))
    }

    async fn run_phases(
        &self,
        run: &mut JobRun,
        connector: &Connector,
        progress: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let store = self.store.as_ref();
        let limit = self.config.phase_timeout;

        phases::extract(
            store,
            run,
            connector,
            Deadline::start(Phase::Extraction, self.config.extraction_timeout),
            progress,
            cancel,
        )
        .instrument(tracing::info_span!("phase", phase = %Phase::Extraction))
        .await?;

        let ctx = Arc::new(RunContext {
            rules: run.config.rules.clone(),
            filters: run.config.filters.clone(),
            hooks: Arc::clone(&self.hooks),
            validate_data: run.config.flags.validate_data,
        });
        let workers = self.config.processing_workers;
        phases::transform(
            store,
            run,
            &ctx,
            workers,
            Deadline::start(Phase::Transformation, limit),
            progress,
            cancel,
        )
        .instrument(tracing::info_span!("phase", phase = %Phase::Transformation))
        .await?;

        phases::detect_duplicates(
            store,
            run,
            Deadline::start(Phase::DuplicateDetection, limit),
            progress,
            cancel,
        )
        .instrument(tracing::info_span!("phase", phase = %Phase::DuplicateDetection))
        .await?;

        phases::import(store, run, Deadline::start(Phase::Import, limit), progress, cancel)
            .instrument(tracing::info_span!("phase", phase = %Phase::Import))
            .await?;

        // Canonical writes are done; the audit trail is written even if a
        // cancellation arrives now.
        let written = phases::write_ledger(
            store,
            run,
            None,
            Some(Deadline::start(Phase::Ledger, limit)),
            Some(progress),
        )
        .instrument(tracing::info_span!("phase", phase = %Phase::Ledger))
        .await?;
        tracing::debug!(written, "Ledger written");
        Ok(())
    }

    async fn complete(&self, run: &mut JobRun) -> Result<JobResult, PipelineError> {
        let summary = run.finalize_summary().clone();
        let errors = run.errors.to_vec();
        let warnings = run.warnings.to_vec();
        let finished = self
            .store
            .finish_job(
                run.job_id,
                JobCompletion {
                    status: JobStatus::Completed,
                    counters: &run.counters,
                    errors: &errors,
                    warnings: &warnings,
                    summary: Some(&summary),
                },
            )
            .await?;
        if finished.is_none() {
            tracing::warn!("Job left the running state before completion was recorded");
        }

        tracing::info!(
            total = summary.total_records,
            successful = summary.successful_records,
            failed = summary.failed_records,
            duplicates = summary.duplicates_found,
            quality_rejections = summary.quality_rejections,
            duration_ms = summary.duration_ms,
            "Import job completed"
        );
        self.events.publish(
            ImportEvent::new(IMPORT_JOB_COMPLETED, run.tenant_id, run.job_id)
                .with_payload(serde_json::to_value(&summary).unwrap_or_default()),
        );
        Ok(run.result(true))
    }

    async fn fail(&self, run: &mut JobRun, err: PipelineError) -> Result<JobResult, PipelineError> {
        tracing::error!(error = %err, "Import job failed");

        let has_rows = !run.records.is_empty() || !run.unprocessed.is_empty();
        run.abort(&err);
        if has_rows {
            let reason = format!("job aborted before transformation: {err}");
            if let Err(e) = phases::write_ledger(self.store.as_ref(), run, Some(&reason), None, None).await {
                tracing::error!(error = %e, "Failed to write ledger for aborted job");
                run.errors.push_always(format!("ledger write failed: {e}"));
            }
        }
        run.errors.push_always(err.to_string());

        let summary = run.finalize_summary().clone();
        let errors = run.errors.to_vec();
        let warnings = run.warnings.to_vec();
        let finished = self
            .store
            .finish_job(
                run.job_id,
                JobCompletion {
                    status: JobStatus::Failed,
                    counters: &run.counters,
                    errors: &errors,
                    warnings: &warnings,
                    summary: Some(&summary),
                },
            )
            .await?;
        if finished.is_none() {
            tracing::warn!("Job left the running state before failure was recorded");
        }

        self.events.publish(
            ImportEvent::new(IMPORT_JOB_FAILED, run.tenant_id, run.job_id)
                .with_payload(serde_json::json!({ "error": err.to_string() })),
        );
        Ok(run.result(false))
    }

    /// Fail a job whose stored configuration cannot be run.
    async fn fail_unstarted(&self, job: &ImportJob, err: PipelineError) -> Result<JobResult, PipelineError> {
        tracing::error!(error = %err, "Import job could not start");
        let errors = vec![err.to_string()];
        let counters = JobCounters::default();
        self.store
            .finish_job(
                job.id,
                JobCompletion {
                    status: JobStatus::Failed,
                    counters: &counters,
                    errors: &errors,
                    warnings: &[],
                    summary: None,
                },
            )
            .await?;
        self.events.publish(
            ImportEvent::new(IMPORT_JOB_FAILED, job.tenant_id, job.id)
                .with_payload(serde_json::json!({ "error": err.to_string() })),
        );
        Ok(JobResult {
            success: false,
            errors,
            ..Default::default()
        })
    }

    // -----------------------------------------------------------------------
    // Read surfaces
    // -----------------------------------------------------------------------

    pub async fn get_import_job(&self, tenant_id: DbId, job_id: DbId) -> Result<ImportJob, PipelineError> {
        self.store
            .get_job(tenant_id, job_id)
            .await?
            .ok_or(PipelineError::NotFound { job_id })
    }

    pub async fn list_import_jobs(
        &self,
        tenant_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportJob>, PipelineError> {
        Ok(self.store.list_jobs(tenant_id, limit, offset).await?)
    }

    /// Ledger entries of a tenant's job, in source order.
    pub async fn list_import_records(
        &self,
        tenant_id: DbId,
        job_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportRecord>, PipelineError> {
        self.get_import_job(tenant_id, job_id).await?;
        Ok(self.store.list_ledger(tenant_id, job_id, limit, offset).await?)
    }

    pub async fn ledger_status_counts(
        &self,
        tenant_id: DbId,
        job_id: DbId,
    ) -> Result<Vec<StatusCount>, PipelineError> {
        self.get_import_job(tenant_id, job_id).await?;
        Ok(self.store.ledger_status_counts(tenant_id, job_id).await?)
    }
}
