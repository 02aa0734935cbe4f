use std::sync::Arc;
use std::time::Duration;

use ledgerlift_core::import_job::{CreateImportJobRequest, JobStatus};
use ledgerlift_core::mapping::mapping_templates;
use ledgerlift_core::source_system::{SourceConfig, SourceSystemType};
use ledgerlift_core::types::DbId;
use ledgerlift_events::EventBus;
use ledgerlift_pipeline::{ImportPipeline, MemoryImportStore};
use ledgerlift_worker::{JobPoller, PollSummary};
use tokio_util::sync::CancellationToken;

const TENANT: DbId = 3;

fn pipeline() -> (MemoryImportStore, ImportPipeline) {
    let store = MemoryImportStore::new();
    let pipeline = ImportPipeline::new(Arc::new(store.clone()), Arc::new(EventBus::default()));
    (store, pipeline)
}

fn manual_request() -> CreateImportJobRequest {
    let row = serde_json::json!({ "Name": "Acme Holdings", "Type": "LLC", "Email": "ops@acme.io" });
    let source = SourceConfig {
        inline_records: vec![row.as_object().cloned().unwrap()],
        ..Default::default()
    };
    let mut req = CreateImportJobRequest::new("Manual", SourceSystemType::PaperManual, source);
    req.mappings = mapping_templates(SourceSystemType::PaperManual);
    req
}

fn missing_file_request() -> CreateImportJobRequest {
    let source = SourceConfig {
        location: Some("/nonexistent/ledgerlift/worker.csv".into()),
        ..Default::default()
    };
    let mut req = CreateImportJobRequest::new("Broken", SourceSystemType::Csv, source);
    req.mappings = mapping_templates(SourceSystemType::Csv);
    req
}

fn poller(pipeline: ImportPipeline) -> JobPoller {
    JobPoller::with_schedule(pipeline, Duration::from_millis(10), 10)
}

async fn status(pipeline: &ImportPipeline, job_id: DbId) -> Option<JobStatus> {
    pipeline.get_import_job(TENANT, job_id).await.unwrap().status()
}

#[tokio::test]
async fn poll_executes_due_jobs() {
    let (store, pipeline) = pipeline();
    let ok = pipeline.create_import_job(TENANT, &manual_request(), None).await.unwrap();
    let broken = pipeline
        .create_import_job(TENANT, &missing_file_request(), None)
        .await
        .unwrap();

    let summary = poller(pipeline.clone())
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        PollSummary {
            executed: 2,
            succeeded: 1,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(status(&pipeline, ok.id).await, Some(JobStatus::Completed));
    assert_eq!(status(&pipeline, broken.id).await, Some(JobStatus::Failed));
    assert_eq!(store.canonical_writes(), 1);
}

#[tokio::test]
async fn future_jobs_wait_for_their_schedule() {
    let (_, pipeline) = pipeline();
    let mut req = manual_request();
    req.scheduled_start_at = Some(chrono::Utc::now() + chrono::Duration::hours(1));
    let job = pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let summary = poller(pipeline.clone())
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary, PollSummary::default());
    assert_eq!(status(&pipeline, job.id).await, Some(JobStatus::Pending));
}

#[tokio::test]
async fn cancelled_poll_starts_nothing() {
    let (_, pipeline) = pipeline();
    let job = pipeline.create_import_job(TENANT, &manual_request(), None).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = poller(pipeline.clone()).poll_once(&cancel).await.unwrap();

    assert_eq!(summary.executed, 0);
    assert_eq!(status(&pipeline, job.id).await, Some(JobStatus::Pending));
}

#[tokio::test]
async fn run_loop_stops_on_cancel() {
    let (_, pipeline) = pipeline();
    let job = pipeline.create_import_job(TENANT, &manual_request(), None).await.unwrap();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(poller(pipeline.clone()).run(cancel.clone()));

    let mut done = false;
    for _ in 0..200 {
        if status(&pipeline, job.id).await == Some(JobStatus::Completed) {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    assert!(done, "job was not picked up by the run loop");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}
