//! End-to-end job execution against the in-memory store.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use ledgerlift_core::entity::TargetEntity;
use ledgerlift_core::import_job::{DataFilter, FilterOp, JobStatus, RecordStatus, FILTERED_REASON};
use ledgerlift_core::progress::Phase;
use ledgerlift_core::source_system::SourceSystemType;
use ledgerlift_db::models::import_record::ImportRecord;
use ledgerlift_events::bus::{IMPORT_JOB_COMPLETED, IMPORT_JOB_CREATED, IMPORT_JOB_FAILED, IMPORT_JOB_STARTED};
use ledgerlift_pipeline::{ImportPipeline, MemoryImportStore, PipelineConfig, PipelineError};
use ledgerlift_core::types::DbId;
use ledgerlift_core::validation::hooks::CustomRuleRegistry;
use ledgerlift_core::validation::rules::ValidationRule;
use tokio_util::sync::CancellationToken;

async fn run(pipeline: &ImportPipeline, job_id: DbId) -> ledgerlift_core::import_job::JobResult {
    pipeline
        .execute_import_job(TENANT, job_id, None, CancellationToken::new())
        .await
        .unwrap()
}

async fn ledger(pipeline: &ImportPipeline, job_id: DbId) -> Vec<ImportRecord> {
    pipeline
        .list_import_records(TENANT, job_id, Some(500), None)
        .await
        .unwrap()
}

fn by_row<'a>(ledger: &'a [ImportRecord], row: &str) -> &'a ImportRecord {
    ledger.iter().find(|r| r.source_row_id == row).unwrap()
}

fn short_phases() -> PipelineConfig {
    PipelineConfig {
        phase_timeout: Duration::from_millis(200),
        ..PipelineConfig::default()
    }
}

fn is_client(value: &ledgerlift_core::field_value::FieldValue, name: &str) -> bool {
    value.as_text().as_deref() == Some(name)
}

/// The job failed, its counters are consistent, and every extracted row has
/// exactly one ledger entry.
async fn assert_aborted_cleanly(h: &Harness, job_id: DbId, rows: usize) -> Vec<ImportRecord> {
    let job = h.pipeline.get_import_job(TENANT, job_id).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Failed));
    assert_eq!(job.total_records, rows as i64);
    assert!(job.successful_records + job.failed_records <= job.processed_records);
    assert!(job.processed_records <= job.total_records);
    assert!(h.store.counter_history(job_id).iter().all(|c| c.is_consistent()));

    let ledger = ledger(&h.pipeline, job_id).await;
    assert_eq!(ledger.len(), rows);
    let mut ids: Vec<_> = ledger.iter().map(|r| r.source_row_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), rows);
    ledger
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spreadsheet_row_missing_email_is_skipped_for_quality() {
    let h = harness();
    let path = temp_file(
        "clients.csv",
        "Name,Type,Email\n\
         Acme Holdings,Corporation,ops@acme.io\n\
         Birch Partners,Partnership,\n\
         Cedar Works,LLC,info@cedar.io\n",
    )
    .await;
    let req = file_request(SourceSystemType::Spreadsheet, &path);
    let job = h.pipeline.create_import_job(TENANT, &req, Some(ACTOR)).await.unwrap();

    let result = run(&h.pipeline, job.id).await;
    tokio::fs::remove_file(&path).await.ok();

    assert!(result.success);
    assert_eq!(result.total_processed, 3);
    assert_eq!(result.successful_records, 2);
    assert_eq!(result.failed_records, 0);

    let ledger = ledger(&h.pipeline, job.id).await;
    assert_eq!(ledger.len(), 3);
    let birch = by_row(&ledger, "2");
    assert_eq!(birch.status(), Some(RecordStatus::Skipped));
    assert_eq!(birch.quality_score, Some(0.9));
    assert!(birch.canonical_id.is_none());
    assert!(birch.reason.as_deref().unwrap().contains("quality score"));

    let clients = h.store.entities(TENANT);
    assert_eq!(clients.len(), 2);
    assert!(clients.iter().all(|c| c.entity == TargetEntity::Client));
    assert_eq!(text(&clients[0].data, "type").as_deref(), Some("company"));
    assert_eq!(by_row(&ledger, "1").canonical_id, Some(clients[0].id));

    let job = h.pipeline.get_import_job(TENANT, job.id).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Completed));
    let summary = job.summary.unwrap();
    assert_eq!(summary["quality_rejections"], 1);
    assert_eq!(summary["created"], 2);
}

#[tokio::test]
async fn desktop_customer_type_is_value_mapped() {
    let h = harness();
    let path = temp_file(
        "customers.csv",
        "Customer,Customer_Type,Main Email\nacme holdings,Corporation,ops@acme.io\n",
    )
    .await;
    let req = file_request(SourceSystemType::DesktopBookkeeping, &path);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;
    tokio::fs::remove_file(&path).await.ok();

    assert!(result.success);
    let clients = h.store.entities(TENANT);
    assert_eq!(clients.len(), 1);
    assert_eq!(text(&clients[0].data, "type").as_deref(), Some("company"));
    assert_eq!(text(&clients[0].data, "name").as_deref(), Some("Acme Holdings"));
}

#[tokio::test]
async fn transactions_are_imported_from_csv() {
    let h = harness();
    let path = temp_file(
        "ledger.csv",
        "Date,Amount,Description,Reference\n\
         2023-01-05,\"$1,200.50\",Retainer,INV-1\n\
         2023-02-01,15,Filing fee,INV-2\n",
    )
    .await;
    let req = file_request(SourceSystemType::Csv, &path);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;
    tokio::fs::remove_file(&path).await.ok();

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.successful_records, 2);
    let stored = h.store.entities(TENANT);
    assert!(stored.iter().all(|e| e.entity == TargetEntity::Transaction));
    let ledger = ledger(&h.pipeline, job.id).await;
    assert!(ledger.iter().all(|r| r.entity_type.as_deref() == Some("transaction")));
}

// ---------------------------------------------------------------------------
// Progress and accounting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn progress_reports_each_transform_batch() {
    let h = harness();
    let mut req = manual_request(client_rows(250));
    req.batch_size = Some(100);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();
    let (callback, seen) = collector();

    let result = h
        .pipeline
        .execute_import_job(TENANT, job.id, Some(callback), CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success);

    let seen = seen.lock().unwrap();
    let transform: Vec<usize> = seen
        .iter()
        .filter(|u| u.phase == Phase::Transformation)
        .map(|u| u.completed)
        .collect();
    assert_eq!(transform, vec![100, 200, 250]);
    assert!(seen.windows(2).all(|w| w[0].percentage <= w[1].percentage));
    assert_eq!(seen.last().unwrap().percentage, 100.0);
}

#[tokio::test]
async fn every_row_gets_exactly_one_ledger_entry() {
    let h = harness();
    let mut rows = client_rows(40);
    // Invalid, low quality, and an in-run duplicate.
    rows.push(serde_json::json!({ "Name": "", "Email": "nobody@example.com", "Type": "LLC" }));
    rows.push(serde_json::json!({ "Name": "Quiet Co", "Type": "LLC" }));
    rows.push(serde_json::json!({ "Name": "Client 1", "Type": "LLC", "Email": "client1@example.com" }));
    let mut req = manual_request(rows);
    req.batch_size = Some(7);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    let ledger = ledger(&h.pipeline, job.id).await;
    assert_eq!(ledger.len(), 43);
    let counts = h.pipeline.ledger_status_counts(TENANT, job.id).await.unwrap();
    assert_eq!(counts.iter().map(|c| c.count).sum::<i64>(), 43);
    assert_eq!(result.total_processed, 43);
    assert_eq!(result.successful_records, 40);
    assert_eq!(result.failed_records, 1);
    assert_eq!(by_row(&ledger, "41").status(), Some(RecordStatus::Failed));
    assert_eq!(by_row(&ledger, "42").status(), Some(RecordStatus::Skipped));
    let dup = by_row(&ledger, "43");
    assert!(dup.is_duplicate);
    assert_eq!(dup.status(), Some(RecordStatus::Skipped));
    assert_eq!(dup.duplicate_of.as_ref().unwrap()["row_id"], "1");
}

#[tokio::test]
async fn counters_stay_consistent_at_every_checkpoint() {
    let store = MemoryImportStore::new().failing_writes_when(|r| {
        text(r, "name").is_some_and(|n| n.ends_with('3'))
    });
    let h = harness_with(store);
    let mut rows = client_rows(30);
    rows.push(serde_json::json!({ "Name": "", "Email": "x@example.com" }));
    let mut req = manual_request(rows);
    req.batch_size = Some(4);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    run(&h.pipeline, job.id).await;

    let history = h.store.counter_history(job.id);
    assert!(history.len() > 2);
    assert!(history.iter().all(|c| c.is_consistent()));
    assert!(history
        .windows(2)
        .all(|w| w[0].processed_records <= w[1].processed_records));
    assert_eq!(history.last().unwrap().total_records, 31);
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn skip_duplicates_prevents_writes_for_existing_records() {
    let h = harness();
    let existing = h.store.seed_entity(
        TENANT,
        TargetEntity::Client,
        client("Acme Holdings", "ops@acme.io", "company"),
    );
    let req = manual_request(vec![
        serde_json::json!({ "Name": "Acme Holdings Inc", "Type": "Corporation", "Email": "ops@acme.io" }),
    ]);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(result.success);
    assert_eq!(h.store.canonical_writes(), 0);
    let ledger = ledger(&h.pipeline, job.id).await;
    assert!(ledger[0].is_duplicate);
    assert_eq!(ledger[0].status(), Some(RecordStatus::Skipped));
    assert_eq!(ledger[0].duplicate_of.as_ref().unwrap()["id"], existing);
}

#[tokio::test]
async fn rejected_rows_still_carry_duplicate_info() {
    let h = harness();
    let existing = h.store.seed_entity(
        TENANT,
        TargetEntity::Client,
        client("Acme Holdings", "ops@acme.io", "company"),
    );
    let mut req = manual_request(vec![
        serde_json::json!({ "Name": "Acme Holdings", "Type": "Corporation", "Email": "ops@acme.io" }),
        serde_json::json!({ "Name": "Acme Holdings", "Type": "Corporation", "Email": "ops@acme.io", "Phone": "555-0100" }),
    ]);
    req.validation_rules.push(ValidationRule::required("phone"));
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert_eq!(result.failed_records, 1);
    let ledger = ledger(&h.pipeline, job.id).await;
    let rejected = by_row(&ledger, "1");
    assert_eq!(rejected.status(), Some(RecordStatus::Failed));
    assert!(rejected.is_duplicate);
    assert_eq!(rejected.duplicate_of.as_ref().unwrap()["id"], existing);
    // A rejected row is never a match target for later rows.
    let later = by_row(&ledger, "2");
    assert!(later.is_duplicate);
    assert_eq!(later.duplicate_of.as_ref().unwrap()["id"], existing);
}

#[tokio::test]
async fn existing_records_of_other_tenants_are_not_duplicates() {
    let h = harness();
    h.store.seed_entity(
        TENANT + 1,
        TargetEntity::Client,
        client("Acme Holdings", "ops@acme.io", "company"),
    );
    let req = manual_request(vec![
        serde_json::json!({ "Name": "Acme Holdings", "Type": "Corporation", "Email": "ops@acme.io" }),
    ]);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert_eq!(result.successful_records, 1);
    assert_eq!(h.store.entities(TENANT).len(), 1);
}

#[tokio::test]
async fn update_existing_overwrites_the_matched_entity() {
    let h = harness();
    let existing = h.store.seed_entity(
        TENANT,
        TargetEntity::Client,
        client("Acme Holdings", "ops@acme.io", "llc"),
    );
    let mut req = manual_request(vec![
        serde_json::json!({ "Name": "Acme Holdings", "Type": "Corporation", "Email": "ops@acme.io" }),
    ]);
    req.flags.skip_duplicates = false;
    req.flags.update_existing = true;
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert_eq!(result.successful_records, 1);
    let clients = h.store.entities(TENANT);
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, existing);
    assert_eq!(text(&clients[0].data, "type").as_deref(), Some("company"));
    let ledger = ledger(&h.pipeline, job.id).await;
    assert_eq!(ledger[0].canonical_id, Some(existing));
    let summary = h.pipeline.get_import_job(TENANT, job.id).await.unwrap().summary.unwrap();
    assert_eq!(summary["updated"], 1);
}

#[tokio::test]
async fn manual_review_holds_every_record() {
    let h = harness();
    let mut req = manual_request(client_rows(5));
    req.flags.manual_review_required = true;
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(result.success);
    assert_eq!(result.successful_records, 0);
    assert_eq!(h.store.canonical_writes(), 0);
    let ledger = ledger(&h.pipeline, job.id).await;
    assert!(ledger.iter().all(|r| r.status() == Some(RecordStatus::Pending)));
    let summary = h.pipeline.get_import_job(TENANT, job.id).await.unwrap().summary.unwrap();
    assert_eq!(summary["awaiting_review"], 5);
}

#[tokio::test]
async fn filtered_rows_are_ledgered_as_skipped() {
    let h = harness();
    let mut rows = client_rows(3);
    rows.push(serde_json::json!({ "Name": "Dana Smith", "Type": "Individual", "Email": "dana@example.com" }));
    let mut req = manual_request(rows);
    req.filters = vec![DataFilter {
        field: "Type".into(),
        op: FilterOp::NotEquals,
        value: Some("individual".into()),
    }];
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert_eq!(result.total_processed, 4);
    assert_eq!(result.successful_records, 3);
    let dana = by_row(&ledger(&h.pipeline, job.id).await, "4").clone();
    assert_eq!(dana.status(), Some(RecordStatus::Skipped));
    assert_eq!(dana.reason.as_deref(), Some(FILTERED_REASON));
    assert!(dana.quality_score.is_none());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn write_failure_is_isolated_to_the_record() {
    let store = MemoryImportStore::new()
        .failing_writes_when(|r| text(r, "name").as_deref() == Some("Client 2"));
    let h = harness_with(store);
    let job = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(3)), None)
        .await
        .unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(result.success);
    assert_eq!(result.successful_records, 2);
    assert_eq!(result.failed_records, 1);
    assert!(result.errors.iter().any(|e| e.contains("row 2") && e.contains("write failed")));
    let ledger = ledger(&h.pipeline, job.id).await;
    assert_eq!(by_row(&ledger, "2").status(), Some(RecordStatus::Failed));
    assert_eq!(by_row(&ledger, "3").status(), Some(RecordStatus::Processed));
}

#[tokio::test]
async fn empty_source_fails_the_job() {
    let h = harness();
    let path = temp_file("empty.csv", "Name,Email\n").await;
    let job = h
        .pipeline
        .create_import_job(TENANT, &file_request(SourceSystemType::Csv, &path), None)
        .await
        .unwrap();

    let result = run(&h.pipeline, job.id).await;
    tokio::fs::remove_file(&path).await.ok();

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("no records")));
    let job = h.pipeline.get_import_job(TENANT, job.id).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Failed));
    assert_eq!(job.total_records, 0);
    assert!(ledger(&h.pipeline, job.id).await.is_empty());
}

#[tokio::test]
async fn unreadable_source_fails_without_writes() {
    let h = harness();
    let path = std::path::PathBuf::from("/nonexistent/ledgerlift/clients.csv");
    let job = h
        .pipeline
        .create_import_job(TENANT, &file_request(SourceSystemType::Csv, &path), None)
        .await
        .unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(!result.success);
    assert_eq!(h.store.canonical_writes(), 0);
    let job = h.pipeline.get_import_job(TENANT, job.id).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Failed));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn cancelled_job_is_marked_failed() {
    let h = harness();
    let job = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(3)), None)
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .pipeline
        .execute_import_job(TENANT, job.id, None, cancel)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("cancelled")));
    assert_eq!(h.store.canonical_writes(), 0);
    let job = h.pipeline.get_import_job(TENANT, job.id).await.unwrap();
    assert_eq!(job.status(), Some(JobStatus::Failed));
}

#[tokio::test]
async fn transform_timeout_still_ledgers_every_row() {
    let mut hooks = CustomRuleRegistry::default();
    hooks.register("slow_name", |value, _| {
        if is_client(value, "Client 3") {
            std::thread::sleep(Duration::from_millis(800));
        }
        true
    });
    let h = harness_tuned(MemoryImportStore::new(), short_phases(), hooks);
    let mut req = manual_request(client_rows(5));
    req.batch_size = Some(2);
    req.validation_rules.push(hook_rule("name", "slow_name"));
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("timed out")));
    assert_eq!(h.store.canonical_writes(), 0);
    let ledger = assert_aborted_cleanly(&h, job.id, 5).await;
    assert!(ledger.iter().all(|r| r.status() == Some(RecordStatus::Failed)));
    let untouched = by_row(&ledger, "4");
    assert!(untouched.reason.as_deref().unwrap().contains("before transformation"));
}

#[tokio::test]
async fn panicked_batch_still_ledgers_every_row() {
    let mut hooks = CustomRuleRegistry::default();
    hooks.register("explode", |value, _| {
        if is_client(value, "Client 4") {
            panic!("hook blew up");
        }
        true
    });
    let h = harness_tuned(MemoryImportStore::new(), PipelineConfig::default(), hooks);
    let mut req = manual_request(client_rows(5));
    req.batch_size = Some(2);
    req.validation_rules.push(hook_rule("name", "explode"));
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(!result.success);
    let ledger = assert_aborted_cleanly(&h, job.id, 5).await;
    let job = h.pipeline.get_import_job(TENANT, job.id).await.unwrap();
    assert_eq!(job.processed_records, 2);
    assert_eq!(by_row(&ledger, "1").status(), Some(RecordStatus::Failed));
    assert!(by_row(&ledger, "3")
        .reason
        .as_deref()
        .unwrap()
        .contains("before transformation"));
}

#[tokio::test]
async fn cancellation_between_transform_batches_ledgers_every_row() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut hooks = CustomRuleRegistry::default();
    hooks.register("cancel_on_third", move |value, _| {
        if is_client(value, "Client 3") {
            trigger.cancel();
        }
        true
    });
    let h = harness_tuned(MemoryImportStore::new(), PipelineConfig::default(), hooks);
    let mut req = manual_request(client_rows(5));
    req.batch_size = Some(2);
    req.validation_rules.push(hook_rule("name", "cancel_on_third"));
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = h
        .pipeline
        .execute_import_job(TENANT, job.id, None, cancel)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("cancelled")));
    assert_eq!(h.store.canonical_writes(), 0);
    assert_eq!(result.total_processed, 4);
    assert_eq!(result.failed_records, 4);
    let ledger = assert_aborted_cleanly(&h, job.id, 5).await;
    assert!(by_row(&ledger, "2").reason.as_deref().unwrap().contains("before import"));
    assert!(by_row(&ledger, "5")
        .reason
        .as_deref()
        .unwrap()
        .contains("before transformation"));
}

#[tokio::test]
async fn cancellation_between_import_batches_keeps_committed_writes() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let store = MemoryImportStore::new().failing_writes_when(move |r| {
        if text(r, "name").as_deref() == Some("Client 3") {
            trigger.cancel();
        }
        false
    });
    let h = harness_with(store);
    let mut req = manual_request(client_rows(5));
    req.batch_size = Some(2);
    let job = h.pipeline.create_import_job(TENANT, &req, None).await.unwrap();

    let result = h
        .pipeline
        .execute_import_job(TENANT, job.id, None, cancel)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.successful_records, 4);
    assert_eq!(result.failed_records, 1);
    assert_eq!(h.store.canonical_writes(), 4);
    let ledger = assert_aborted_cleanly(&h, job.id, 5).await;
    let imported: Vec<_> = ledger
        .iter()
        .filter(|r| r.status() == Some(RecordStatus::Processed))
        .collect();
    assert_eq!(imported.len(), 4);
    assert!(imported.iter().all(|r| r.canonical_id.is_some()));
    assert_eq!(by_row(&ledger, "5").status(), Some(RecordStatus::Failed));
}

#[tokio::test]
async fn import_timeout_never_discards_a_committed_write() {
    let store = MemoryImportStore::new().failing_writes_when(|r| {
        if text(r, "name").as_deref() == Some("Client 3") {
            std::thread::sleep(Duration::from_millis(400));
        }
        false
    });
    let h = harness_tuned(store, short_phases(), CustomRuleRegistry::default());
    let job = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(5)), None)
        .await
        .unwrap();

    let result = run(&h.pipeline, job.id).await;

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("timed out")));
    assert_eq!(h.store.canonical_writes(), 3);
    assert_eq!(result.successful_records, 3);
    assert_eq!(result.failed_records, 2);
    let ledger = assert_aborted_cleanly(&h, job.id, 5).await;
    let slow = by_row(&ledger, "3");
    assert_eq!(slow.status(), Some(RecordStatus::Processed));
    assert!(slow.canonical_id.is_some());
    assert_eq!(by_row(&ledger, "4").status(), Some(RecordStatus::Failed));
}

#[tokio::test]
async fn jobs_cannot_be_executed_twice() {
    let h = harness();
    let job = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(1)), None)
        .await
        .unwrap();
    run(&h.pipeline, job.id).await;

    let err = h
        .pipeline
        .execute_import_job(TENANT, job.id, None, CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::InvalidState { .. });
}

#[tokio::test]
async fn unknown_or_foreign_jobs_are_not_found() {
    let h = harness();
    let job = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(1)), None)
        .await
        .unwrap();

    assert_matches!(
        h.pipeline
            .execute_import_job(TENANT + 1, job.id, None, CancellationToken::new())
            .await,
        Err(PipelineError::NotFound { .. })
    );
    assert_matches!(
        h.pipeline
            .execute_import_job(TENANT, job.id + 1000, None, CancellationToken::new())
            .await,
        Err(PipelineError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_events_are_published_in_order() {
    let h = harness();
    let mut rx = h.events.subscribe();
    let ok = h
        .pipeline
        .create_import_job(TENANT, &manual_request(client_rows(1)), None)
        .await
        .unwrap();
    run(&h.pipeline, ok.id).await;

    let path = temp_file("empty-events.csv", "Name\n").await;
    let bad = h
        .pipeline
        .create_import_job(TENANT, &file_request(SourceSystemType::Csv, &path), None)
        .await
        .unwrap();
    run(&h.pipeline, bad.id).await;
    tokio::fs::remove_file(&path).await.ok();

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push((event.event_type, event.job_id));
    }
    assert_eq!(
        types,
        vec![
            (IMPORT_JOB_CREATED.to_string(), ok.id),
            (IMPORT_JOB_STARTED.to_string(), ok.id),
            (IMPORT_JOB_COMPLETED.to_string(), ok.id),
            (IMPORT_JOB_CREATED.to_string(), bad.id),
            (IMPORT_JOB_STARTED.to_string(), bad.id),
            (IMPORT_JOB_FAILED.to_string(), bad.id),
        ]
    );
}
