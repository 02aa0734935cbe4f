//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ledgerlift_core::field_value::{FieldValue, RawRecord};
use ledgerlift_core::import_job::CreateImportJobRequest;
use ledgerlift_core::mapping::mapping_templates;
use ledgerlift_core::progress::ProgressUpdate;
use ledgerlift_core::source_system::{SourceConfig, SourceSystemType};
use ledgerlift_core::types::DbId;
use ledgerlift_core::validation::hooks::CustomRuleRegistry;
use ledgerlift_core::validation::rules::{RuleKind, ValidationRule, ValidationSeverity};
use ledgerlift_events::EventBus;
use ledgerlift_pipeline::{ImportPipeline, MemoryImportStore, PipelineConfig, ProgressCallback};

pub const TENANT: DbId = 7;
pub const ACTOR: DbId = 99;

pub struct Harness {
    pub store: MemoryImportStore,
    pub events: Arc<EventBus>,
    pub pipeline: ImportPipeline,
}

pub fn harness() -> Harness {
    harness_with(MemoryImportStore::new())
}

pub fn harness_with(store: MemoryImportStore) -> Harness {
    let events = Arc::new(EventBus::default());
    let pipeline = ImportPipeline::new(Arc::new(store.clone()), Arc::clone(&events));
    Harness {
        store,
        events,
        pipeline,
    }
}

/// A harness whose pipeline runs with `config` and custom `hooks`.
pub fn harness_tuned(store: MemoryImportStore, config: PipelineConfig, hooks: CustomRuleRegistry) -> Harness {
    let events = Arc::new(EventBus::default());
    let pipeline = ImportPipeline::new(Arc::new(store.clone()), Arc::clone(&events))
        .with_config(config)
        .with_hooks(hooks);
    Harness {
        store,
        events,
        pipeline,
    }
}

/// A `custom` rule on `field` that calls the hook registered as `hook`.
pub fn hook_rule(field: &str, hook: &str) -> ValidationRule {
    ValidationRule {
        field: field.to_string(),
        kind: RuleKind::Custom,
        params: serde_json::json!({ "hook": hook }),
        message: format!("{field} failed {hook}"),
        severity: ValidationSeverity::Error,
        entity: None,
    }
}

/// A manual-entry request over inline rows, using the default templates.
pub fn manual_request(rows: Vec<serde_json::Value>) -> CreateImportJobRequest {
    let source = SourceConfig {
        inline_records: rows
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        ..Default::default()
    };
    let mut req = CreateImportJobRequest::new("Manual migration", SourceSystemType::PaperManual, source);
    req.mappings = mapping_templates(SourceSystemType::PaperManual);
    req
}

/// A file-based request for `system` reading `path`, using its templates.
pub fn file_request(system: SourceSystemType, path: &PathBuf) -> CreateImportJobRequest {
    let source = SourceConfig {
        location: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    let mut req = CreateImportJobRequest::new("File migration", system, source);
    req.mappings = mapping_templates(system);
    req
}

/// Write `contents` to a unique temp file.
pub async fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "ledgerlift-{}-{}-{name}",
        std::process::id(),
        uuid_like()
    ));
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

fn uuid_like() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

pub fn client_rows(n: usize) -> Vec<serde_json::Value> {
    (1..=n)
        .map(|i| {
            serde_json::json!({
                "Name": format!("Client {i}"),
                "Type": "LLC",
                "Email": format!("client{i}@example.com"),
            })
        })
        .collect()
}

pub fn collector() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::<ProgressUpdate>::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |u: ProgressUpdate| sink.lock().unwrap().push(u));
    (callback, seen)
}

pub fn text(record: &RawRecord, field: &str) -> Option<String> {
    record.get(field).and_then(FieldValue::as_text)
}

pub fn client(name: &str, email: &str, kind: &str) -> RawRecord {
    [("name", name), ("email", email), ("type", kind)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), FieldValue::String(v.to_string())))
        .collect()
}
