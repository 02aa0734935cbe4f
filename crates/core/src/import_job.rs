//! Import job configuration, lifecycle states, and run accounting.
//!
//! This module has no DB or async dependencies. It provides:
//!
//! - Job and ledger status enums with string conversions
//! - Data filters applied to raw rows before transformation
//! - The operator-facing create request and its validation
//! - The transformation rule set derived from mappings
//! - Counter, summary, and result types for a run

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::duplicate_detection::{self, DEFAULT_SIMILARITY_THRESHOLD};
use crate::error::CoreError;
use crate::field_value::RawRecord;
use crate::mapping::MappingSet;
use crate::quality::{self, DEFAULT_QUALITY_THRESHOLD};
use crate::source_system::{validate_source_config, SourceConfig, SourceSystemType};
use crate::transform::lookup_source;
use crate::types::Timestamp;
use crate::validation::rules::{RuleKind, ValidationRule};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const MAX_BATCH_SIZE: u32 = 10_000;
pub const MAX_JOB_NAME_LENGTH: u64 = 200;
pub const MAX_DATA_FILTERS: u64 = 50;
pub const MAX_VALIDATION_RULES: u64 = 500;

/// Ledger reason recorded for rows removed by a data filter.
pub const FILTERED_REASON: &str = "excluded by data filter";

// ---------------------------------------------------------------------------
// Job Status
// ---------------------------------------------------------------------------

/// Lifecycle state of an import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["pending", "running", "completed", "failed"];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `pending -> running -> {completed | failed}`. Terminal jobs never
    /// move again.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record Status
// ---------------------------------------------------------------------------

/// Final status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Held for manual review.
    Pending,
    /// Written to the canonical store.
    Processed,
    /// Invalid, or the canonical write failed.
    Failed,
    /// Excluded by quality, duplicate, or data-filter checks.
    Skipped,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["pending", "processed", "failed", "skipped"];
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Data Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotEmpty,
    IsEmpty,
}

impl FilterOp {
    fn needs_value(&self) -> bool {
        matches!(self, Self::Equals | Self::NotEquals | Self::Contains)
    }
}

/// A predicate on a raw source field. Rows must satisfy every filter of a
/// job to be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFilter {
    pub field: String,
    pub op: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl DataFilter {
    /// Whether `raw` passes this filter. Comparisons ignore ASCII case.
    pub fn matches(&self, raw: &RawRecord) -> bool {
        let text = lookup_source(raw, &self.field).and_then(|v| v.as_text());
        let wanted = self.value.as_deref().unwrap_or("").trim().to_lowercase();
        match self.op {
            FilterOp::IsEmpty => text.is_none(),
            FilterOp::NotEmpty => text.is_some(),
            FilterOp::Equals => text.is_some_and(|t| t.trim().to_lowercase() == wanted),
            FilterOp::NotEquals => text.map_or(true, |t| t.trim().to_lowercase() != wanted),
            FilterOp::Contains => text.is_some_and(|t| t.to_lowercase().contains(&wanted)),
        }
    }
}

/// Whether `raw` passes every filter.
pub fn passes_filters(filters: &[DataFilter], raw: &RawRecord) -> bool {
    filters.iter().all(|f| f.matches(raw))
}

pub fn validate_filters(filters: &[DataFilter]) -> Result<(), CoreError> {
    for (i, f) in filters.iter().enumerate() {
        if f.field.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Data filter at index {i} must name a field"
            )));
        }
        if f.op.needs_value() && f.value.is_none() {
            return Err(CoreError::Validation(format!(
                "Data filter on '{}' requires a value",
                f.field
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flags and configuration
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// Behavioral switches of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFlags {
    #[serde(default = "default_true")]
    pub validate_data: bool,
    #[serde(default = "default_true")]
    pub skip_duplicates: bool,
    #[serde(default)]
    pub update_existing: bool,
    #[serde(default)]
    pub manual_review_required: bool,
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self {
            validate_data: true,
            skip_duplicates: true,
            update_existing: false,
            manual_review_required: false,
        }
    }
}

/// Mappings plus the full validation rule list, operator-supplied and
/// derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationRuleSet {
    pub mappings: MappingSet,
    pub validation_rules: Vec<ValidationRule>,
}

impl TransformationRuleSet {
    /// Combine mappings with operator rules, adding a `required` rule for
    /// every required mapping and an email format rule for every `email`
    /// target not already covered by an operator rule.
    pub fn build(mappings: MappingSet, operator_rules: Vec<ValidationRule>) -> Self {
        let mut rules = operator_rules;
        let derived: Vec<ValidationRule> = mappings
            .iter()
            .flat_map(|(entity, m)| {
                let covered = |kind: RuleKind| {
                    rules.iter().any(|r| {
                        r.kind == kind && r.field == m.target_field && r.applies_to(entity)
                    })
                };
                let mut out = Vec::new();
                if m.required && !covered(RuleKind::Required) {
                    out.push(ValidationRule::required(&m.target_field).for_entity(entity));
                }
                if m.target_field == "email" && !covered(RuleKind::Format) {
                    out.push(ValidationRule::email(&m.target_field).for_entity(entity));
                }
                out
            })
            .collect();
        rules.extend(derived);
        Self {
            mappings,
            validation_rules: rules,
        }
    }
}

/// Resolved configuration persisted with a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJobConfig {
    pub source: SourceConfig,
    pub rules: TransformationRuleSet,
    #[serde(default)]
    pub filters: Vec<DataFilter>,
    pub batch_size: u32,
    #[serde(default)]
    pub flags: ImportFlags,
    pub quality_threshold: f64,
    pub similarity_threshold: f64,
}

/// Operator request to create an import job.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateImportJobRequest {
    #[validate(length(min = 1, max = MAX_JOB_NAME_LENGTH))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub source_system: SourceSystemType,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub mappings: MappingSet,
    #[serde(default)]
    #[validate(length(max = MAX_VALIDATION_RULES))]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default)]
    #[validate(length(max = MAX_DATA_FILTERS))]
    pub filters: Vec<DataFilter>,
    #[validate(range(min = 1, max = MAX_BATCH_SIZE))]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub flags: ImportFlags,
    pub quality_threshold: Option<f64>,
    pub similarity_threshold: Option<f64>,
    pub scheduled_start_at: Option<Timestamp>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateImportJobRequest {
    /// Minimal request with template-free defaults; used by tests and
    /// callers that fill fields in afterwards.
    pub fn new(name: impl Into<String>, source_system: SourceSystemType, source: SourceConfig) -> Self {
        Self {
            name: name.into(),
            description: None,
            source_system,
            source,
            mappings: MappingSet::default(),
            validation_rules: Vec::new(),
            filters: Vec::new(),
            batch_size: None,
            flags: ImportFlags::default(),
            quality_threshold: None,
            similarity_threshold: None,
            scheduled_start_at: None,
            metadata: None,
        }
    }
}

/// Validate a create request and resolve it into a persisted configuration.
///
/// Fails before any extraction is attempted.
pub fn build_job_config(req: &CreateImportJobRequest) -> Result<ImportJobConfig, CoreError> {
    req.validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    validate_source_config(req.source_system, &req.source)?;
    req.mappings.validate()?;
    validate_filters(&req.filters)?;

    let quality_threshold = req.quality_threshold.unwrap_or(DEFAULT_QUALITY_THRESHOLD);
    quality::validate_threshold(quality_threshold)?;
    let similarity_threshold = req
        .similarity_threshold
        .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    duplicate_detection::validate_threshold(similarity_threshold)?;

    Ok(ImportJobConfig {
        source: req.source.clone(),
        rules: TransformationRuleSet::build(req.mappings.clone(), req.validation_rules.clone()),
        filters: req.filters.clone(),
        batch_size: req.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        flags: req.flags,
        quality_threshold,
        similarity_threshold,
    })
}

// ---------------------------------------------------------------------------
// Run accounting
// ---------------------------------------------------------------------------

/// Job counters as persisted at each checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
}

impl JobCounters {
    /// `successful + failed <= processed <= total`.
    pub fn is_consistent(&self) -> bool {
        self.successful_records >= 0
            && self.failed_records >= 0
            && self.successful_records + self.failed_records <= self.processed_records
            && self.processed_records <= self.total_records
    }
}

/// Summary stored on a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub created: i64,
    pub updated: i64,
    pub duplicates_found: i64,
    pub duplicates_skipped: i64,
    pub quality_rejections: i64,
    pub filtered: i64,
    pub awaiting_review: i64,
    pub duration_ms: i64,
}

/// Outcome returned to the caller of a job execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub total_processed: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TargetEntity;
    use crate::field_value::FieldValue;
    use crate::transform::FieldMapping;
    use assert_matches::assert_matches;

    fn csv_request() -> CreateImportJobRequest {
        let mut req = CreateImportJobRequest::new(
            "Q1 migration",
            SourceSystemType::Csv,
            SourceConfig {
                location: Some("/tmp/clients.csv".into()),
                ..Default::default()
            },
        );
        req.mappings.client_mappings = vec![
            FieldMapping::new("Name", "name").required(),
            FieldMapping::new("Email", "email"),
        ];
        req
    }

    #[test]
    fn status_round_trip() {
        for s in JobStatus::ALL {
            assert_eq!(JobStatus::from_str(s).unwrap().as_str(), *s);
        }
        for s in RecordStatus::ALL {
            assert_eq!(RecordStatus::from_str(s).unwrap().as_str(), *s);
        }
        assert_eq!(JobStatus::from_str("cancelled"), None);
    }

    #[test]
    fn job_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn builds_config_with_defaults() {
        let config = build_job_config(&csv_request()).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.quality_threshold, 0.95);
        assert!(config.flags.skip_duplicates);
        assert!(config.flags.validate_data);
    }

    #[test]
    fn derives_required_and_email_rules() {
        let config = build_job_config(&csv_request()).unwrap();
        let rules = &config.rules.validation_rules;
        assert!(rules
            .iter()
            .any(|r| r.kind == RuleKind::Required && r.field == "name"
                && r.entity == Some(TargetEntity::Client)));
        assert!(rules.iter().any(|r| r.kind == RuleKind::Format && r.field == "email"));
    }

    #[test]
    fn operator_email_rule_not_duplicated() {
        let mut req = csv_request();
        req.validation_rules = vec![ValidationRule::email("email").as_warning()];
        let config = build_job_config(&req).unwrap();
        let email_rules = config
            .rules
            .validation_rules
            .iter()
            .filter(|r| r.field == "email")
            .count();
        assert_eq!(email_rules, 1);
    }

    #[test]
    fn missing_location_rejected() {
        let mut req = csv_request();
        req.source.location = None;
        assert_matches!(build_job_config(&req), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_size_bounds() {
        let mut req = csv_request();
        req.batch_size = Some(0);
        assert!(build_job_config(&req).is_err());
        req.batch_size = Some(MAX_BATCH_SIZE + 1);
        assert!(build_job_config(&req).is_err());
        req.batch_size = Some(250);
        assert_eq!(build_job_config(&req).unwrap().batch_size, 250);
    }

    #[test]
    fn blank_name_rejected() {
        let mut req = csv_request();
        req.name = String::new();
        assert!(build_job_config(&req).is_err());
    }

    #[test]
    fn thresholds_checked() {
        let mut req = csv_request();
        req.quality_threshold = Some(1.5);
        assert!(build_job_config(&req).is_err());
        let mut req = csv_request();
        req.similarity_threshold = Some(0.1);
        assert!(build_job_config(&req).is_err());
    }

    #[test]
    fn filters_require_values() {
        let mut req = csv_request();
        req.filters = vec![DataFilter {
            field: "Status".into(),
            op: FilterOp::Equals,
            value: None,
        }];
        assert!(build_job_config(&req).is_err());
    }

    #[test]
    fn filter_matching() {
        let mut raw = RawRecord::new();
        raw.insert("Status".into(), FieldValue::String("Active".into()));
        raw.insert("Notes".into(), FieldValue::Null);

        let eq = DataFilter { field: "status".into(), op: FilterOp::Equals, value: Some("active".into()) };
        let ne = DataFilter { field: "Status".into(), op: FilterOp::NotEquals, value: Some("Active".into()) };
        let contains = DataFilter { field: "Status".into(), op: FilterOp::Contains, value: Some("ctiv".into()) };
        let empty = DataFilter { field: "Notes".into(), op: FilterOp::IsEmpty, value: None };
        let missing = DataFilter { field: "Missing".into(), op: FilterOp::NotEmpty, value: None };

        assert!(eq.matches(&raw));
        assert!(!ne.matches(&raw));
        assert!(contains.matches(&raw));
        assert!(empty.matches(&raw));
        assert!(!missing.matches(&raw));
        assert!(!passes_filters(&[eq, missing], &raw));
    }

    #[test]
    fn counters_consistency() {
        let ok = JobCounters { total_records: 10, processed_records: 5, successful_records: 3, failed_records: 2 };
        assert!(ok.is_consistent());
        let bad = JobCounters { total_records: 10, processed_records: 5, successful_records: 4, failed_records: 2 };
        assert!(!bad.is_consistent());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: CreateImportJobRequest = serde_json::from_value(serde_json::json!({
            "name": "Import",
            "source_system": "online_bookkeeping",
            "source": { "location": "https://example.test/export.json" }
        }))
        .unwrap();
        assert!(req.flags.skip_duplicates);
        assert!(req.filters.is_empty());
    }
}
