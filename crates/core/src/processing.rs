//! Per-record processing: filter, resolve entity, transform, validate, score,
//! and decide what the importer does with the result.

use serde::Serialize;

use crate::duplicate_detection::{DuplicateInfo, RecordKey};
use crate::entity::TargetEntity;
use crate::field_value::RawRecord;
use crate::import_job::{passes_filters, DataFilter, ImportFlags, RecordStatus, TransformationRuleSet, FILTERED_REASON};
use crate::quality::{meets_threshold, score_record};
use crate::transform::transform_record;
use crate::types::DbId;
use crate::validation::evaluator::evaluate_rules;
use crate::validation::hooks::CustomRuleRegistry;
use crate::validation::rules::{FieldViolation, ValidationResult};

/// Rule type recorded when no mapping matches a row.
pub const RULE_TYPE_ENTITY: &str = "entity";

/// One source row as it moves through a run. Never persisted directly.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRecord {
    /// Source row identifier (1-based position in the extracted set).
    pub row_id: String,
    pub original: RawRecord,
    pub transformed: RawRecord,
    pub entity: Option<TargetEntity>,
    pub validation: ValidationResult,
    pub duplicate: DuplicateInfo,
    /// Removed by a data filter before transformation.
    pub filtered: bool,
}

/// What the importer should do with a processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Filtered,
    Invalid,
    LowQuality,
    DuplicateSkipped,
    AwaitingReview,
    Insert,
    Update(DbId),
}

impl Disposition {
    /// Whether the importer writes this record to the canonical store.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert | Self::Update(_))
    }

    /// Ledger status for records that are not written. Written records get
    /// theirs from the write outcome.
    pub fn ledger_status(&self) -> Option<RecordStatus> {
        match self {
            Self::Filtered | Self::LowQuality | Self::DuplicateSkipped => Some(RecordStatus::Skipped),
            Self::Invalid => Some(RecordStatus::Failed),
            Self::AwaitingReview => Some(RecordStatus::Pending),
            Self::Insert | Self::Update(_) => None,
        }
    }
}

impl ProcessedRecord {
    /// Quality score for the ledger; absent for filtered rows.
    pub fn ledger_quality_score(&self) -> Option<f64> {
        (!self.filtered).then_some(self.validation.quality_score)
    }

    /// Key used by the duplicate detector, when the record resolved to an
    /// entity.
    pub fn duplicate_key(&self) -> Option<RecordKey> {
        let entity = self.entity?;
        let key = RecordKey::from_record(&self.transformed, entity);
        (!key.is_empty()).then_some(key)
    }

    /// Decide the import action. Checks run in order: filter, validity,
    /// quality, duplicate skipping, manual review.
    pub fn disposition(&self, flags: &ImportFlags, quality_threshold: f64) -> Disposition {
        if self.filtered {
            return Disposition::Filtered;
        }
        if self.entity.is_none() || !self.validation.is_valid {
            return Disposition::Invalid;
        }
        if !meets_threshold(self.validation.quality_score, quality_threshold) {
            return Disposition::LowQuality;
        }
        if self.duplicate.is_duplicate && flags.skip_duplicates {
            return Disposition::DuplicateSkipped;
        }
        if flags.manual_review_required {
            return Disposition::AwaitingReview;
        }
        match self.duplicate.existing_id() {
            Some(id) if self.duplicate.is_duplicate && flags.update_existing => Disposition::Update(id),
            _ => Disposition::Insert,
        }
    }

    /// Human-readable reason stored with non-written ledger entries.
    pub fn reason(&self, disposition: Disposition, quality_threshold: f64) -> Option<String> {
        match disposition {
            Disposition::Filtered => Some(FILTERED_REASON.to_string()),
            Disposition::Invalid => Some(
                self.validation
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Disposition::LowQuality => Some(format!(
                "quality score {} below threshold {}",
                self.validation.quality_score, quality_threshold
            )),
            Disposition::DuplicateSkipped => Some("duplicate of an existing record".to_string()),
            Disposition::AwaitingReview => Some("awaiting manual review".to_string()),
            Disposition::Insert | Disposition::Update(_) => None,
        }
    }
}

/// Inputs shared by every record of a run.
#[derive(Clone, Copy)]
pub struct RecordContext<'a> {
    pub rules: &'a TransformationRuleSet,
    pub filters: &'a [DataFilter],
    pub hooks: &'a CustomRuleRegistry,
    pub validate_data: bool,
}

/// Process one raw row. Never fails: every problem is captured on the
/// returned record.
pub fn process_record(row_id: String, raw: RawRecord, ctx: RecordContext<'_>) -> ProcessedRecord {
    if !passes_filters(ctx.filters, &raw) {
        return ProcessedRecord {
            row_id,
            original: raw,
            transformed: RawRecord::new(),
            entity: None,
            validation: ValidationResult::new(Vec::new(), Vec::new()),
            duplicate: DuplicateInfo::unique(),
            filtered: true,
        };
    }

    let Some(entity) = ctx.rules.mappings.infer_entity(&raw) else {
        let mut validation = ValidationResult::new(
            vec![FieldViolation {
                field: "*".to_string(),
                rule_type: RULE_TYPE_ENTITY.to_string(),
                message: "No mapped source field is present in this row".to_string(),
                value: None,
            }],
            Vec::new(),
        );
        validation.quality_score = 0.0;
        return ProcessedRecord {
            row_id,
            original: raw,
            transformed: RawRecord::new(),
            entity: None,
            validation,
            duplicate: DuplicateInfo::unique(),
            filtered: false,
        };
    };

    let outcome = transform_record(&raw, ctx.rules.mappings.for_entity(entity));
    let mut errors = outcome.errors;
    let mut warnings = Vec::new();
    if ctx.validate_data {
        let checked = evaluate_rules(&ctx.rules.validation_rules, &outcome.data, entity, ctx.hooks);
        errors.extend(checked.errors);
        warnings = checked.warnings;
    }

    let mut validation = ValidationResult::new(errors, warnings);
    validation.quality_score = score_record(&outcome.data, entity, validation.errors.len());

    ProcessedRecord {
        row_id,
        original: raw,
        transformed: outcome.data,
        entity: Some(entity),
        validation,
        duplicate: DuplicateInfo::unique(),
        filtered: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicate_detection::DuplicateOf;
    use crate::field_value::FieldValue;
    use crate::import_job::FilterOp;
    use crate::mapping::MappingSet;
    use crate::transform::{FieldMapping, Transformation};

    fn rules() -> TransformationRuleSet {
        TransformationRuleSet::build(
            MappingSet {
                client_mappings: vec![
                    FieldMapping::new("Name", "name").required(),
                    FieldMapping::new("Email", "email"),
                    FieldMapping::new("Type", "type").with(Transformation::value_map(&[
                        ("Corporation", "company"),
                    ])),
                ],
                document_mappings: vec![
                    FieldMapping::new("Date", "date").with(Transformation::ParseDate { format: None }),
                    FieldMapping::new("Amount", "amount").with(Transformation::ParseCurrency),
                ],
                ..Default::default()
            },
            Vec::new(),
        )
    }

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from_cell(v)))
            .collect()
    }

    fn process(raw: RawRecord, rules: &TransformationRuleSet, filters: &[DataFilter]) -> ProcessedRecord {
        let hooks = CustomRuleRegistry::default();
        process_record(
            "1".into(),
            raw,
            RecordContext { rules, filters, hooks: &hooks, validate_data: true },
        )
    }

    #[test]
    fn complete_client_scores_one() {
        let rules = rules();
        let r = process(row(&[("Name", "Acme"), ("Email", "ops@acme.io"), ("Type", "Corporation")]), &rules, &[]);
        assert_eq!(r.entity, Some(TargetEntity::Client));
        assert!(r.validation.is_valid);
        assert_eq!(r.validation.quality_score, 1.0);
        assert_eq!(r.transformed["type"], FieldValue::String("company".into()));
        assert_eq!(r.disposition(&ImportFlags::default(), 0.95), Disposition::Insert);
    }

    #[test]
    fn missing_email_scores_point_nine_and_is_skipped() {
        let rules = rules();
        let r = process(row(&[("Name", "Zed"), ("Email", ""), ("Type", "Corporation")]), &rules, &[]);
        assert!(r.validation.is_valid);
        assert_eq!(r.validation.quality_score, 0.9);
        let d = r.disposition(&ImportFlags::default(), 0.95);
        assert_eq!(d, Disposition::LowQuality);
        assert_eq!(d.ledger_status(), Some(RecordStatus::Skipped));
        assert_eq!(r.ledger_quality_score(), Some(0.9));
    }

    #[test]
    fn invalid_email_fails_record() {
        let rules = rules();
        let r = process(row(&[("Name", "Zed"), ("Email", "nope"), ("Type", "Corporation")]), &rules, &[]);
        assert!(!r.validation.is_valid);
        assert_eq!(r.validation.quality_score, 0.8);
        let d = r.disposition(&ImportFlags::default(), 0.5);
        assert_eq!(d, Disposition::Invalid);
        assert!(r.reason(d, 0.5).unwrap().contains("email"));
    }

    #[test]
    fn transaction_rows_resolve_to_transactions() {
        let rules = rules();
        let r = process(row(&[("Date", "2023-01-05"), ("Amount", "$10.00")]), &rules, &[]);
        assert_eq!(r.entity, Some(TargetEntity::Transaction));
        assert_eq!(r.transformed["amount"], FieldValue::Number(10.0));
    }

    #[test]
    fn unmatched_row_is_invalid() {
        let rules = rules();
        let r = process(row(&[("Unrelated", "x")]), &rules, &[]);
        assert_eq!(r.entity, None);
        assert_eq!(r.validation.errors[0].rule_type, RULE_TYPE_ENTITY);
        assert_eq!(r.disposition(&ImportFlags::default(), 0.0), Disposition::Invalid);
    }

    #[test]
    fn filtered_rows_are_skipped_with_reason() {
        let rules = rules();
        let filters = [DataFilter { field: "Type".into(), op: FilterOp::Equals, value: Some("Individual".into()) }];
        let r = process(row(&[("Name", "Acme"), ("Type", "Corporation")]), &rules, &filters);
        let d = r.disposition(&ImportFlags::default(), 0.95);
        assert_eq!(d, Disposition::Filtered);
        assert_eq!(r.reason(d, 0.95).as_deref(), Some(FILTERED_REASON));
        assert_eq!(r.ledger_quality_score(), None);
    }

    #[test]
    fn duplicate_handling_follows_flags() {
        let rules = rules();
        let mut r = process(row(&[("Name", "Acme"), ("Email", "ops@acme.io"), ("Type", "Corporation")]), &rules, &[]);
        r.duplicate = DuplicateInfo {
            is_duplicate: true,
            duplicate_of: Some(DuplicateOf::Existing { id: 7 }),
            similarity: 1.0,
        };
        assert_eq!(r.disposition(&ImportFlags::default(), 0.95), Disposition::DuplicateSkipped);

        let update = ImportFlags { skip_duplicates: false, update_existing: true, ..Default::default() };
        assert_eq!(r.disposition(&update, 0.95), Disposition::Update(7));

        let insert = ImportFlags { skip_duplicates: false, ..Default::default() };
        assert_eq!(r.disposition(&insert, 0.95), Disposition::Insert);
    }

    #[test]
    fn manual_review_holds_writes() {
        let rules = rules();
        let r = process(row(&[("Name", "Acme"), ("Email", "ops@acme.io"), ("Type", "Corporation")]), &rules, &[]);
        let flags = ImportFlags { manual_review_required: true, ..Default::default() };
        let d = r.disposition(&flags, 0.95);
        assert_eq!(d, Disposition::AwaitingReview);
        assert_eq!(d.ledger_status(), Some(RecordStatus::Pending));
        assert!(!d.is_write());
    }

    #[test]
    fn validation_can_be_disabled() {
        let rules = rules();
        let hooks = CustomRuleRegistry::default();
        let r = process_record(
            "1".into(),
            row(&[("Name", "Zed"), ("Email", "nope"), ("Type", "Corporation")]),
            RecordContext { rules: &rules, filters: &[], hooks: &hooks, validate_data: false },
        );
        assert!(r.validation.is_valid);
    }
}
