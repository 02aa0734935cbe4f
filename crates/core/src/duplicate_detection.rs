//! Duplicate detection for imported records.
//!
//! Every processed record is reduced to a [`RecordKey`] (name, contact,
//! identifier) and compared against the tenant's existing canonical records
//! and against earlier records of the same run. The comparison metric is a
//! pluggable [`SimilarityStrategy`]; the default [`WeightedKeySimilarity`]
//! combines normalized-Levenshtein name similarity with exact contact
//! equality, and treats matching identifiers (tax id, reference) as
//! conclusive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::TargetEntity;
use crate::error::CoreError;
use crate::field_value::RawRecord;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Threshold constants
// ---------------------------------------------------------------------------

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const MIN_SIMILARITY_THRESHOLD: f64 = 0.50;
pub const MAX_SIMILARITY_THRESHOLD: f64 = 1.00;

/// Legal-form suffixes ignored when comparing names.
const NAME_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "ltd", "limited", "corp", "corporation", "co", "company",
    "plc", "lp", "llp",
];

/// Validate that `threshold` is within `[MIN, MAX]`.
pub fn validate_threshold(threshold: f64) -> Result<(), CoreError> {
    if !(MIN_SIMILARITY_THRESHOLD..=MAX_SIMILARITY_THRESHOLD).contains(&threshold) {
        return Err(CoreError::Validation(format!(
            "Similarity threshold must be between {MIN_SIMILARITY_THRESHOLD} and {MAX_SIMILARITY_THRESHOLD}, got {threshold}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// The fields duplicate detection compares, already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKey {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub identifier: Option<String>,
}

impl RecordKey {
    /// Build a key from raw canonical field values.
    pub fn new(name: Option<&str>, contact: Option<&str>, identifier: Option<&str>) -> Self {
        Self {
            name: name.map(normalize_name).filter(|s| !s.is_empty()),
            contact: contact.map(normalize_contact).filter(|s| !s.is_empty()),
            identifier: identifier.map(normalize_identifier).filter(|s| !s.is_empty()),
        }
    }

    /// Derive the key of a transformed record for `entity`.
    ///
    /// Clients and businesses compare name, email (or phone) and tax id.
    /// Transactions compare description, `date|amount` and reference.
    pub fn from_record(data: &RawRecord, entity: TargetEntity) -> Self {
        let text = |field: &str| data.get(field).and_then(|v| v.as_text());
        match entity {
            TargetEntity::Client | TargetEntity::Business => {
                let contact = text("email").or_else(|| text("phone"));
                Self::new(
                    text("name").as_deref(),
                    contact.as_deref(),
                    text("tax_id").as_deref(),
                )
            }
            TargetEntity::Transaction => {
                let contact = match (text("date"), text("amount")) {
                    (Some(d), Some(a)) => Some(format!("{d}|{a}")),
                    _ => None,
                };
                Self::new(
                    text("description").as_deref(),
                    contact.as_deref(),
                    text("reference").as_deref(),
                )
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.contact.is_none() && self.identifier.is_none()
    }
}

/// Lowercase, strip punctuation and legal-form suffixes.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| NAME_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

fn normalize_contact(contact: &str) -> String {
    let trimmed = contact.trim().to_lowercase();
    if trimmed.contains('@') {
        trimmed
    } else {
        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        // Not phone-like (e.g. a `date|amount` key): keep as-is.
        if digits.len() >= 7 && !trimmed.contains('|') {
            digits
        } else {
            trimmed
        }
    }
}

fn normalize_identifier(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// A similarity metric between two record keys, in `[0, 1]`.
pub trait SimilarityStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn similarity(&self, a: &RecordKey, b: &RecordKey) -> f64;
}

/// Weighted combination of name similarity and contact equality.
///
/// - Equal identifiers score `1.0`.
/// - Otherwise the score is the weighted mean of the components present
///   on both sides: normalized Levenshtein over names, and `1.0`/`0.0`
///   for contact equality.
/// - Conflicting identifiers halve the score.
#[derive(Debug, Clone)]
pub struct WeightedKeySimilarity {
    pub name_weight: f64,
    pub contact_weight: f64,
}

impl Default for WeightedKeySimilarity {
    fn default() -> Self {
        Self {
            name_weight: 0.6,
            contact_weight: 0.4,
        }
    }
}

impl SimilarityStrategy for WeightedKeySimilarity {
    fn name(&self) -> &'static str {
        "weighted_name_contact"
    }

    fn similarity(&self, a: &RecordKey, b: &RecordKey) -> f64 {
        let identifiers_conflict = match (&a.identifier, &b.identifier) {
            (Some(x), Some(y)) if x == y => return 1.0,
            (Some(_), Some(_)) => true,
            _ => false,
        };

        let mut weighted = 0.0;
        let mut weight = 0.0;
        if let (Some(x), Some(y)) = (&a.name, &b.name) {
            weighted += self.name_weight * strsim::normalized_levenshtein(x, y);
            weight += self.name_weight;
        }
        if let (Some(x), Some(y)) = (&a.contact, &b.contact) {
            weighted += self.contact_weight * if x == y { 1.0 } else { 0.0 };
            weight += self.contact_weight;
        }
        if weight == 0.0 {
            return 0.0;
        }

        let score = weighted / weight;
        if identifiers_conflict {
            score * 0.5
        } else {
            score
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// A canonical record the tenant already has.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: DbId,
    pub entity: TargetEntity,
    pub key: RecordKey,
}

/// What a record duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DuplicateOf {
    /// An existing canonical entity.
    Existing { id: DbId },
    /// An earlier row of the same run.
    SourceRow { row_id: String },
}

/// Duplicate flag attached to every processed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateInfo {
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<DuplicateOf>,
    pub similarity: f64,
}

impl DuplicateInfo {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            duplicate_of: None,
            similarity: 0.0,
        }
    }

    /// Id of the existing entity this duplicates, if any.
    pub fn existing_id(&self) -> Option<DbId> {
        match self.duplicate_of {
            Some(DuplicateOf::Existing { id }) if self.is_duplicate => Some(id),
            _ => None,
        }
    }
}

struct Candidate {
    entity: TargetEntity,
    key: RecordKey,
    reference: DuplicateOf,
}

/// Run-scoped duplicate index.
///
/// Seeded with the tenant's existing records, then fed every record of the
/// run in order. Fuzzy name comparison only runs within a block of
/// candidates sharing the first character of the normalized name; exact
/// identifier and contact hits are looked up directly.
pub struct DuplicateDetector {
    strategy: Box<dyn SimilarityStrategy>,
    threshold: f64,
    candidates: Vec<Candidate>,
    by_identifier: HashMap<(TargetEntity, String), usize>,
    by_contact: HashMap<(TargetEntity, String), Vec<usize>>,
    by_name_block: HashMap<(TargetEntity, char), Vec<usize>>,
}

impl DuplicateDetector {
    pub fn new(strategy: Box<dyn SimilarityStrategy>, threshold: f64) -> Self {
        Self {
            strategy,
            threshold,
            candidates: Vec::new(),
            by_identifier: HashMap::new(),
            by_contact: HashMap::new(),
            by_name_block: HashMap::new(),
        }
    }

    /// Detector with [`WeightedKeySimilarity`] and the default threshold.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(WeightedKeySimilarity::default()),
            DEFAULT_SIMILARITY_THRESHOLD,
        )
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Add the tenant's existing canonical records.
    pub fn seed(&mut self, existing: impl IntoIterator<Item = ExistingRecord>) {
        for record in existing {
            self.insert(record.entity, record.key, DuplicateOf::Existing { id: record.id });
        }
    }

    /// Number of indexed candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Check a run record, then index it so later rows can match it.
    pub fn check_and_insert(
        &mut self,
        row_id: &str,
        entity: TargetEntity,
        key: RecordKey,
    ) -> DuplicateInfo {
        let info = self.check(entity, &key);
        if !key.is_empty() {
            self.insert(
                entity,
                key,
                DuplicateOf::SourceRow {
                    row_id: row_id.to_string(),
                },
            );
        }
        info
    }

    /// Best match for `key` among indexed candidates of the same entity.
    pub fn check(&self, entity: TargetEntity, key: &RecordKey) -> DuplicateInfo {
        if key.is_empty() {
            return DuplicateInfo::unique();
        }

        let mut pool: Vec<usize> = Vec::new();
        if let Some(id) = &key.identifier {
            if let Some(&idx) = self.by_identifier.get(&(entity, id.clone())) {
                pool.push(idx);
            }
        }
        if let Some(contact) = &key.contact {
            if let Some(hits) = self.by_contact.get(&(entity, contact.clone())) {
                pool.extend(hits);
            }
        }
        if let Some(block) = key.name.as_deref().and_then(|n| n.chars().next()) {
            if let Some(hits) = self.by_name_block.get(&(entity, block)) {
                pool.extend(hits);
            }
        }
        pool.sort_unstable();
        pool.dedup();

        let mut best: Option<(f64, usize)> = None;
        for idx in pool {
            let candidate = &self.candidates[idx];
            let score = self.strategy.similarity(key, &candidate.key);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, idx));
            }
        }

        match best {
            Some((score, idx)) if score >= self.threshold => DuplicateInfo {
                is_duplicate: true,
                duplicate_of: Some(self.candidates[idx].reference.clone()),
                similarity: score,
            },
            Some((score, _)) => DuplicateInfo {
                is_duplicate: false,
                duplicate_of: None,
                similarity: score,
            },
            None => DuplicateInfo::unique(),
        }
    }

    fn insert(&mut self, entity: TargetEntity, key: RecordKey, reference: DuplicateOf) {
        let idx = self.candidates.len();
        if let Some(id) = &key.identifier {
            self.by_identifier.entry((entity, id.clone())).or_insert(idx);
        }
        if let Some(contact) = &key.contact {
            self.by_contact
                .entry((entity, contact.clone()))
                .or_default()
                .push(idx);
        }
        if let Some(block) = key.name.as_deref().and_then(|n| n.chars().next()) {
            self.by_name_block.entry((entity, block)).or_default().push(idx);
        }
        debug_assert_eq!(self.candidates.len(), idx);
        self.candidates.push(Candidate {
            entity,
            key,
            reference,
        });
    }
}

impl std::fmt::Debug for DuplicateDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateDetector")
            .field("strategy", &self.strategy.name())
            .field("threshold", &self.threshold)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}
