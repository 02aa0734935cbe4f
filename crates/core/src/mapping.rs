//! Field-mapping sets, curated templates per legacy system, and mapping
//! suggestions for detected source fields.

use serde::{Deserialize, Serialize};

use crate::entity::TargetEntity;
use crate::error::CoreError;
use crate::field_value::RawRecord;
use crate::source_system::SourceSystemType;
use crate::transform::{lookup_source, FieldMapping, TaxIdKind, Transformation};

/// Maximum number of mappings per target entity.
pub const MAX_MAPPINGS_PER_ENTITY: usize = 200;

/// Minimum score for a suggestion to be offered.
pub const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Mappings for each target entity of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSet {
    #[serde(default)]
    pub client_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub business_mappings: Vec<FieldMapping>,
    /// Document mappings load into transactions.
    #[serde(default)]
    pub document_mappings: Vec<FieldMapping>,
}

impl MappingSet {
    pub fn for_entity(&self, entity: TargetEntity) -> &[FieldMapping] {
        match entity {
            TargetEntity::Client => &self.client_mappings,
            TargetEntity::Business => &self.business_mappings,
            TargetEntity::Transaction => &self.document_mappings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_mappings.is_empty()
            && self.business_mappings.is_empty()
            && self.document_mappings.is_empty()
    }

    /// Iterate `(entity, mapping)` pairs in inference order.
    pub fn iter(&self) -> impl Iterator<Item = (TargetEntity, &FieldMapping)> {
        TargetEntity::ORDERED
            .into_iter()
            .flat_map(move |e| self.for_entity(e).iter().map(move |m| (e, m)))
    }

    /// Pick the entity whose mapped source fields are most present in `raw`.
    ///
    /// Ties resolve client, then business, then transaction. Returns `None`
    /// when no mapped field is present at all.
    pub fn infer_entity(&self, raw: &RawRecord) -> Option<TargetEntity> {
        let mut best: Option<(usize, TargetEntity)> = None;
        for entity in TargetEntity::ORDERED {
            let hits = self
                .for_entity(entity)
                .iter()
                .filter(|m| lookup_source(raw, &m.source_field).is_some_and(|v| !v.is_empty()))
                .count();
            if hits > 0 && best.map_or(true, |(h, _)| hits > h) {
                best = Some((hits, entity));
            }
        }
        best.map(|(_, e)| e)
    }

    /// Structural checks on operator-supplied mappings.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation(
                "At least one field mapping is required".to_string(),
            ));
        }
        for entity in TargetEntity::ORDERED {
            let mappings = self.for_entity(entity);
            if mappings.len() > MAX_MAPPINGS_PER_ENTITY {
                return Err(CoreError::Validation(format!(
                    "{entity} mappings exceed maximum of {MAX_MAPPINGS_PER_ENTITY}"
                )));
            }
            let mut targets = std::collections::HashSet::new();
            for (i, m) in mappings.iter().enumerate() {
                if m.source_field.trim().is_empty() || m.target_field.trim().is_empty() {
                    return Err(CoreError::Validation(format!(
                        "{entity} mapping at index {i} must name both source and target fields"
                    )));
                }
                if !targets.insert(m.target_field.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "{entity} mappings target '{}' more than once",
                        m.target_field
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

fn entity_type_map() -> Transformation {
    Transformation::value_map(&[
        ("Corporation", "company"),
        ("Corp", "company"),
        ("Company", "company"),
        ("S Corporation", "s_corporation"),
        ("LLC", "llc"),
        ("Partnership", "partnership"),
        ("Sole Proprietor", "sole_proprietorship"),
        ("Sole Proprietorship", "sole_proprietorship"),
        ("Individual", "individual"),
        ("Nonprofit", "nonprofit"),
        ("Trust", "trust"),
    ])
}

fn name(source: &str) -> FieldMapping {
    FieldMapping::new(source, "name")
        .with(Transformation::Trim)
        .required()
}

fn email(source: &str) -> FieldMapping {
    FieldMapping::new(source, "email")
        .with(Transformation::Trim)
        .with(Transformation::Lowercase)
}

fn phone(source: &str) -> FieldMapping {
    FieldMapping::new(source, "phone").with(Transformation::PhoneFormat {
        region: "US".to_string(),
    })
}

fn entity_type(source: &str) -> FieldMapping {
    FieldMapping::new(source, "type").with(entity_type_map())
}

fn tax_id(source: &str) -> FieldMapping {
    FieldMapping::new(source, "tax_id").with(Transformation::TaxIdFormat {
        kind: TaxIdKind::Ein,
    })
}

fn text(source: &str, target: &str) -> FieldMapping {
    FieldMapping::new(source, target).with(Transformation::Trim)
}

fn date(source: &str, format: Option<&str>) -> FieldMapping {
    FieldMapping::new(source, "date")
        .with(Transformation::ParseDate {
            format: format.map(str::to_string),
        })
        .required()
}

fn amount(source: &str) -> FieldMapping {
    FieldMapping::new(source, "amount")
        .with(Transformation::ParseCurrency)
        .required()
}

/// Curated default mappings for a legacy system.
pub fn mapping_templates(system: SourceSystemType) -> MappingSet {
    match system {
        SourceSystemType::DesktopBookkeeping => MappingSet {
            client_mappings: vec![
                name("Customer").with(Transformation::TitleCase),
                entity_type("Customer_Type"),
                email("Main Email"),
                phone("Main Phone"),
                tax_id("Tax ID"),
                text("Bill to 1", "address"),
            ],
            business_mappings: vec![
                name("Company Name"),
                entity_type("Business Type"),
                tax_id("EIN"),
                email("Company Email"),
                text("Industry", "industry"),
            ],
            document_mappings: vec![
                date("Date", Some("%m/%d/%Y")),
                amount("Amount"),
                text("Memo", "description"),
                text("Num", "reference"),
                text("Account", "category"),
                text("Name", "counterparty"),
            ],
        },
        SourceSystemType::OnlineBookkeeping => MappingSet {
            client_mappings: vec![
                name("DisplayName"),
                entity_type("CustomerType"),
                email("PrimaryEmailAddr"),
                phone("PrimaryPhone"),
                tax_id("TaxIdentifier"),
                text("BillAddr", "address"),
            ],
            business_mappings: vec![
                name("CompanyName"),
                entity_type("LegalStructure"),
                tax_id("EmployerId"),
                email("CompanyEmail"),
            ],
            document_mappings: vec![
                date("TxnDate", Some("%Y-%m-%d")),
                amount("TotalAmt"),
                text("PrivateNote", "description"),
                text("DocNumber", "reference"),
                text("AccountRef", "category"),
            ],
        },
        SourceSystemType::Spreadsheet | SourceSystemType::Csv | SourceSystemType::PaperManual => {
            MappingSet {
                client_mappings: vec![
                    name("Name"),
                    entity_type("Type"),
                    email("Email"),
                    phone("Phone"),
                    tax_id("Tax ID"),
                    text("Address", "address"),
                ],
                business_mappings: vec![
                    name("Business Name"),
                    entity_type("Entity Type"),
                    tax_id("EIN"),
                    email("Business Email"),
                    text("Industry", "industry"),
                ],
                document_mappings: vec![
                    date("Date", None),
                    amount("Amount"),
                    text("Description", "description"),
                    text("Reference", "reference"),
                    text("Category", "category"),
                ],
            }
        }
        SourceSystemType::OtherAccountingPackage => MappingSet {
            client_mappings: vec![
                name("Account Name"),
                entity_type("Account Type"),
                email("Contact Email"),
                phone("Telephone"),
                tax_id("VAT/Tax Number"),
                text("Street", "address"),
            ],
            business_mappings: vec![
                name("Trading Name"),
                entity_type("Company Type"),
                tax_id("Registration Number"),
            ],
            document_mappings: vec![
                date("Transaction Date", None),
                amount("Net Amount"),
                text("Details", "description"),
                text("Ref", "reference"),
                text("Nominal Code", "category"),
            ],
        },
        SourceSystemType::CustomDatabase => MappingSet {
            client_mappings: vec![
                name("customer_name"),
                entity_type("customer_type"),
                email("email"),
                phone("phone"),
                tax_id("tax_id"),
                text("address", "address"),
            ],
            business_mappings: vec![
                name("business_name"),
                entity_type("entity_type"),
                tax_id("ein"),
            ],
            document_mappings: vec![
                date("txn_date", None),
                amount("amount"),
                text("memo", "description"),
                text("ref_no", "reference"),
            ],
        },
    }
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// A mapping suggested for a detected source field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedMapping {
    pub detected_field: String,
    pub entity: TargetEntity,
    pub mapping: FieldMapping,
    pub score: f64,
}

fn tokens(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        // Split camelCase: "DisplayName" -> display, name.
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Score how well a detected field name matches a template source field.
///
/// Exact token equality scores `1.0`; containment of one joined name in
/// the other scores by length ratio in `[0.8, 1.0)`; otherwise the better
/// of token overlap (Jaccard) and normalized Levenshtein.
pub fn match_score(detected: &str, template_field: &str) -> f64 {
    let a = tokens(detected);
    let b = tokens(template_field);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let ja = a.concat();
    let jb = b.concat();
    if ja == jb {
        return 1.0;
    }
    if ja.contains(&jb) || jb.contains(&ja) {
        let (short, long) = if ja.len() < jb.len() { (&ja, &jb) } else { (&jb, &ja) };
        return 0.8 + 0.2 * (short.len() as f64 / long.len() as f64) * 0.99;
    }
    let shared = a.iter().filter(|t| b.contains(t)).count();
    let union = a.len() + b.len() - shared;
    let jaccard = shared as f64 / union as f64;
    jaccard.max(strsim::normalized_levenshtein(&ja, &jb) * 0.9)
}

/// Suggest the best template mapping for one detected field.
///
/// The returned mapping has its source field rewritten to `detected`.
/// Ties go to the earliest template entry.
pub fn suggest_mapping(detected: &str, templates: &[FieldMapping]) -> Option<FieldMapping> {
    best_match(detected, templates).map(|(_, m)| m)
}

fn best_match(detected: &str, templates: &[FieldMapping]) -> Option<(f64, FieldMapping)> {
    let mut best: Option<(f64, &FieldMapping)> = None;
    for template in templates {
        let score = match_score(detected, &template.source_field)
            .max(match_score(detected, &template.target_field) * 0.95);
        if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, template));
        }
    }
    best.map(|(score, template)| {
        let mut mapping = template.clone();
        mapping.source_field = detected.to_string();
        (score, mapping)
    })
}

/// Suggest mappings for every detected field across all entities.
///
/// Each detected field gets at most one suggestion (its best across
/// entities), and each target field of an entity is suggested at most once
/// (to the highest-scoring detected field).
pub fn suggest_mappings(detected_fields: &[String], templates: &MappingSet) -> Vec<SuggestedMapping> {
    let mut suggestions: Vec<SuggestedMapping> = Vec::new();
    for field in detected_fields {
        let mut best: Option<SuggestedMapping> = None;
        for entity in TargetEntity::ORDERED {
            if let Some((score, mapping)) = best_match(field, templates.for_entity(entity)) {
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(SuggestedMapping {
                        detected_field: field.clone(),
                        entity,
                        mapping,
                        score,
                    });
                }
            }
        }
        let Some(candidate) = best else { continue };
        match suggestions.iter().position(|s| {
            s.entity == candidate.entity && s.mapping.target_field == candidate.mapping.target_field
        }) {
            Some(i) if suggestions[i].score >= candidate.score => {}
            Some(i) => suggestions[i] = candidate,
            None => suggestions.push(candidate),
        }
    }
    suggestions
}
