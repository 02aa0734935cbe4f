//! Per-field transformation engine.
//!
//! A [`FieldMapping`] names a source field, a target field and an ordered
//! list of [`Transformation`]s. [`transform_record`] applies every mapping
//! of one target entity to a raw row. A failing transformation becomes a
//! field-level violation on the record; the remaining fields are still
//! processed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::field_value::{FieldValue, RawRecord};
use crate::validation::rules::FieldViolation;

/// Rule type recorded on violations produced by this module.
pub const RULE_TYPE_TRANSFORMATION: &str = "transformation";

/// Rule type recorded when a required mapped field is absent.
pub const RULE_TYPE_REQUIRED_MAPPING: &str = "required";

/// Date formats tried, in order, when no explicit format is configured.
pub const AUTO_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %d, %Y",
];

/// Correspondence between a legacy field and a canonical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl FieldMapping {
    /// A plain rename with no transformations.
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            transformations: Vec::new(),
            required: false,
            default_value: None,
        }
    }

    pub fn with(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Kind of tax identifier to format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdKind {
    /// Employer identification number, `12-3456789`.
    #[default]
    Ein,
    /// Social security number, `123-45-6789`.
    Ssn,
}

/// A single value transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    Trim,
    TitleCase,
    Uppercase,
    Lowercase,
    PhoneFormat {
        #[serde(default = "default_region")]
        region: String,
    },
    TaxIdFormat {
        #[serde(default)]
        kind: TaxIdKind,
    },
    ParseDate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    ParseCurrency,
    ParseNumber,
    ValueMap {
        table: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Reject values missing from `table` instead of passing them through.
        #[serde(default)]
        strict: bool,
    },
    PassThrough,
}

fn default_region() -> String {
    "US".to_string()
}

impl Transformation {
    /// Convenience constructor for a case-insensitive lookup table.
    pub fn value_map(pairs: &[(&str, &str)]) -> Self {
        Self::ValueMap {
            table: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback: None,
            case_insensitive: true,
            strict: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::TitleCase => "title_case",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::PhoneFormat { .. } => "phone_format",
            Self::TaxIdFormat { .. } => "tax_id_format",
            Self::ParseDate { .. } => "parse_date",
            Self::ParseCurrency => "parse_currency",
            Self::ParseNumber => "parse_number",
            Self::ValueMap { .. } => "value_map",
            Self::PassThrough => "pass_through",
        }
    }
}

/// Why a single transformation could not be applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{0}' is not a recognizable date")]
    InvalidDate(String),

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),

    #[error("'{0}' is not a valid tax identifier")]
    InvalidTaxId(String),

    #[error("'{0}' has no entry in the value map")]
    UnmappedValue(String),
}

/// Apply one transformation to one value.
///
/// `Null` passes through every transformation unchanged; presence is
/// enforced by required mappings and validation rules, not here.
pub fn apply_transformation(
    value: &FieldValue,
    rule: &Transformation,
) -> Result<FieldValue, TransformError> {
    if value.is_empty() {
        return Ok(FieldValue::Null);
    }

    match rule {
        Transformation::Trim => map_text(value, |s| s.trim().to_string()),
        Transformation::TitleCase => map_text(value, title_case),
        Transformation::Uppercase => map_text(value, |s| s.to_uppercase()),
        Transformation::Lowercase => map_text(value, |s| s.to_lowercase()),
        Transformation::PhoneFormat { region } => {
            let text = text_of(value)?;
            format_phone(&text, region).map(FieldValue::String)
        }
        Transformation::TaxIdFormat { kind } => {
            let text = text_of(value)?;
            format_tax_id(&text, *kind).map(FieldValue::String)
        }
        Transformation::ParseDate { format } => match value {
            FieldValue::Date(d) => Ok(FieldValue::Date(*d)),
            _ => {
                let text = text_of(value)?;
                parse_date(&text, format.as_deref()).map(FieldValue::Date)
            }
        },
        Transformation::ParseCurrency => match value {
            FieldValue::Number(n) => Ok(FieldValue::Number(*n)),
            _ => {
                let text = text_of(value)?;
                parse_currency(&text).map(FieldValue::Number)
            }
        },
        Transformation::ParseNumber => match value {
            FieldValue::Number(n) => Ok(FieldValue::Number(*n)),
            _ => {
                let text = text_of(value)?;
                let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
                cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(FieldValue::Number)
                    .ok_or(TransformError::InvalidNumber(text))
            }
        },
        Transformation::ValueMap {
            table,
            fallback,
            case_insensitive,
            strict,
        } => {
            let text = text_of(value)?;
            let key = text.trim();
            let hit = if *case_insensitive {
                table
                    .iter()
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            } else {
                table.get(key)
            };
            match (hit, fallback) {
                (Some(mapped), _) => Ok(FieldValue::String(mapped.clone())),
                (None, Some(fb)) => Ok(FieldValue::String(fb.clone())),
                (None, None) if *strict => Err(TransformError::UnmappedValue(text)),
                (None, None) => Ok(value.clone()),
            }
        }
        Transformation::PassThrough => Ok(value.clone()),
    }
}

fn text_of(value: &FieldValue) -> Result<String, TransformError> {
    match value {
        FieldValue::String(s) => Ok(s.clone()),
        FieldValue::Number(_) | FieldValue::Date(_) => {
            value.as_text().ok_or(TransformError::TypeMismatch {
                expected: "string",
                found: value.type_name(),
            })
        }
        other => Err(TransformError::TypeMismatch {
            expected: "string",
            found: other.type_name(),
        }),
    }
}

fn map_text(value: &FieldValue, f: impl Fn(&str) -> String) -> Result<FieldValue, TransformError> {
    match value {
        FieldValue::String(s) => Ok(FieldValue::String(f(s))),
        // Numbers and dates carry no casing or padding.
        FieldValue::Number(_) | FieldValue::Date(_) => Ok(value.clone()),
        other => Err(TransformError::TypeMismatch {
            expected: "string",
            found: other.type_name(),
        }),
    }
}

/// Capitalize the first letter of every whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a phone number for `region`.
///
/// `US`/`CA` numbers become `(555) 123-4567`; other regions become
/// `+<digits>`.
pub fn format_phone(raw: &str, region: &str) -> Result<String, TransformError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match region.to_ascii_uppercase().as_str() {
        "US" | "CA" => {
            let local = match digits.len() {
                10 => digits.as_str(),
                11 if digits.starts_with('1') => &digits[1..],
                _ => return Err(TransformError::InvalidPhone(raw.to_string())),
            };
            Ok(format!(
                "({}) {}-{}",
                &local[0..3],
                &local[3..6],
                &local[6..10]
            ))
        }
        _ => {
            if (7..=15).contains(&digits.len()) {
                Ok(format!("+{digits}"))
            } else {
                Err(TransformError::InvalidPhone(raw.to_string()))
            }
        }
    }
}

/// Format a nine-digit tax identifier.
pub fn format_tax_id(raw: &str, kind: TaxIdKind) -> Result<String, TransformError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 9 {
        return Err(TransformError::InvalidTaxId(raw.to_string()));
    }
    Ok(match kind {
        TaxIdKind::Ein => format!("{}-{}", &digits[0..2], &digits[2..]),
        TaxIdKind::Ssn => format!("{}-{}-{}", &digits[0..3], &digits[3..5], &digits[5..]),
    })
}

/// Parse a date with an explicit format, or try [`AUTO_DATE_FORMATS`].
pub fn parse_date(raw: &str, format: Option<&str>) -> Result<NaiveDate, TransformError> {
    let text = raw.trim();
    if let Some(fmt) = format {
        return NaiveDate::parse_from_str(text, fmt)
            .map_err(|_| TransformError::InvalidDate(raw.to_string()));
    }
    AUTO_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .ok_or_else(|| TransformError::InvalidDate(raw.to_string()))
}

/// Parse a currency amount such as `$1,234.50`, `(99.00)` or `-12 USD`.
pub fn parse_currency(raw: &str) -> Result<f64, TransformError> {
    let mut text = raw.trim().to_string();
    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') {
        negative = true;
        text = text[1..text.len() - 1].to_string();
    }
    if text.ends_with('-') {
        negative = true;
        text.pop();
    }
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || !text.chars().any(|c| c.is_ascii_digit()) {
        return Err(TransformError::InvalidNumber(raw.to_string()));
    }
    // Anything other than symbols, separators, spaces and a currency code is noise.
    let residue = text
        .chars()
        .filter(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | ',' | ' ' | '$' | '€' | '£' | '¥')))
        .collect::<String>();
    if !residue.is_empty() && !(residue.len() == 3 && residue.chars().all(|c| c.is_ascii_uppercase())) {
        return Err(TransformError::InvalidNumber(raw.to_string()));
    }
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| TransformError::InvalidNumber(raw.to_string()))?;
    Ok(if negative { -amount.abs() } else { amount })
}

/// Result of applying a set of mappings to one raw row.
#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    pub data: RawRecord,
    pub errors: Vec<FieldViolation>,
}

impl TransformOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Look up a source field, exactly first and then ignoring case and padding.
pub fn lookup_source<'a>(raw: &'a RawRecord, source_field: &str) -> Option<&'a FieldValue> {
    raw.get(source_field).or_else(|| {
        let wanted = source_field.trim();
        raw.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v)
    })
}

/// Apply every mapping to `raw`, collecting field-level errors.
pub fn transform_record(raw: &RawRecord, mappings: &[FieldMapping]) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    for mapping in mappings {
        let source = lookup_source(raw, &mapping.source_field)
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| mapping.default_value.as_deref().map(FieldValue::from_cell));

        let Some(mut value) = source else {
            if mapping.required {
                outcome.errors.push(FieldViolation {
                    field: mapping.target_field.clone(),
                    rule_type: RULE_TYPE_REQUIRED_MAPPING.to_string(),
                    message: format!(
                        "Required source field '{}' is missing",
                        mapping.source_field
                    ),
                    value: None,
                });
            }
            continue;
        };

        let mut failed = false;
        for rule in &mapping.transformations {
            match apply_transformation(&value, rule) {
                Ok(next) => value = next,
                Err(e) => {
                    outcome.errors.push(FieldViolation {
                        field: mapping.target_field.clone(),
                        rule_type: RULE_TYPE_TRANSFORMATION.to_string(),
                        message: format!("{} failed: {e}", rule.name()),
                        value: Some(value.to_json()),
                    });
                    failed = true;
                    break;
                }
            }
        }

        if !failed && !value.is_empty() {
            outcome.data.insert(mapping.target_field.clone(), value);
        }
    }

    outcome
}
