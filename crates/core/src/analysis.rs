//! Pre-flight data-structure analysis.
//!
//! Read-only and deterministic: the same buffer and system type always
//! produce the same report.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::field_value::{record_to_json, FieldValue, RawRecord};
use crate::hashing::sha256_hex;
use crate::mapping::{mapping_templates, suggest_mappings, SuggestedMapping};
use crate::parsing::{parse_delimited, parse_json_records, ParsedSource};
use crate::source_system::{SourceFormat, SourceSystemType};
use crate::transform::{parse_currency, parse_date};

/// Weight of average completeness in the overall score.
pub const COMPLETENESS_WEIGHT: f64 = 0.7;

/// Weight of uniqueness (`1 - duplicate_rate`) in the overall score.
pub const UNIQUENESS_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub detected_fields: Vec<String>,
    pub suggested_mappings: Vec<SuggestedMapping>,
    pub quality_report: QualityReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_rows: usize,
    /// One entry per detected field, in detection order.
    pub fields: Vec<FieldProfile>,
    /// Fraction of rows that exactly repeat an earlier row.
    pub duplicate_rate: f64,
    pub average_completeness: f64,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProfile {
    pub name: String,
    /// Non-empty value rate in `[0, 1]`.
    pub completeness: f64,
    /// Type guessed from the first non-empty value.
    pub type_guess: String,
}

/// Guess a field type from one sample value.
pub fn guess_type(value: Option<&FieldValue>) -> &'static str {
    match value {
        None => "empty",
        Some(FieldValue::Number(_)) => "number",
        Some(FieldValue::Date(_)) => "date",
        Some(FieldValue::Null) => "empty",
        Some(FieldValue::Unknown(v)) if v.is_boolean() => "boolean",
        Some(FieldValue::Unknown(_)) => "unknown",
        Some(FieldValue::String(s)) => {
            let s = s.trim();
            if parse_date(s, None).is_ok() {
                "date"
            } else if parse_currency(s).is_ok() {
                "number"
            } else if s.contains('@') && !s.contains(' ') {
                "email"
            } else {
                "string"
            }
        }
    }
}

fn parse_buffer(buffer: &[u8], system: SourceSystemType) -> Result<ParsedSource, CoreError> {
    let looks_like_json = buffer
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[' || *b == b'{');
    match system.source_format() {
        SourceFormat::Json => parse_json_records(buffer),
        SourceFormat::Delimited => parse_delimited(buffer, None),
        // Inline and database sources are previewed from a JSON or CSV sample.
        SourceFormat::Inline | SourceFormat::Database if looks_like_json => {
            parse_json_records(buffer)
        }
        SourceFormat::Inline | SourceFormat::Database => parse_delimited(buffer, None),
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Build the per-field and overall data-health report for parsed rows.
pub fn quality_report(headers: &[String], records: &[RawRecord]) -> QualityReport {
    let total = records.len();
    let fields = headers
        .iter()
        .map(|name| {
            let filled = records
                .iter()
                .filter(|r| r.get(name).is_some_and(|v| !v.is_empty()))
                .count();
            let sample = records
                .iter()
                .filter_map(|r| r.get(name))
                .find(|v| !v.is_empty());
            FieldProfile {
                name: name.clone(),
                completeness: if total == 0 { 0.0 } else { round3(filled as f64 / total as f64) },
                type_guess: guess_type(sample).to_string(),
            }
        })
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let duplicates = records
        .iter()
        .filter(|r| !seen.insert(sha256_hex(record_to_json(r).to_string().as_bytes())))
        .count();
    let duplicate_rate = if total == 0 { 0.0 } else { duplicates as f64 / total as f64 };

    let average_completeness = if fields.is_empty() {
        0.0
    } else {
        fields.iter().map(|f| f.completeness).sum::<f64>() / fields.len() as f64
    };

    QualityReport {
        total_rows: total,
        overall_score: round3(
            COMPLETENESS_WEIGHT * average_completeness + UNIQUENESS_WEIGHT * (1.0 - duplicate_rate),
        ),
        duplicate_rate: round3(duplicate_rate),
        average_completeness: round3(average_completeness),
        fields,
    }
}

/// Analyze a source sample: detected fields, mapping suggestions, and a
/// quality report.
pub fn analyze_data_structure(
    buffer: &[u8],
    system: SourceSystemType,
) -> Result<AnalysisReport, CoreError> {
    let parsed = parse_buffer(buffer, system)?;
    let templates = mapping_templates(system);
    let suggested_mappings = suggest_mappings(&parsed.headers, &templates);
    let quality_report = quality_report(&parsed.headers, &parsed.records);

    Ok(AnalysisReport {
        detected_fields: parsed.headers,
        suggested_mappings,
        quality_report,
    })
}
