//! Tagged representation of legacy field values.
//!
//! Legacy rows arrive as untyped key/value maps. Every value is carried as a
//! [`FieldValue`] so that transformation and validation code has to match on
//! the actual shape instead of guessing.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// One legacy row (or one transformed record): field name to value.
pub type RawRecord = BTreeMap<String, FieldValue>;

/// A single field value extracted from, or derived for, a legacy row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    String(String),
    Number(f64),
    Date(NaiveDate),
    /// Anything the connectors could not classify (booleans, nested JSON).
    Unknown(serde_json::Value),
}

impl FieldValue {
    /// Build a value from a delimited-file cell. Empty cells become `Null`.
    pub fn from_cell(cell: &str) -> Self {
        if cell.trim().is_empty() {
            Self::Null
        } else {
            Self::String(cell.to_string())
        }
    }

    /// Build a value from a JSON value produced by an API or database export.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(s) if s.trim().is_empty() => Self::Null,
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Unknown(serde_json::Value::Number(n)),
            },
            other => Self::Unknown(other),
        }
    }

    /// Convert to JSON for JSONB persistence. Dates use ISO-8601.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Unknown(v) => v.clone(),
        }
    }

    /// True for `Null`, blank strings, and JSON null.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            Self::Unknown(v) => v.is_null(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }

    /// Textual rendering used for matching, similarity and string transforms.
    ///
    /// Returns `None` for empty values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(s) if s.trim().is_empty() => None,
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::Unknown(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Unknown(v) if v.is_null() => None,
            Self::Unknown(v) => Some(v.to_string()),
        }
    }

    /// Short name of the variant, used in error messages and reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Render integral floats without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Convert a record into a JSON object for persistence.
pub fn record_to_json(record: &RawRecord) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = record
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(map)
}

/// Build a record from a JSON object. Non-object input yields `None`.
pub fn record_from_json(value: serde_json::Value) -> Option<RawRecord> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(k, v)| (k, FieldValue::from_json(v)))
                .collect(),
        ),
        _ => None,
    }
}
