//! Parsers for legacy export payloads: delimited text and JSON record sets.

use crate::error::CoreError;
use crate::field_value::{record_from_json, FieldValue, RawRecord};

/// Delimiters considered when sniffing a delimited export.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Rows and header order of a parsed source.
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    /// Field names in first-seen order.
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl ParsedSource {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Guess the delimiter from the header line.
///
/// Picks the candidate that occurs most often outside quotes; commas win
/// ties and the empty case.
pub fn sniff_delimiter(buffer: &[u8]) -> u8 {
    let header = buffer.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let mut best = (0usize, b',');
    for candidate in CANDIDATE_DELIMITERS {
        let mut in_quotes = false;
        let count = header
            .iter()
            .filter(|b| {
                if **b == b'"' {
                    in_quotes = !in_quotes;
                }
                !in_quotes && **b == candidate
            })
            .count();
        if count > best.0 {
            best = (count, candidate);
        }
    }
    best.1
}

/// Parse a delimited export with a header row.
///
/// Short rows are padded with nulls and extra cells are dropped. Blank
/// header names become `column_<n>`. Rows with every cell empty are skipped.
pub fn parse_delimited(buffer: &[u8], delimiter: Option<u8>) -> Result<ParsedSource, CoreError> {
    let buffer = buffer.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(buffer);
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(buffer));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(buffer);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::Parse(format!("Failed to read header row: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| CoreError::Parse(format!("Row {}: {e}", line + 2)))?;
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let record: RawRecord = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), FieldValue::from_cell(row.get(i).unwrap_or(""))))
            .collect();
        records.push(record);
    }

    Ok(ParsedSource { headers, records })
}

/// Parse a JSON export: a top-level array of objects, or an object holding
/// the array under `records`, `data`, or `items`.
pub fn parse_json_records(buffer: &[u8]) -> Result<ParsedSource, CoreError> {
    let value: serde_json::Value = serde_json::from_slice(buffer)
        .map_err(|e| CoreError::Parse(format!("Invalid JSON export: {e}")))?;
    json_records(value)
}

/// Build a [`ParsedSource`] from an already decoded JSON payload.
pub fn json_records(value: serde_json::Value) -> Result<ParsedSource, CoreError> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => {
            let key = ["records", "data", "items"]
                .into_iter()
                .find(|k| map.get(*k).is_some_and(serde_json::Value::is_array));
            match key.and_then(|k| map.remove(k)) {
                Some(serde_json::Value::Array(items)) => items,
                _ => {
                    return Err(CoreError::Parse(
                        "JSON export must be an array of records".to_string(),
                    ))
                }
            }
        }
        _ => {
            return Err(CoreError::Parse(
                "JSON export must be an array of records".to_string(),
            ))
        }
    };

    let mut headers: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        // Headers are the union of keys across records.
        if let serde_json::Value::Object(map) = &item {
            for key in map.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
        let record = record_from_json(item)
            .ok_or_else(|| CoreError::Parse(format!("Record {} is not an object", i + 1)))?;
        records.push(record);
    }

    Ok(ParsedSource { headers, records })
}
