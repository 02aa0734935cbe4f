//! Legacy source-system types and the configuration each one requires.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The legacy system a migration reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystemType {
    DesktopBookkeeping,
    OnlineBookkeeping,
    Spreadsheet,
    Csv,
    PaperManual,
    OtherAccountingPackage,
    CustomDatabase,
}

impl SourceSystemType {
    /// Return the type name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DesktopBookkeeping => "desktop_bookkeeping",
            Self::OnlineBookkeeping => "online_bookkeeping",
            Self::Spreadsheet => "spreadsheet",
            Self::Csv => "csv",
            Self::PaperManual => "paper_manual",
            Self::OtherAccountingPackage => "other_accounting_package",
            Self::CustomDatabase => "custom_database",
        }
    }

    /// Parse a type name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "desktop_bookkeeping" => Some(Self::DesktopBookkeeping),
            "online_bookkeeping" => Some(Self::OnlineBookkeeping),
            "spreadsheet" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            "paper_manual" => Some(Self::PaperManual),
            "other_accounting_package" => Some(Self::OtherAccountingPackage),
            "custom_database" => Some(Self::CustomDatabase),
            _ => None,
        }
    }

    /// All valid type names.
    pub const ALL: &'static [&'static str] = &[
        "desktop_bookkeeping",
        "online_bookkeeping",
        "spreadsheet",
        "csv",
        "paper_manual",
        "other_accounting_package",
        "custom_database",
    ];

    /// How raw bytes from this system are laid out.
    pub fn source_format(&self) -> SourceFormat {
        match self {
            Self::DesktopBookkeeping
            | Self::Spreadsheet
            | Self::Csv
            | Self::OtherAccountingPackage => SourceFormat::Delimited,
            Self::OnlineBookkeeping => SourceFormat::Json,
            Self::PaperManual => SourceFormat::Inline,
            Self::CustomDatabase => SourceFormat::Database,
        }
    }
}

impl std::fmt::Display for SourceSystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical layout of a legacy source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// CSV/TSV-style exports with a header row.
    Delimited,
    /// JSON array of objects (or `{"records": [...]}`).
    Json,
    /// Rows typed in by an operator and stored with the job.
    Inline,
    /// A table in an external relational database.
    Database,
}

/// Where and how to reach a legacy source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// File path or URL for file- and export-based sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Connection string for `custom_database` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_url: Option<String>,
    /// Table (optionally schema-qualified) for `custom_database` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Operator-entered rows for `paper_manual` sources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline_records: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Explicit delimiter override for delimited files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

/// Maximum length of a source location.
pub const MAX_LOCATION_LENGTH: usize = 4096;

/// Validate that `config` carries the fields `system` needs.
///
/// Runs before any extraction is attempted.
pub fn validate_source_config(
    system: SourceSystemType,
    config: &SourceConfig,
) -> Result<(), CoreError> {
    match system.source_format() {
        SourceFormat::Delimited | SourceFormat::Json => {
            let location = non_blank(config.location.as_deref()).ok_or_else(|| {
                CoreError::Validation(format!(
                    "Source system '{system}' requires a source location"
                ))
            })?;
            if location.len() > MAX_LOCATION_LENGTH {
                return Err(CoreError::Validation(format!(
                    "Source location exceeds maximum length of {MAX_LOCATION_LENGTH} characters"
                )));
            }
            if location.contains('\0') {
                return Err(CoreError::Validation(
                    "Source location contains null bytes".to_string(),
                ));
            }
            if let Some(d) = config.delimiter {
                if !d.is_ascii() || d.is_ascii_alphanumeric() || d == '"' {
                    return Err(CoreError::Validation(format!(
                        "Unsupported delimiter '{d}'"
                    )));
                }
            }
        }
        SourceFormat::Inline => {
            if config.inline_records.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Source system '{system}' requires at least one inline record"
                )));
            }
        }
        SourceFormat::Database => {
            if non_blank(config.connection_url.as_deref()).is_none() {
                return Err(CoreError::Validation(format!(
                    "Source system '{system}' requires a connection_url"
                )));
            }
            let table = non_blank(config.table.as_deref()).ok_or_else(|| {
                CoreError::Validation(format!("Source system '{system}' requires a table"))
            })?;
            validate_table_identifier(table)?;
        }
    }
    Ok(())
}

/// Accept `table` or `schema.table` made of plain SQL identifiers.
pub fn validate_table_identifier(table: &str) -> Result<(), CoreError> {
    let parts: Vec<&str> = table.split('.').collect();
    let valid = parts.len() <= 2
        && parts.iter().all(|p| {
            let mut chars = p.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid table identifier '{table}'"
        )))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn type_round_trip() {
        for s in SourceSystemType::ALL {
            let t = SourceSystemType::from_str(s).unwrap();
            assert_eq!(t.as_str(), *s);
        }
    }

    #[test]
    fn unknown_type_returns_none() {
        assert!(SourceSystemType::from_str("abacus").is_none());
    }

    #[test]
    fn file_source_requires_location() {
        let result = validate_source_config(SourceSystemType::Csv, &SourceConfig::default());
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("location"));
    }

    #[test]
    fn file_source_with_location_accepted() {
        let config = SourceConfig {
            location: Some("/staging/tenant-4/export.csv".into()),
            ..Default::default()
        };
        assert!(validate_source_config(SourceSystemType::Spreadsheet, &config).is_ok());
    }

    #[test]
    fn alphanumeric_delimiter_rejected() {
        let config = SourceConfig {
            location: Some("/staging/export.csv".into()),
            delimiter: Some('a'),
            ..Default::default()
        };
        assert!(validate_source_config(SourceSystemType::Csv, &config).is_err());
    }

    #[test]
    fn manual_source_requires_inline_records() {
        assert!(
            validate_source_config(SourceSystemType::PaperManual, &SourceConfig::default())
                .is_err()
        );
    }

    #[test]
    fn database_source_requires_connection_and_table() {
        let mut config = SourceConfig {
            connection_url: Some("postgres://legacy/books".into()),
            ..Default::default()
        };
        assert!(validate_source_config(SourceSystemType::CustomDatabase, &config).is_err());
        config.table = Some("ledger.customers".into());
        assert!(validate_source_config(SourceSystemType::CustomDatabase, &config).is_ok());
    }

    #[test]
    fn table_identifier_rejects_injection() {
        assert!(validate_table_identifier("customers; DROP TABLE x").is_err());
        assert!(validate_table_identifier("a.b.c").is_err());
        assert!(validate_table_identifier("_legacy.cust_01").is_ok());
    }
}
