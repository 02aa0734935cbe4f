//! Delimited text exports: CSV, TSV and spreadsheet or desktop-package
//! exports saved as text.

use async_trait::async_trait;
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::parsing::parse_delimited;
use ledgerlift_core::source_system::SourceConfig;

use super::{location, SourceConnector};
use crate::error::PipelineError;

/// Binary workbook signatures (zip container, legacy OLE compound file).
const WORKBOOK_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"\xD0\xCF\x11\xE0"];

pub struct DelimitedFileConnector;

#[async_trait]
impl SourceConnector for DelimitedFileConnector {
    fn name(&self) -> &'static str {
        "delimited_file"
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<(), PipelineError> {
        let location = location(config)?;
        if location.starts_with("http://") || location.starts_with("https://") {
            return Err(PipelineError::Configuration(
                "delimited sources must be local files".into(),
            ));
        }
        Ok(())
    }

    async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError> {
        let path = location(config)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Source(format!("cannot read '{path}': {e}")))?;
        if WORKBOOK_MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
            return Err(PipelineError::Source(format!(
                "'{path}' is a binary workbook; export it as CSV or TSV"
            )));
        }
        let delimiter = config.delimiter.map(|d| d as u8);
        let parsed = parse_delimited(&bytes, delimiter)
            .map_err(|e| PipelineError::Source(e.to_string()))?;
        Ok(parsed.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: &str) -> SourceConfig {
        SourceConfig {
            location: Some(path.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reads_rows_from_file() {
        let path = std::env::temp_dir().join(format!("ledgerlift-delimited-{}.csv", std::process::id()));
        tokio::fs::write(&path, "Name;Email\nAcme;ops@acme.io\nZed;\n").await.unwrap();
        let rows = DelimitedFileConnector
            .extract(&config(path.to_str().unwrap()))
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.ok();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Name"].as_text().as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let err = DelimitedFileConnector
            .extract(&config("/nonexistent/ledgerlift.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    #[test]
    fn urls_are_rejected() {
        assert!(DelimitedFileConnector
            .validate_config(&config("https://example.com/a.csv"))
            .is_err());
    }
}
