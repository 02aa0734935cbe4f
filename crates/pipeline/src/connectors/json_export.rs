//! JSON exports from online bookkeeping services, read from a file or
//! downloaded over HTTP(S).

use std::time::Duration;

use async_trait::async_trait;
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::parsing::parse_json_records;
use ledgerlift_core::source_system::SourceConfig;

use super::{location, SourceConnector};
use crate::error::PipelineError;

pub struct JsonExportConnector {
    timeout: Duration,
}

impl JsonExportConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PipelineError::Source(format!("HTTP client error: {e}")))?;
        let response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Source(format!("cannot fetch '{url}': {e}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Source(format!("cannot read '{url}': {e}")))?;
        Ok(body.to_vec())
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[async_trait]
impl SourceConnector for JsonExportConnector {
    fn name(&self) -> &'static str {
        "json_export"
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<(), PipelineError> {
        let location = location(config)?;
        if location.contains("://") && !is_remote(location) {
            return Err(PipelineError::Configuration(format!(
                "unsupported URL scheme in '{location}'"
            )));
        }
        Ok(())
    }

    async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError> {
        let location = location(config)?;
        let bytes = if is_remote(location) {
            self.download(location).await?
        } else {
            tokio::fs::read(location)
                .await
                .map_err(|e| PipelineError::Source(format!("cannot read '{location}': {e}")))?
        };
        let parsed = parse_json_records(&bytes).map_err(|e| PipelineError::Source(e.to_string()))?;
        tracing::debug!(location, rows = parsed.len(), "Parsed JSON export");
        Ok(parsed.records)
    }
}
