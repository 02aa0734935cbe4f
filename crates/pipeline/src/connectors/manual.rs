//! Rows typed in by an operator from paper or manual records.

use async_trait::async_trait;
use ledgerlift_core::field_value::{record_from_json, RawRecord};
use ledgerlift_core::source_system::SourceConfig;

use super::SourceConnector;
use crate::error::PipelineError;

pub struct ManualEntryConnector;

#[async_trait]
impl SourceConnector for ManualEntryConnector {
    fn name(&self) -> &'static str {
        "manual_entry"
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<(), PipelineError> {
        if config.inline_records.iter().all(|r| r.is_empty()) {
            return Err(PipelineError::Configuration(
                "inline records contain no fields".into(),
            ));
        }
        Ok(())
    }

    async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError> {
        Ok(config
            .inline_records
            .iter()
            .filter(|r| !r.is_empty())
            .filter_map(|r| record_from_json(serde_json::Value::Object(r.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_rows_are_dropped() {
        let config = SourceConfig {
            inline_records: vec![
                serde_json::json!({"Name": "Acme"}).as_object().cloned().unwrap(),
                serde_json::Map::new(),
            ],
            ..Default::default()
        };
        let rows = ManualEntryConnector.extract(&config).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
