//! Source connectors: one per source format, selected by system type.
//!
//! Every connector yields opaque field-name to value maps. Nothing above
//! this layer assumes field names or types.

pub mod database;
pub mod delimited;
pub mod json_export;
pub mod manual;

use async_trait::async_trait;
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::source_system::{
    validate_source_config, SourceConfig, SourceFormat, SourceSystemType,
};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

pub use database::DatabaseConnector;
pub use delimited::DelimitedFileConnector;
pub use json_export::JsonExportConnector;
pub use manual::ManualEntryConnector;

#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Connector identifier used in logs.
    fn name(&self) -> &'static str;

    /// Check connector-specific requirements beyond the shared config rules.
    fn validate_config(&self, config: &SourceConfig) -> Result<(), PipelineError>;

    /// Pull every raw row from the source.
    async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError>;
}

/// The connector for one job, chosen from its source system type.
pub enum Connector {
    Delimited(DelimitedFileConnector),
    JsonExport(JsonExportConnector),
    Manual(ManualEntryConnector),
    Database(DatabaseConnector),
}

impl Connector {
    pub fn for_system(system: SourceSystemType, config: &PipelineConfig) -> Self {
        match system.source_format() {
            SourceFormat::Delimited => Self::Delimited(DelimitedFileConnector),
            SourceFormat::Json => Self::JsonExport(JsonExportConnector::new(config.http_timeout)),
            SourceFormat::Inline => Self::Manual(ManualEntryConnector),
            SourceFormat::Database => Self::Database(DatabaseConnector::new(config.extraction_timeout)),
        }
    }

    fn inner(&self) -> &dyn SourceConnector {
        match self {
            Self::Delimited(c) => c,
            Self::JsonExport(c) => c,
            Self::Manual(c) => c,
            Self::Database(c) => c,
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner().name()
    }

    /// Shared per-system checks followed by the connector's own.
    pub fn validate(&self, system: SourceSystemType, config: &SourceConfig) -> Result<(), PipelineError> {
        validate_source_config(system, config).map_err(PipelineError::configuration)?;
        self.inner().validate_config(config)
    }

    pub async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError> {
        self.inner().extract(config).await
    }
}

/// The configured location, already checked by [`validate_source_config`].
pub(crate) fn location(config: &SourceConfig) -> Result<&str, PipelineError> {
    config
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::Configuration("source location is required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn systems_select_connectors_by_format() {
        let config = PipelineConfig::default();
        let cases = [
            (SourceSystemType::Csv, "delimited_file"),
            (SourceSystemType::Spreadsheet, "delimited_file"),
            (SourceSystemType::DesktopBookkeeping, "delimited_file"),
            (SourceSystemType::OnlineBookkeeping, "json_export"),
            (SourceSystemType::PaperManual, "manual_entry"),
            (SourceSystemType::CustomDatabase, "custom_database"),
        ];
        for (system, expected) in cases {
            assert_eq!(Connector::for_system(system, &config).name(), expected, "{system}");
        }
    }

    #[test]
    fn missing_location_is_a_configuration_error() {
        let connector = Connector::for_system(SourceSystemType::Csv, &PipelineConfig::default());
        let err = connector
            .validate(SourceSystemType::Csv, &SourceConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
