//! Ad-hoc legacy databases reachable over the Postgres protocol.

use std::time::Duration;

use async_trait::async_trait;
use ledgerlift_core::field_value::{record_from_json, RawRecord};
use ledgerlift_core::source_system::{validate_table_identifier, SourceConfig};
use sqlx::postgres::PgPoolOptions;

use super::SourceConnector;
use crate::error::PipelineError;

pub struct DatabaseConnector {
    connect_timeout: Duration,
}

impl DatabaseConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

fn table(config: &SourceConfig) -> Result<&str, PipelineError> {
    let table = config
        .table
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| PipelineError::Configuration("table is required".into()))?;
    validate_table_identifier(table).map_err(PipelineError::configuration)?;
    Ok(table)
}

#[async_trait]
impl SourceConnector for DatabaseConnector {
    fn name(&self) -> &'static str {
        "custom_database"
    }

    fn validate_config(&self, config: &SourceConfig) -> Result<(), PipelineError> {
        table(config)?;
        let url = config.connection_url.as_deref().unwrap_or_default();
        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(PipelineError::Configuration(
                "connection_url must be a postgres:// URL".into(),
            ));
        }
        Ok(())
    }

    async fn extract(&self, config: &SourceConfig) -> Result<Vec<RawRecord>, PipelineError> {
        let table = table(config)?;
        let url = config
            .connection_url
            .as_deref()
            .ok_or_else(|| PipelineError::Configuration("connection_url is required".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
            .connect(url)
            .await
            .map_err(|e| PipelineError::Source(format!("cannot connect to source database: {e}")))?;

        // The identifier was validated above; it cannot be bound as a parameter.
        let query = format!("SELECT row_to_json(src)::jsonb FROM {table} src");
        let rows: Result<Vec<(serde_json::Value,)>, sqlx::Error> =
            sqlx::query_as(&query).fetch_all(&pool).await;
        pool.close().await;

        let rows = rows.map_err(|e| PipelineError::Source(format!("cannot read {table}: {e}")))?;
        Ok(rows.into_iter().filter_map(|(row,)| record_from_json(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, table: &str) -> SourceConfig {
        SourceConfig {
            connection_url: Some(url.to_string()),
            table: Some(table.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn requires_postgres_url_and_plain_table() {
        let c = DatabaseConnector::new(Duration::from_secs(1));
        assert!(c.validate_config(&config("postgres://u@h/db", "legacy.customers")).is_ok());
        assert!(c.validate_config(&config("mysql://u@h/db", "customers")).is_err());
        assert!(c.validate_config(&config("postgres://u@h/db", "customers; DROP TABLE x")).is_err());
    }
}
