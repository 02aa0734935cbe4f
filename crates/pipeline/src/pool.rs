//! Bounded worker pool for per-record transform, validate and score work.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ledgerlift_core::field_value::RawRecord;
use ledgerlift_core::import_job::{DataFilter, TransformationRuleSet};
use ledgerlift_core::processing::{process_record, ProcessedRecord, RecordContext};
use ledgerlift_core::validation::hooks::CustomRuleRegistry;

use crate::error::PipelineError;

/// Per-run inputs shared by every worker.
pub struct RunContext {
    pub rules: TransformationRuleSet,
    pub filters: Vec<DataFilter>,
    pub hooks: Arc<CustomRuleRegistry>,
    pub validate_data: bool,
}

impl RunContext {
    pub fn record_context(&self) -> RecordContext<'_> {
        RecordContext {
            rules: &self.rules,
            filters: &self.filters,
            hooks: &self.hooks,
            validate_data: self.validate_data,
        }
    }
}

/// Process one batch across at most `workers` blocking tasks. Output order
/// matches input order.
pub async fn process_batch(
    ctx: &Arc<RunContext>,
    rows: Vec<(String, RawRecord)>,
    workers: usize,
) -> Result<Vec<ProcessedRecord>, PipelineError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.max(1);
    let chunk_size = rows.len().div_ceil(workers);

    let mut chunks = Vec::with_capacity(workers);
    let mut iter = rows.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect::<Vec<_>>());
    }

    let results = stream::iter(chunks.into_iter().map(|chunk| {
        let ctx = Arc::clone(ctx);
        tokio::task::spawn_blocking(move || {
            chunk
                .into_iter()
                .map(|(row_id, raw)| process_record(row_id, raw, ctx.record_context()))
                .collect::<Vec<_>>()
        })
    }))
    .buffered(workers)
    .collect::<Vec<_>>()
    .await;

    let mut processed = Vec::new();
    for result in results {
        processed.extend(result.map_err(|e| PipelineError::Worker(e.to_string()))?);
    }
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerlift_core::field_value::FieldValue;
    use ledgerlift_core::mapping::MappingSet;
    use ledgerlift_core::transform::FieldMapping;

    fn ctx() -> Arc<RunContext> {
        let mappings = MappingSet {
            client_mappings: vec![FieldMapping::new("Name", "name").required()],
            ..Default::default()
        };
        Arc::new(RunContext {
            rules: TransformationRuleSet::build(mappings, Vec::new()),
            filters: Vec::new(),
            hooks: Arc::new(CustomRuleRegistry::default()),
            validate_data: true,
        })
    }

    fn rows(n: usize) -> Vec<(String, RawRecord)> {
        (1..=n)
            .map(|i| {
                let mut r = RawRecord::new();
                r.insert("Name".into(), FieldValue::String(format!("Client {i}")));
                (i.to_string(), r)
            })
            .collect()
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let out = process_batch(&ctx(), rows(37), 4).await.unwrap();
        let ids: Vec<_> = out.iter().map(|r| r.row_id.clone()).collect();
        let expected: Vec<_> = (1..=37).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn more_workers_than_rows() {
        let out = process_batch(&ctx(), rows(2), 16).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.entity.is_some()));
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(process_batch(&ctx(), Vec::new(), 4).await.unwrap().is_empty());
    }
}
