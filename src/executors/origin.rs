//! Origin executors: nodes that introduce data into the graph.
//!
//! Origins ignore upstream input (the graph refuses wires into them) and
//! produce rows from the record workbench or from their own configuration.
//! When the pipeline carries a time cursor and a temporal filter is
//! attached, collection-backed origins restrict their rows to what was
//! known at that cursor.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    eval_conditions, optional_str, parse_conditions, require_str, ExecutionContext, Executor,
    ExecutorError, ResolvedInput,
};
use crate::node::NodeConfig;

/// Reads every record of the collection named by `collectionId`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollectionReadExecutor;

#[async_trait]
impl Executor for CollectionReadExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        _input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let collection_id = require_str(config, "collectionId")?;
        let records = ctx.workbench()?.collection(collection_id).await?;
        let records = restrict_to_cursor(records, ctx).await?;
        Ok(Value::Array(records))
    }
}

/// Focuses on one record, looked up by `recordId` (optionally scoped to a
/// `collectionId`). A missing record fails the node.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordFocusExecutor;

#[async_trait]
impl Executor for RecordFocusExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        _input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let record_id = require_str(config, "recordId")?;
        let collection_id = optional_str(config, "collectionId");
        let record = ctx.workbench()?.record(record_id, collection_id).await?;
        record.ok_or_else(|| ExecutorError::RecordNotFound {
            id: record_id.to_string(),
        })
    }
}

/// Collection read with a saved condition set applied server-side of the
/// graph: reads `collectionId`, then keeps rows matching the `query`
/// object (same shape the filter kind accepts).
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryExecutor;

#[async_trait]
impl Executor for QueryExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        _input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let collection_id = require_str(config, "collectionId")?;
        let records = ctx.workbench()?.collection(collection_id).await?;
        let records = restrict_to_cursor(records, ctx).await?;

        let Some(query) = config.get("query") else {
            return Ok(Value::Array(records));
        };
        let query_map = query
            .as_object()
            .ok_or_else(|| ExecutorError::InvalidConfig {
                key: "query",
                reason: "expected a condition object".to_string(),
            })?;
        let (conditions, logic) = parse_conditions(|k| query_map.get(k))?;
        let kept = records
            .into_iter()
            .filter(|row| eval_conditions(row, &conditions, logic))
            .collect();
        Ok(Value::Array(kept))
    }
}

/// Rows delivered out-of-band (imports, inbound webhooks) land in the
/// node's `data` config key; this executor surfaces them as the output.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedDataExecutor;

#[async_trait]
impl Executor for EmbeddedDataExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        _input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        match config.get("data") {
            Some(Value::Array(rows)) => Ok(Value::Array(rows.clone())),
            Some(Value::Null) | None => Ok(Value::Array(Vec::new())),
            Some(other) => Ok(Value::Array(vec![other.clone()])),
        }
    }
}

/// Apply the attached temporal filter at the pipeline's time cursor.
/// Without a cursor or a filter the rows pass through untouched.
async fn restrict_to_cursor(
    records: Vec<Value>,
    ctx: &ExecutionContext,
) -> Result<Vec<Value>, ExecutorError> {
    match (ctx.temporal_filter(), ctx.timestamp) {
        (Some(filter), Some(at)) => Ok(filter.known_as_of(records, at).await?),
        _ => Ok(records),
    }
}
