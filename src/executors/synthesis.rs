//! Synthesis executors: collapse row sets into summaries.

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::{
    compare_values, json_number, require_str, ExecutionContext, Executor, ExecutorError,
    ResolvedInput,
};
use crate::node::NodeConfig;

/// Reduces the input rows to one value: `count`, or `sum`/`avg`/`min`/`max`
/// over `field`. Rows without a usable field value are skipped rather than
/// failing the aggregate.
#[derive(Clone, Copy, Debug, Default)]
pub struct AggregateExecutor;

#[async_trait]
impl Executor for AggregateExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let function = require_str(config, "function")?;
        let rows = input.rows()?;
        if function == "count" {
            return Ok(Value::from(rows.len()));
        }

        let field = require_str(config, "field")?;
        match function {
            "sum" | "avg" => {
                let numbers: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| row.get(field).and_then(Value::as_f64))
                    .collect();
                let total: f64 = numbers.iter().sum();
                match function {
                    "sum" => Ok(json_number(total)),
                    _ if numbers.is_empty() => Ok(Value::Null),
                    _ => Ok(json_number(total / numbers.len() as f64)),
                }
            }
            "min" | "max" => {
                let want = if function == "min" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<&Value> = None;
                for candidate in rows.iter().filter_map(|row| row.get(field)) {
                    best = match best {
                        None => Some(candidate),
                        Some(current) => match compare_values(candidate, current) {
                            Some(ordering) if ordering == want => Some(candidate),
                            // Incomparable candidates are skipped.
                            _ => Some(current),
                        },
                    };
                }
                Ok(best.cloned().unwrap_or(Value::Null))
            }
            other => Err(ExecutorError::InvalidConfig {
                key: "function",
                reason: format!("unrecognized aggregate `{other}`"),
            }),
        }
    }
}

/// Buckets rows by the string form of `field`, producing an object from
/// bucket key to its rows. Rows missing the field land under `"null"`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupExecutor;

#[async_trait]
impl Executor for GroupExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let mut buckets: Map<String, Value> = Map::new();
        for row in input.rows()? {
            let key = bucket_key(row.get(field));
            match buckets.get_mut(&key) {
                Some(Value::Array(bucket)) => bucket.push(row),
                _ => {
                    buckets.insert(key, Value::Array(vec![row]));
                }
            }
        }
        Ok(Value::Object(buckets))
    }
}

/// Distinct values of `field`, in first-occurrence order.
#[derive(Clone, Copy, Debug, Default)]
pub struct DistinctExecutor;

#[async_trait]
impl Executor for DistinctExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let mut seen = FxHashSet::default();
        let mut values = Vec::new();
        for row in input.rows()? {
            let Some(value) = row.get(field) else { continue };
            if seen.insert(value.to_string()) {
                values.push(value.clone());
            }
        }
        Ok(Value::Array(values))
    }
}

fn bucket_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}
