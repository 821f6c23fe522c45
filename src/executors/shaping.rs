//! Shaping executors: row-set transformations with one upstream input.
//!
//! Every executor here consumes the single-input row contract
//! ([`ResolvedInput::rows`]) and produces a new row array. Rows that are
//! not objects flow through field-based transforms unchanged; only the
//! rows a transform actually understands are rewritten.

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::cmp::Ordering;

use super::{
    compare_values, eval_conditions, optional_str, parse_conditions, require_str,
    ExecutionContext, Executor, ExecutorError, ResolvedInput,
};
use crate::node::NodeConfig;

/// Keeps rows matching the configured condition(s).
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterExecutor;

#[async_trait]
impl Executor for FilterExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let (conditions, logic) = parse_conditions(|k| config.get(k))?;
        let kept = input
            .rows()?
            .into_iter()
            .filter(|row| eval_conditions(row, &conditions, logic))
            .collect();
        Ok(Value::Array(kept))
    }
}

/// Stable sort by `field`, ascending unless `order` is `desc`. Rows
/// missing the field sort last either way.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortExecutor;

#[async_trait]
impl Executor for SortExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let descending = match optional_str(config, "order") {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(ExecutorError::InvalidConfig {
                    key: "order",
                    reason: format!("expected `asc` or `desc`, got `{other}`"),
                });
            }
        };
        let mut rows = input.rows()?;
        rows.sort_by(|a, b| {
            let ordering = field_ordering(a.get(field), b.get(field));
            if descending {
                // Missing fields still sort last.
                match (a.get(field), b.get(field)) {
                    (None, _) | (_, None) => ordering,
                    _ => ordering.reverse(),
                }
            } else {
                ordering
            }
        });
        Ok(Value::Array(rows))
    }
}

/// Projects each object row down to the `fields` list.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectFieldsExecutor;

#[async_trait]
impl Executor for SelectFieldsExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let fields = string_list(config, "fields")?;
        let rows = input
            .rows()?
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => {
                    let kept = fields
                        .iter()
                        .filter_map(|field| {
                            map.get(field).map(|v| (field.clone(), v.clone()))
                        })
                        .collect();
                    Value::Object(kept)
                }
                other => other,
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// Renames object keys per the `mapping` config (`{old: new}`).
#[derive(Clone, Copy, Debug, Default)]
pub struct RenameFieldsExecutor;

#[async_trait]
impl Executor for RenameFieldsExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let mapping = config
            .get("mapping")
            .and_then(Value::as_object)
            .ok_or_else(|| ExecutorError::InvalidConfig {
                key: "mapping",
                reason: "expected an object of old-name to new-name pairs".to_string(),
            })?;
        let rows = input
            .rows()?
            .into_iter()
            .map(|row| match row {
                Value::Object(mut map) => {
                    for (old, new) in mapping {
                        let Some(new) = new.as_str() else { continue };
                        if let Some(value) = map.remove(old) {
                            map.insert(new.to_string(), value);
                        }
                    }
                    Value::Object(map)
                }
                other => other,
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// Drops duplicate rows, keeping first occurrences. With a `field` config
/// the field value is the identity; without it the whole row is.
#[derive(Clone, Copy, Debug, Default)]
pub struct DedupeExecutor;

#[async_trait]
impl Executor for DedupeExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = optional_str(config, "field");
        let mut seen = FxHashSet::default();
        let mut kept = Vec::new();
        for row in input.rows()? {
            let key = match field {
                Some(field) => row.get(field).map(Value::to_string),
                None => Some(row.to_string()),
            };
            match key {
                // Rows without the dedupe field are all kept.
                None => kept.push(row),
                Some(key) => {
                    if seen.insert(key) {
                        kept.push(row);
                    }
                }
            }
        }
        Ok(Value::Array(kept))
    }
}

/// Unwinds an array-valued `field` into one row per element.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlattenExecutor;

#[async_trait]
impl Executor for FlattenExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let mut out = Vec::new();
        for row in input.rows()? {
            match row.get(field).and_then(Value::as_array).cloned() {
                Some(elements) => {
                    for element in elements {
                        let mut clone = row.clone();
                        if let Some(map) = clone.as_object_mut() {
                            map.insert(field.to_string(), element);
                        }
                        out.push(clone);
                    }
                }
                // Rows without an array there pass through unchanged.
                None => out.push(row),
            }
        }
        Ok(Value::Array(out))
    }
}

/// Cleans null/missing values in `field`: `mode: drop` removes the row,
/// `mode: default` substitutes the configured `value`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHandlingExecutor;

#[async_trait]
impl Executor for NullHandlingExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let rows = input.rows()?;
        match optional_str(config, "mode") {
            None | Some("drop") => {
                let kept = rows
                    .into_iter()
                    .filter(|row| !row.get(field).map(Value::is_null).unwrap_or(true))
                    .collect();
                Ok(Value::Array(kept))
            }
            Some("default") => {
                let fallback =
                    config
                        .get("value")
                        .cloned()
                        .ok_or_else(|| ExecutorError::InvalidConfig {
                            key: "value",
                            reason: "mode `default` needs a replacement value".to_string(),
                        })?;
                let rows = rows
                    .into_iter()
                    .map(|mut row| {
                        let absent = row.get(field).map(Value::is_null).unwrap_or(true);
                        if absent {
                            if let Some(map) = row.as_object_mut() {
                                map.insert(field.to_string(), fallback.clone());
                            }
                        }
                        row
                    })
                    .collect();
                Ok(Value::Array(rows))
            }
            Some(other) => Err(ExecutorError::InvalidConfig {
                key: "mode",
                reason: format!("expected `drop` or `default`, got `{other}`"),
            }),
        }
    }
}

/// Total order for sort keys: missing fields last, mixed types grouped by
/// type so the sort stays deterministic.
fn field_ordering(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn string_list(config: &NodeConfig, key: &'static str) -> Result<Vec<String>, ExecutorError> {
    config
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| ExecutorError::InvalidConfig {
            key,
            reason: "expected an array of field names".to_string(),
        })
}
