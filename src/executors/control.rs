//! Control executors: routing, combination, and multi-input joins.
//!
//! Branch and switch publish per-port objects; downstream wires select a
//! slice by naming the port on their source end. Merge and join are the
//! two kinds that consume the multi-input list form directly.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{json, Map, Value};

use super::{
    eval_conditions, optional_str, parse_conditions, require_str, ExecutionContext, Executor,
    ExecutorError, ResolvedInput,
};
use crate::node::NodeConfig;

/// Two-way split on a condition: rows matching go out the `true` port,
/// the rest out the `false` port.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchExecutor;

#[async_trait]
impl Executor for BranchExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let (conditions, logic) = parse_conditions(|k| config.get(k))?;
        let mut matched = Vec::new();
        let mut rest = Vec::new();
        for row in input.rows()? {
            if eval_conditions(&row, &conditions, logic) {
                matched.push(row);
            } else {
                rest.push(row);
            }
        }
        Ok(json!({"true": matched, "false": rest}))
    }
}

/// N-way split on the string form of `field`. With a `cases` list, listed
/// values get their own ports and everything else lands on `default`;
/// without one, every distinct value becomes a port.
#[derive(Clone, Copy, Debug, Default)]
pub struct SwitchExecutor;

#[async_trait]
impl Executor for SwitchExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let field = require_str(config, "field")?;
        let cases: Option<Vec<&str>> = config
            .get("cases")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect());

        let mut ports: Map<String, Value> = Map::new();
        if let Some(cases) = &cases {
            // Declared ports exist even when empty, so wires can target them.
            for case in cases {
                ports.insert((*case).to_string(), Value::Array(Vec::new()));
            }
            ports.insert("default".to_string(), Value::Array(Vec::new()));
        }

        for row in input.rows()? {
            let key = match row.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "default".to_string(),
            };
            let port = match &cases {
                Some(cases) if !cases.contains(&key.as_str()) => "default".to_string(),
                _ => key,
            };
            match ports.get_mut(&port) {
                Some(Value::Array(bucket)) => bucket.push(row),
                _ => {
                    ports.insert(port, Value::Array(vec![row]));
                }
            }
        }
        Ok(Value::Object(ports))
    }
}

/// Concatenates every upstream row set, in wire-registration order.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeExecutor;

#[async_trait]
impl Executor for MergeExecutor {
    async fn execute(
        &self,
        _config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let mut merged = Vec::new();
        for rows in input.row_sets() {
            merged.extend(rows);
        }
        Ok(Value::Array(merged))
    }
}

/// Joins exactly two upstream row sets on `field`.
///
/// `joinType` selects `inner` (default), `left`, or `right`. Matched pairs
/// combine into one object with the right side winning key collisions;
/// rows missing the join field never match.
#[derive(Clone, Copy, Debug, Default)]
pub struct JoinExecutor;

#[async_trait]
impl Executor for JoinExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let sets = input.row_sets();
        let [left, right]: [Vec<Value>; 2] =
            sets.try_into()
                .map_err(|sets: Vec<Vec<Value>>| ExecutorError::PairExpected {
                    got: sets.len(),
                })?;
        let field = require_str(config, "field")?;
        let join_type = match optional_str(config, "joinType") {
            None | Some("inner") => JoinType::Inner,
            Some("left") => JoinType::Left,
            Some("right") => JoinType::Right,
            Some(other) => {
                return Err(ExecutorError::InvalidConfig {
                    key: "joinType",
                    reason: format!("expected `inner`, `left`, or `right`, got `{other}`"),
                });
            }
        };

        let mut out = Vec::new();
        match join_type {
            JoinType::Inner | JoinType::Left => {
                let index = key_index(&right, field);
                for l in &left {
                    match join_key(l, field).and_then(|key| index.get(&key)) {
                        Some(matches) => {
                            for &r in matches {
                                out.push(combine(l, &right[r]));
                            }
                        }
                        None if join_type == JoinType::Left => out.push(l.clone()),
                        None => {}
                    }
                }
            }
            JoinType::Right => {
                let index = key_index(&left, field);
                for r in &right {
                    match join_key(r, field).and_then(|key| index.get(&key)) {
                        Some(matches) => {
                            for &l in matches {
                                out.push(combine(&left[l], r));
                            }
                        }
                        None => out.push(r.clone()),
                    }
                }
            }
        }
        Ok(Value::Array(out))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum JoinType {
    Inner,
    Left,
    Right,
}

fn join_key(row: &Value, field: &str) -> Option<String> {
    row.get(field).map(Value::to_string)
}

fn key_index(rows: &[Value], field: &str) -> FxHashMap<String, Vec<usize>> {
    let mut index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    for (position, row) in rows.iter().enumerate() {
        if let Some(key) = join_key(row, field) {
            index.entry(key).or_default().push(position);
        }
    }
    index
}

/// Object rows merge shallowly (right wins); anything else pairs up.
fn combine(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            let mut merged = l.clone();
            for (key, value) in r {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => json!([left, right]),
    }
}
