//! Emission executors: surface results without changing them.
//!
//! Preview and log are pass-throughs that report over the event stream;
//! export renders the input into a portable text format. None of them
//! write to external systems, so scrubbing the time cursor can re-run
//! them freely.

use async_trait::async_trait;
use serde_json::Value;

use super::{optional_str, ExecutionContext, Executor, ExecutorError, ResolvedInput};
use crate::node::NodeConfig;

/// Pass-through that reports how many rows flowed past.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviewExecutor;

#[async_trait]
impl Executor for PreviewExecutor {
    async fn execute(
        &self,
        _config: &NodeConfig,
        input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let value = input.into_value();
        let rows = match &value {
            Value::Array(rows) => rows.len(),
            Value::Null => 0,
            _ => 1,
        };
        ctx.emit("preview", format!("{rows} rows"));
        Ok(value)
    }
}

/// Pass-through that mirrors its payload onto the event stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogExecutor;

#[async_trait]
impl Executor for LogExecutor {
    async fn execute(
        &self,
        _config: &NodeConfig,
        input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let value = input.into_value();
        ctx.emit("log", value.to_string());
        Ok(value)
    }
}

/// Renders the input rows as text: `format: csv` or `format: json`
/// (default). The output is the rendered string; delivering it anywhere
/// is the caller's business.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportExecutor;

#[async_trait]
impl Executor for ExportExecutor {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        let rows = input.rows()?;
        let rendered = match optional_str(config, "format") {
            None | Some("json") => serde_json::to_string_pretty(&rows)?,
            Some("csv") => render_csv(&rows)?,
            Some(other) => {
                return Err(ExecutorError::InvalidConfig {
                    key: "format",
                    reason: format!("expected `csv` or `json`, got `{other}`"),
                });
            }
        };
        Ok(Value::String(rendered))
    }
}

/// CSV with a header row: columns are the union of object keys in
/// first-seen order, non-object rows fill a single `value` column.
fn render_csv(rows: &[Value]) -> Result<String, ExecutorError> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    if columns.is_empty() {
        columns.push("value".to_string());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = match row {
            Value::Object(map) => columns
                .iter()
                .map(|column| map.get(column).map(cell_text).unwrap_or_default())
                .collect(),
            other => {
                let mut record = vec![String::new(); columns.len()];
                record[0] = cell_text(other);
                record
            }
        };
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExecutorError::Render {
            message: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| ExecutorError::Render {
        message: e.to_string(),
    })
}

/// Strings render raw; everything else renders as compact JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::PipelineEvent;
    use crate::types::NodeId;
    use serde_json::json;
    use std::future::Future;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn preview_passes_through_and_reports_row_count() {
        let (tx, rx) = flume::unbounded();
        let ctx = ExecutionContext::new(NodeId::new()).with_events(tx);
        let out = block_on(PreviewExecutor.execute(
            &NodeConfig::default(),
            ResolvedInput::Single(json!([1, 2, 3])),
            &ctx,
        ))
        .unwrap();
        assert_eq!(out, json!([1, 2, 3]));

        let event = rx.try_recv().unwrap();
        match event {
            PipelineEvent::Node(message) => {
                assert_eq!(message.scope, "preview");
                assert_eq!(message.message, "3 rows");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emission_without_a_bus_still_succeeds() {
        let out = block_on(LogExecutor.execute(
            &NodeConfig::default(),
            ResolvedInput::Single(json!({"id": 1})),
            &ExecutionContext::new(NodeId::new()),
        ))
        .unwrap();
        assert_eq!(out, json!({"id": 1}));
    }

    #[test]
    fn csv_export_unions_columns_in_first_seen_order() {
        let config: NodeConfig = [("format".to_string(), json!("csv"))].into_iter().collect();
        let out = block_on(ExportExecutor.execute(
            &config,
            ResolvedInput::Single(json!([
                {"id": 1, "name": "Ada"},
                {"id": 2, "team": "red"},
            ])),
            &ExecutionContext::new(NodeId::new()),
        ))
        .unwrap();
        let text = out.as_str().unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,name,team"));
        assert_eq!(lines.next(), Some("1,Ada,"));
        assert_eq!(lines.next(), Some("2,,red"));
    }

    #[test]
    fn json_export_is_the_default() {
        let out = block_on(ExportExecutor.execute(
            &NodeConfig::default(),
            ResolvedInput::Single(json!([{"id": 1}])),
            &ExecutionContext::new(NodeId::new()),
        ))
        .unwrap();
        assert!(out.as_str().unwrap().contains("\"id\": 1"));
    }
}
