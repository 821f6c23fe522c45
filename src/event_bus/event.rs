use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::NodeId;

/// One observable fact about a pipeline, published on the event bus.
///
/// Three families: structural changes to the graph, node-scoped messages
/// surfaced by executors (previews, logs), and run-loop summaries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PipelineEvent {
    Graph(GraphChange),
    Node(NodeMessage),
    Run(RunSummary),
}

/// Structural mutation detail carried by [`PipelineEvent::Graph`].
///
/// Ids travel as strings so sinks never need the engine's types to
/// deserialize a feed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "change", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GraphChange {
    NodeAdded {
        node_id: String,
        kind: String,
    },
    NodeRemoved {
        node_id: String,
    },
    WireAdded {
        wire_id: String,
        source_id: String,
        target_id: String,
    },
    WireRemoved {
        wire_id: String,
    },
    NodeConfigured {
        node_id: String,
    },
    NodeStateChanged {
        node_id: String,
        state: String,
    },
    /// The time cursor moved (`at` is RFC 3339) or was cleared (`None`).
    TimestampMoved {
        at: Option<String>,
    },
}

/// Message an executor surfaced for its node (previews, logs).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeMessage {
    pub node_id: String,
    pub scope: String,
    pub message: String,
}

/// Outcome counts for one drained run queue.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
}

impl PipelineEvent {
    pub fn graph(change: GraphChange) -> Self {
        PipelineEvent::Graph(change)
    }

    pub fn node_message(
        node_id: NodeId,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PipelineEvent::Node(NodeMessage {
            node_id: node_id.to_string(),
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn run_completed(executed: usize, failed: usize) -> Self {
        PipelineEvent::Run(RunSummary { executed, failed })
    }

    /// Event family label used in serialized feeds.
    pub fn kind_label(&self) -> &'static str {
        match self {
            PipelineEvent::Graph(_) => "graph",
            PipelineEvent::Node(_) => "node",
            PipelineEvent::Run(_) => "run",
        }
    }

    /// Normalized JSON form: `{"type": ..., "detail": {...}}`.
    pub fn to_json_value(&self) -> Value {
        let detail = match self {
            PipelineEvent::Graph(change) => {
                serde_json::to_value(change).unwrap_or(Value::Null)
            }
            PipelineEvent::Node(message) => {
                serde_json::to_value(message).unwrap_or(Value::Null)
            }
            PipelineEvent::Run(summary) => {
                serde_json::to_value(summary).unwrap_or(Value::Null)
            }
        };
        json!({
            "type": self.kind_label(),
            "detail": detail,
        })
    }

    /// Compact JSON string form.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl GraphChange {
    /// Short human description, used by `Display` and the tracing sink.
    pub fn describe(&self) -> String {
        match self {
            GraphChange::NodeAdded { node_id, kind } => {
                format!("node {node_id} added (kind {kind})")
            }
            GraphChange::NodeRemoved { node_id } => format!("node {node_id} removed"),
            GraphChange::WireAdded {
                wire_id,
                source_id,
                target_id,
            } => format!("wire {wire_id} added ({source_id} -> {target_id})"),
            GraphChange::WireRemoved { wire_id } => format!("wire {wire_id} removed"),
            GraphChange::NodeConfigured { node_id } => format!("node {node_id} configured"),
            GraphChange::NodeStateChanged { node_id, state } => {
                format!("node {node_id} entered {state}")
            }
            GraphChange::TimestampMoved { at: Some(at) } => format!("time cursor moved to {at}"),
            GraphChange::TimestampMoved { at: None } => "time cursor cleared".to_string(),
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Graph(change) => write!(f, "[graph] {}", change.describe()),
            PipelineEvent::Node(message) => write!(
                f,
                "[{}] node {}: {}",
                message.scope, message.node_id, message.message
            ),
            PipelineEvent::Run(summary) => write!(
                f,
                "[run] {} executed, {} failed",
                summary.executed, summary.failed
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_form_is_tagged_by_family() {
        let event = PipelineEvent::graph(GraphChange::NodeRemoved {
            node_id: "n1".to_string(),
        });
        let value = event.to_json_value();
        assert_eq!(value["type"], "graph");
        assert_eq!(value["detail"]["change"], "nodeRemoved");
        assert_eq!(value["detail"]["nodeId"], "n1");
    }

    #[test]
    fn display_lines_stay_single_line() {
        let event = PipelineEvent::node_message(NodeId::new(), "preview", "3 rows");
        let line = event.to_string();
        assert!(line.starts_with("[preview] node "));
        assert!(!line.contains('\n'));

        let summary = PipelineEvent::run_completed(4, 1).to_string();
        assert_eq!(summary, "[run] 4 executed, 1 failed");
    }

    #[test]
    fn events_round_trip_through_serde() {
        let event = PipelineEvent::graph(GraphChange::TimestampMoved {
            at: Some("2024-05-01T00:00:00+00:00".to_string()),
        });
        let text = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}
