//! Serialized pipeline snapshots — the only durable contract.
//!
//! A snapshot captures structure and presentation metadata: nodes (with
//! config, label, position, ports), wires, the time cursor, timeline
//! bounds, run mode, and opaque keyframes. Execution results are not
//! durable: restored nodes come back `Idle` with no cache, so the first
//! run after a restore recomputes everything.
//!
//! Restoring validates what serde cannot: id well-formedness, duplicate
//! ids, dangling wire endpoints, origin-targeting wires, and cycles all
//! refuse the snapshot with a typed [`PersistenceError`].

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::Pipeline;
use crate::graph::{Graph, GraphError};
use crate::node::{Node, NodeConfig};
use crate::types::{NodeId, NodeKind, RunMode, WireId};
use crate::wire::{Wire, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT};

// ============================================================================
// Errors
// ============================================================================

/// Failures while restoring a snapshot.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    /// A node or wire id is not a well-formed identifier.
    #[error("malformed id `{id}` in snapshot")]
    #[diagnostic(code(wireloom::persistence::malformed_id))]
    MalformedId { id: String },

    /// The same id appears twice.
    #[error("duplicate id `{id}` in snapshot")]
    #[diagnostic(code(wireloom::persistence::duplicate_id))]
    DuplicateId { id: String },

    /// The run mode string is not one of the known modes.
    #[error("unrecognized run mode `{mode}`")]
    #[diagnostic(
        code(wireloom::persistence::run_mode),
        help("Expected `auto`, `manual`, or `step`.")
    )]
    UnknownRunMode { mode: String },

    /// A timestamp is not RFC 3339.
    #[error("malformed timestamp `{raw}` in snapshot")]
    #[diagnostic(code(wireloom::persistence::timestamp))]
    MalformedTimestamp { raw: String },

    /// A wire in the snapshot violates graph invariants (dangling
    /// endpoint, origin target, or cycle).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    /// The snapshot text is not valid JSON.
    #[error(transparent)]
    #[diagnostic(code(wireloom::persistence::json))]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Wire Format
// ============================================================================

/// Snapshot of a whole pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPipeline {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_end: Option<String>,
    pub run_mode: String,
    #[serde(default)]
    pub nodes: Vec<PersistedNode>,
    #[serde(default)]
    pub wires: Vec<PersistedWire>,
    /// Presentation-layer data the engine round-trips untouched.
    #[serde(default)]
    pub keyframes: Vec<Value>,
}

/// Snapshot of one node. `x`/`y` are presentation metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNode {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub output_ports: Vec<String>,
}

/// Snapshot of one wire; ports default to the canonical pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWire {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default = "default_source_port")]
    pub source_port: String,
    #[serde(default = "default_target_port")]
    pub target_port: String,
}

fn default_source_port() -> String {
    DEFAULT_OUTPUT_PORT.to_string()
}

fn default_target_port() -> String {
    DEFAULT_INPUT_PORT.to_string()
}

impl PersistedPipeline {
    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> Result<Self, PersistenceError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the snapshot as pretty JSON.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Pipeline> for PersistedPipeline {
    fn from(pipeline: &Pipeline) -> Self {
        let graph = pipeline.graph();
        Self {
            id: pipeline.id().to_string(),
            name: pipeline.name().to_string(),
            current_timestamp: pipeline.current_timestamp().map(|t| t.to_rfc3339()),
            timeline_start: pipeline.timeline().0.map(|t| t.to_rfc3339()),
            timeline_end: pipeline.timeline().1.map(|t| t.to_rfc3339()),
            run_mode: pipeline.run_mode().encode().to_string(),
            nodes: graph.nodes().map(PersistedNode::from).collect(),
            wires: graph.wires().map(PersistedWire::from).collect(),
            keyframes: pipeline.keyframes().to_vec(),
        }
    }
}

impl From<&Node> for PersistedNode {
    fn from(node: &Node) -> Self {
        let (x, y) = node.position();
        Self {
            id: node.id().to_string(),
            kind: node.kind().encode(),
            label: node.label().to_string(),
            x,
            y,
            config: node.config().clone(),
            output_ports: node.output_ports().to_vec(),
        }
    }
}

impl From<&Wire> for PersistedWire {
    fn from(wire: &Wire) -> Self {
        Self {
            id: wire.id().to_string(),
            source_id: wire.source_id().to_string(),
            target_id: wire.target_id().to_string(),
            source_port: wire.source_port().to_string(),
            target_port: wire.target_port().to_string(),
        }
    }
}

impl TryFrom<PersistedPipeline> for Pipeline {
    type Error = PersistenceError;

    fn try_from(snapshot: PersistedPipeline) -> Result<Self, Self::Error> {
        let run_mode =
            RunMode::decode(&snapshot.run_mode).ok_or_else(|| PersistenceError::UnknownRunMode {
                mode: snapshot.run_mode.clone(),
            })?;

        let mut graph = Graph::new();
        for persisted in &snapshot.nodes {
            let id = parse_node_id(&persisted.id)?;
            if graph.contains_node(id) {
                return Err(PersistenceError::DuplicateId {
                    id: persisted.id.clone(),
                });
            }
            // Unknown kind strings come back as Custom, so snapshots from
            // newer engines still load (their executors fall back to
            // identity).
            let kind = NodeKind::decode(&persisted.kind);
            let label = if persisted.label.is_empty() {
                kind.encode()
            } else {
                persisted.label.clone()
            };
            graph.add_node(Node::restore(
                id,
                kind,
                label,
                persisted.x,
                persisted.y,
                persisted.config.clone(),
                persisted.output_ports.clone(),
            ));
        }

        for persisted in &snapshot.wires {
            let id = parse_wire_id(&persisted.id)?;
            if graph.wire(id).is_some() {
                return Err(PersistenceError::DuplicateId {
                    id: persisted.id.clone(),
                });
            }
            let wire = Wire::restore(
                id,
                parse_node_id(&persisted.source_id)?,
                parse_node_id(&persisted.target_id)?,
                persisted.source_port.clone(),
                persisted.target_port.clone(),
            );
            graph.attach_restored_wire(wire)?;
        }

        let mut pipeline = Pipeline::new(snapshot.name).with_run_mode(run_mode);
        pipeline.id = snapshot.id;
        pipeline.graph = graph;
        pipeline.current_timestamp = parse_timestamp(snapshot.current_timestamp.as_deref())?;
        pipeline.timeline_start = parse_timestamp(snapshot.timeline_start.as_deref())?;
        pipeline.timeline_end = parse_timestamp(snapshot.timeline_end.as_deref())?;
        pipeline.keyframes = snapshot.keyframes;
        Ok(pipeline)
    }
}

impl Pipeline {
    /// Snapshot this pipeline's durable state.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedPipeline {
        PersistedPipeline::from(self)
    }

    /// Rebuild a pipeline from a snapshot with default engine
    /// configuration, registry, and collaborators; chain `with_*` builders
    /// to customize the restored instance.
    pub fn from_persisted(snapshot: PersistedPipeline) -> Result<Self, PersistenceError> {
        Self::try_from(snapshot)
    }
}

fn parse_node_id(raw: &str) -> Result<NodeId, PersistenceError> {
    NodeId::parse(raw).map_err(|_| PersistenceError::MalformedId { id: raw.to_string() })
}

fn parse_wire_id(raw: &str) -> Result<WireId, PersistenceError> {
    WireId::parse(raw).map_err(|_| PersistenceError::MalformedId { id: raw.to_string() })
}

fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, PersistenceError> {
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| PersistenceError::MalformedTimestamp {
                raw: raw.to_string(),
            }),
    }
}
