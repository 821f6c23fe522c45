//! Processing nodes and their execution-state machine.
//!
//! A [`Node`] is a single addressable unit in a pipeline graph: identity,
//! kind, configuration, cached output, and execution state. Nodes do not own
//! their wires; they record incident wire ids in registration order, which
//! downstream input resolution depends on.
//!
//! # State machine
//!
//! ```text
//! Idle ──run──▶ Running ──▶ Success | Error
//!   ▲                           │
//!   └──── restore          invalidate ──▶ Stale ──run──▶ Running
//! ```
//!
//! `Running` is a protected state: an invalidation arriving while a node is
//! executing is suppressed, not queued (known limitation — the in-flight
//! result lands without a re-dirty). The cached output is written only
//! through [`Node::complete`], so the run loop is the sole writer.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use wireloom::node::{ExecutionState, Node};
//! use wireloom::types::NodeKind;
//!
//! let mut node = Node::new(NodeKind::Filter).with_label("active only");
//! assert_eq!(node.execution_state(), ExecutionState::Idle);
//!
//! node.begin_run();
//! node.complete(json!([{"id": 1}]));
//! assert_eq!(node.execution_state(), ExecutionState::Success);
//! assert!(node.cached_output().is_some());
//!
//! // Invalidation leaves the cache readable but untrusted.
//! assert!(node.mark_stale());
//! assert_eq!(node.execution_state(), ExecutionState::Stale);
//! assert!(node.cached_output().is_some());
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;

use crate::types::{NodeId, NodeKind, WireId};

/// Kind-specific configuration record: a free-form JSON object.
///
/// The recognized key set per kind belongs to the executor registry, not the
/// engine; the engine only merges and carries it.
pub type NodeConfig = FxHashMap<String, Value>;

// ============================================================================
// Execution State
// ============================================================================

/// Lifecycle state of a node's cached output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// Never executed since creation or restore.
    #[default]
    Idle,
    /// Execution in flight; invalidation is suppressed.
    Running,
    /// Last execution succeeded; cached output is current.
    Success,
    /// Last execution failed; `last_error` is set, prior cache preserved.
    Error,
    /// Cached output is no longer trustworthy.
    Stale,
}

impl ExecutionState {
    /// Whether the node's cached output is current.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, ExecutionState::Success)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Running => "running",
            ExecutionState::Success => "success",
            ExecutionState::Error => "error",
            ExecutionState::Stale => "stale",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Node Record
// ============================================================================

/// A single processing unit in the pipeline graph.
///
/// Construction goes through [`Node::new`] plus the `with_*` builders; all
/// post-construction mutation goes through the transition methods or the
/// owning [`Pipeline`](crate::pipeline::Pipeline), so callers holding a
/// `&Node` snapshot can never corrupt engine state.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    label: String,
    x: f64,
    y: f64,
    config: NodeConfig,
    inputs: Vec<WireId>,
    outputs: Vec<WireId>,
    output_ports: Vec<String>,
    execution_state: ExecutionState,
    cached_output: Option<Value>,
    cached_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Node {
    /// Create a new idle node of the given kind.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        let label = kind.encode();
        Self {
            id: NodeId::new(),
            kind,
            label,
            x: 0.0,
            y: 0.0,
            config: NodeConfig::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_ports: Vec::new(),
            execution_state: ExecutionState::Idle,
            cached_output: None,
            cached_at: None,
            last_error: None,
        }
    }

    /// Set a display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the opaque canvas position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the initial configuration record.
    #[must_use]
    pub fn with_config(mut self, config: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.config = config.into_iter().collect();
        self
    }

    /// Declare extra named output ports (branch/switch-family nodes).
    #[must_use]
    pub fn with_output_ports(mut self, ports: Vec<String>) -> Self {
        self.output_ports = ports;
        self
    }

    /// Reconstruct a node from a persisted snapshot. Restored nodes come
    /// back `Idle` with no cache; execution results are not durable.
    #[must_use]
    pub(crate) fn restore(
        id: NodeId,
        kind: NodeKind,
        label: String,
        x: f64,
        y: f64,
        config: NodeConfig,
        output_ports: Vec<String>,
    ) -> Self {
        Self {
            id,
            kind,
            label,
            x,
            y,
            config,
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_ports,
            execution_state: ExecutionState::Idle,
            cached_output: None,
            cached_at: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Opaque canvas position, round-tripped for the presentation layer.
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Incoming wire ids in registration order.
    pub fn inputs(&self) -> &[WireId] {
        &self.inputs
    }

    /// Outgoing wire ids in registration order.
    pub fn outputs(&self) -> &[WireId] {
        &self.outputs
    }

    pub fn output_ports(&self) -> &[String] {
        &self.output_ports
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.execution_state
    }

    /// Last successfully computed value, surviving later failures.
    pub fn cached_output(&self) -> Option<&Value> {
        self.cached_output.as_ref()
    }

    pub fn cached_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
    }

    /// Failure message from the most recent failed execution.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns `true` if this node's kind belongs to the origin family.
    #[must_use]
    pub fn is_origin(&self) -> bool {
        self.kind.is_origin()
    }

    // ------------------------------------------------------------------
    // State transitions (the only writers of cache and state)
    // ------------------------------------------------------------------

    /// Invalidate this node's cached output.
    ///
    /// Returns `true` if the state actually changed. Suppressed while
    /// `Running`; a no-op when already `Stale`.
    pub fn mark_stale(&mut self) -> bool {
        match self.execution_state {
            ExecutionState::Running | ExecutionState::Stale => false,
            _ => {
                self.execution_state = ExecutionState::Stale;
                true
            }
        }
    }

    /// Enter `Running`, clearing any prior failure message.
    pub fn begin_run(&mut self) {
        self.execution_state = ExecutionState::Running;
        self.last_error = None;
    }

    /// Land a successful result: cache it, stamp it, enter `Success`.
    pub fn complete(&mut self, output: Value) {
        self.cached_output = Some(output);
        self.cached_at = Some(Utc::now());
        self.last_error = None;
        self.execution_state = ExecutionState::Success;
    }

    /// Record a failed execution. The prior cached output is preserved so
    /// consumers can distinguish "never computed" from "computed, then
    /// broke".
    pub fn fail(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.execution_state = ExecutionState::Error;
    }

    // ------------------------------------------------------------------
    // Graph bookkeeping (crate-internal; wires are owned by the Graph)
    // ------------------------------------------------------------------

    pub(crate) fn register_input(&mut self, wire: WireId) {
        self.inputs.push(wire);
    }

    pub(crate) fn register_output(&mut self, wire: WireId) {
        self.outputs.push(wire);
    }

    pub(crate) fn unregister_wire(&mut self, wire: WireId) {
        self.inputs.retain(|w| *w != wire);
        self.outputs.retain(|w| *w != wire);
    }

    /// Shallow-merge a partial configuration into the existing record.
    pub(crate) fn merge_config(&mut self, partial: NodeConfig) {
        for (key, value) in partial {
            self.config.insert(key, value);
        }
    }

    pub(crate) fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }
}
