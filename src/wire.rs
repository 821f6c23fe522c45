//! Wires: the directed, ported edges of a pipeline graph.
//!
//! A [`Wire`] connects one node's named output port to another node's named
//! input port. Most nodes use the canonical [`DEFAULT_OUTPUT_PORT`] /
//! [`DEFAULT_INPUT_PORT`] pair; branch/switch-family nodes publish on extra
//! named output ports, and merge/join-family nodes accept several wires on
//! one input port.
//!
//! Wires are owned by the [`Graph`](crate::graph::Graph); nodes only record
//! membership through their adjacency lists. Fields are private so endpoint
//! and port assignments cannot drift after registration.

use crate::types::{NodeId, WireId};

/// Canonical output port name for single-output nodes.
pub const DEFAULT_OUTPUT_PORT: &str = "out";

/// Canonical input port name for single-input nodes.
pub const DEFAULT_INPUT_PORT: &str = "in";

/// A directed, ported connection from one node's output to another's input.
///
/// # Examples
///
/// ```rust
/// use wireloom::types::NodeId;
/// use wireloom::wire::{Wire, DEFAULT_OUTPUT_PORT};
///
/// let (a, b) = (NodeId::new(), NodeId::new());
/// let wire = Wire::new(a, b);
/// assert_eq!(wire.source_id(), a);
/// assert_eq!(wire.source_port(), DEFAULT_OUTPUT_PORT);
///
/// let split = Wire::with_ports(a, b, "true", "in");
/// assert!(!split.uses_default_source_port());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wire {
    id: WireId,
    source_id: NodeId,
    target_id: NodeId,
    source_port: String,
    target_port: String,
}

impl Wire {
    /// Create a wire on the canonical default ports.
    #[must_use]
    pub fn new(source_id: NodeId, target_id: NodeId) -> Self {
        Self::with_ports(source_id, target_id, DEFAULT_OUTPUT_PORT, DEFAULT_INPUT_PORT)
    }

    /// Create a wire on explicitly named ports.
    #[must_use]
    pub fn with_ports(
        source_id: NodeId,
        target_id: NodeId,
        source_port: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            id: WireId::new(),
            source_id,
            target_id,
            source_port: source_port.into(),
            target_port: target_port.into(),
        }
    }

    /// Reconstruct a wire with a known id, for snapshot restore.
    #[must_use]
    pub(crate) fn restore(
        id: WireId,
        source_id: NodeId,
        target_id: NodeId,
        source_port: String,
        target_port: String,
    ) -> Self {
        Self {
            id,
            source_id,
            target_id,
            source_port,
            target_port,
        }
    }

    pub fn id(&self) -> WireId {
        self.id
    }

    pub fn source_id(&self) -> NodeId {
        self.source_id
    }

    pub fn target_id(&self) -> NodeId {
        self.target_id
    }

    pub fn source_port(&self) -> &str {
        &self.source_port
    }

    pub fn target_port(&self) -> &str {
        &self.target_port
    }

    /// Returns `true` if the wire leaves through the canonical output port.
    ///
    /// Non-default source ports select a single keyed slice of an upstream
    /// node's object-shaped output during input resolution.
    #[must_use]
    pub fn uses_default_source_port(&self) -> bool {
        self.source_port == DEFAULT_OUTPUT_PORT
    }
}
