//! Graph storage and structural mutation for pipeline graphs.
//!
//! The [`Graph`] owns every [`Node`] and [`Wire`] of one pipeline. It keeps
//! insertion-order side lists next to its hash maps so that iteration,
//! topological tie-breaking, and the serialized wire order stay
//! deterministic across runs.
//!
//! Structural rules are enforced at mutation time and refused with a typed
//! [`GraphError`], leaving the graph untouched:
//!
//! - both endpoints of a wire must exist,
//! - origin-family nodes are never wire targets,
//! - a wire whose reverse path already exists is refused (cycle guard).
//!
//! # Examples
//!
//! ```rust
//! use wireloom::graph::Graph;
//! use wireloom::node::Node;
//! use wireloom::types::NodeKind;
//!
//! let mut graph = Graph::new();
//! let source = graph.add_node(Node::new(NodeKind::CollectionRead));
//! let filter = graph.add_node(Node::new(NodeKind::Filter));
//!
//! let wire = graph.connect(source, filter).unwrap();
//! assert_eq!(graph.wire(wire).unwrap().target_id(), filter);
//!
//! // The reverse wire would close a cycle and is refused.
//! assert!(graph.connect(filter, source).is_err());
//! assert_eq!(graph.wire_count(), 1);
//! ```

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::node::Node;
use crate::types::{NodeId, WireId};
use crate::wire::Wire;

/// Structural refusals raised by graph mutation.
///
/// Every variant leaves the graph exactly as it was before the call.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// The referenced node is not part of this graph.
    #[error("node not found: {id}")]
    #[diagnostic(code(wireloom::graph::node_not_found))]
    NodeNotFound { id: NodeId },

    /// The referenced wire is not part of this graph.
    #[error("wire not found: {id}")]
    #[diagnostic(code(wireloom::graph::wire_not_found))]
    WireNotFound { id: WireId },

    /// Origin-family nodes are entry points and never wire targets.
    #[error("origin node {target} cannot be the target of a wire")]
    #[diagnostic(
        code(wireloom::graph::origin_target),
        help("Origin-family nodes only produce data. Wire from them, not into them.")
    )]
    OriginTarget { target: NodeId },

    /// The wire would close a directed cycle.
    #[error("connecting {source} -> {target} would close a cycle")]
    #[diagnostic(
        code(wireloom::graph::cycle),
        help("A directed path from the target back to the source already exists.")
    )]
    CycleDetected { source: NodeId, target: NodeId },
}

/// The node/wire collection of one pipeline.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: FxHashMap<NodeId, Node>,
    wires: FxHashMap<WireId, Wire>,
    /// Node insertion order; the deterministic tie-break for scheduling.
    node_order: Vec<NodeId>,
    /// Wire registration order; the serialized order of the snapshot.
    wire_order: Vec<WireId>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, taking ownership. Returns its id.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        debug_assert!(!self.nodes.contains_key(&id), "duplicate node id {id}");
        self.nodes.insert(id, node);
        self.node_order.push(id);
        id
    }

    /// Connect two nodes on the canonical default ports.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<WireId, GraphError> {
        self.connect_with_ports(
            source,
            target,
            crate::wire::DEFAULT_OUTPUT_PORT,
            crate::wire::DEFAULT_INPUT_PORT,
        )
    }

    /// Connect two nodes on explicitly named ports.
    ///
    /// Refused, with the graph unchanged, when either endpoint is missing,
    /// the target is origin-family, or a directed path from `target` back to
    /// `source` already exists.
    pub fn connect_with_ports(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_port: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Result<WireId, GraphError> {
        self.check_wire_endpoints(source, target)?;
        let wire = Wire::with_ports(source, target, source_port, target_port);
        Ok(self.register_wire(wire))
    }

    /// Remove a wire, detaching it from both endpoints' adjacency lists.
    ///
    /// Returns the removed wire so the caller can invalidate its former
    /// target.
    pub fn remove_wire(&mut self, id: WireId) -> Result<Wire, GraphError> {
        let wire = self
            .wires
            .remove(&id)
            .ok_or(GraphError::WireNotFound { id })?;
        self.wire_order.retain(|w| *w != id);

        debug_assert!(
            self.nodes.contains_key(&wire.source_id()) && self.nodes.contains_key(&wire.target_id()),
            "wire {id} held a dangling endpoint"
        );
        if let Some(node) = self.nodes.get_mut(&wire.source_id()) {
            node.unregister_wire(id);
        }
        if let Some(node) = self.nodes.get_mut(&wire.target_id()) {
            node.unregister_wire(id);
        }
        Ok(wire)
    }

    /// Remove a node and every wire incident on it.
    ///
    /// Returns the removed node together with the removed wires, in wire
    /// registration order, so the caller can invalidate surviving targets.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(Node, Vec<Wire>), GraphError> {
        let incident: Vec<WireId> = {
            let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound { id })?;
            self.wire_order
                .iter()
                .copied()
                .filter(|w| node.inputs().contains(w) || node.outputs().contains(w))
                .collect()
        };

        let mut removed_wires = Vec::with_capacity(incident.len());
        for wire_id in incident {
            removed_wires.push(self.remove_wire(wire_id)?);
        }

        let node = self
            .nodes
            .remove(&id)
            .ok_or(GraphError::NodeNotFound { id })?;
        self.node_order.retain(|n| *n != id);
        Ok((node, removed_wires))
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Look up a wire by id.
    pub fn wire(&self, id: WireId) -> Option<&Wire> {
        self.wires.get(&id)
    }

    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    /// Iterate nodes in insertion order.
    pub fn nodes(&self) -> NodesIter<'_> {
        NodesIter {
            order: self.node_order.iter(),
            nodes: &self.nodes,
        }
    }

    /// Iterate wires in registration order.
    pub fn wires(&self) -> WiresIter<'_> {
        WiresIter {
            order: self.wire_order.iter(),
            wires: &self.wires,
        }
    }

    /// Node ids in insertion order.
    pub(crate) fn node_order(&self) -> &[NodeId] {
        &self.node_order
    }

    /// Incoming wires of a node, in registration order.
    pub fn incoming_wires(&self, id: NodeId) -> Vec<&Wire> {
        self.node(id)
            .map(|node| {
                node.inputs()
                    .iter()
                    .filter_map(|w| self.wires.get(w))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Outgoing wires of a node, in registration order.
    pub fn outgoing_wires(&self, id: NodeId) -> Vec<&Wire> {
        self.node(id)
            .map(|node| {
                node.outputs()
                    .iter()
                    .filter_map(|w| self.wires.get(w))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a directed path `from -> ... -> to` exists, following
    /// outgoing wires. Reflexive: a node always reaches itself.
    ///
    /// Iterative with a visited set, so diamond fan-outs are walked once and
    /// the search short-circuits on the first hit.
    #[must_use]
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        visited.insert(from);
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for wire_id in node.outputs() {
                let Some(wire) = self.wires.get(wire_id) else {
                    debug_assert!(false, "adjacency listed unknown wire {wire_id}");
                    continue;
                };
                let next = wire.target_id();
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Re-attach a wire restored from a snapshot, preserving its id.
    ///
    /// Runs the same structural checks as a fresh connect, so a tampered
    /// snapshot cannot smuggle in a cycle or an origin-targeting wire.
    pub(crate) fn attach_restored_wire(&mut self, wire: Wire) -> Result<WireId, GraphError> {
        self.check_wire_endpoints(wire.source_id(), wire.target_id())?;
        Ok(self.register_wire(wire))
    }

    fn check_wire_endpoints(&self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::NodeNotFound { id: source });
        }
        let target_node = self
            .nodes
            .get(&target)
            .ok_or(GraphError::NodeNotFound { id: target })?;
        if target_node.is_origin() {
            return Err(GraphError::OriginTarget { target });
        }
        // Cycle guard: a pre-existing path target -> source means the new
        // wire would close a loop. Covers self-wires via reflexivity.
        if self.reaches(target, source) {
            return Err(GraphError::CycleDetected { source, target });
        }
        Ok(())
    }

    fn register_wire(&mut self, wire: Wire) -> WireId {
        let id = wire.id();
        let source = wire.source_id();
        let target = wire.target_id();
        self.wires.insert(id, wire);
        self.wire_order.push(id);
        if let Some(node) = self.nodes.get_mut(&source) {
            node.register_output(id);
        }
        if let Some(node) = self.nodes.get_mut(&target) {
            node.register_input(id);
        }
        id
    }
}

/// Iterator over nodes in insertion order.
pub struct NodesIter<'a> {
    order: std::slice::Iter<'a, NodeId>,
    nodes: &'a FxHashMap<NodeId, Node>,
}

impl<'a> Iterator for NodesIter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.order.next()?;
        let node = self.nodes.get(id);
        debug_assert!(node.is_some(), "node order listed unknown node {id}");
        node
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<'a> ExactSizeIterator for NodesIter<'a> {}

/// Iterator over wires in registration order.
pub struct WiresIter<'a> {
    order: std::slice::Iter<'a, WireId>,
    wires: &'a FxHashMap<WireId, Wire>,
}

impl<'a> Iterator for WiresIter<'a> {
    type Item = &'a Wire;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.order.next()?;
        let wire = self.wires.get(id);
        debug_assert!(wire.is_some(), "wire order listed unknown wire {id}");
        wire
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<'a> ExactSizeIterator for WiresIter<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn chain(graph: &mut Graph, kinds: &[NodeKind]) -> Vec<NodeId> {
        let ids: Vec<NodeId> = kinds
            .iter()
            .map(|k| graph.add_node(Node::new(k.clone())))
            .collect();
        for pair in ids.windows(2) {
            graph.connect(pair[0], pair[1]).unwrap();
        }
        ids
    }

    #[test]
    fn connect_registers_both_adjacency_lists() {
        let mut graph = Graph::new();
        let ids = chain(
            &mut graph,
            &[NodeKind::CollectionRead, NodeKind::Filter],
        );
        let source = graph.node(ids[0]).unwrap();
        let target = graph.node(ids[1]).unwrap();
        assert_eq!(source.outputs().len(), 1);
        assert_eq!(target.inputs().len(), 1);
        assert_eq!(source.outputs()[0], target.inputs()[0]);
    }

    #[test]
    fn connect_refuses_missing_endpoints() {
        let mut graph = Graph::new();
        let real = graph.add_node(Node::new(NodeKind::Filter));
        let ghost = NodeId::new();
        assert!(matches!(
            graph.connect(ghost, real),
            Err(GraphError::NodeNotFound { .. })
        ));
        assert!(matches!(
            graph.connect(real, ghost),
            Err(GraphError::NodeNotFound { .. })
        ));
        assert_eq!(graph.wire_count(), 0);
    }

    #[test]
    fn connect_refuses_origin_targets() {
        let mut graph = Graph::new();
        let filter = graph.add_node(Node::new(NodeKind::Filter));
        let origin = graph.add_node(Node::new(NodeKind::Query));
        assert!(matches!(
            graph.connect(filter, origin),
            Err(GraphError::OriginTarget { .. })
        ));
        assert_eq!(graph.wire_count(), 0);
    }

    #[test]
    fn connect_refuses_cycles_and_self_wires() {
        let mut graph = Graph::new();
        let ids = chain(
            &mut graph,
            &[NodeKind::CollectionRead, NodeKind::Filter, NodeKind::Aggregate],
        );
        assert!(matches!(
            graph.connect(ids[2], ids[1]),
            Err(GraphError::CycleDetected { .. })
        ));
        assert!(matches!(
            graph.connect(ids[1], ids[1]),
            Err(GraphError::CycleDetected { .. })
        ));
        assert_eq!(graph.wire_count(), 2);
    }

    #[test]
    fn diamond_reconvergence_is_not_a_cycle() {
        let mut graph = Graph::new();
        let origin = graph.add_node(Node::new(NodeKind::CollectionRead));
        let left = graph.add_node(Node::new(NodeKind::Filter));
        let right = graph.add_node(Node::new(NodeKind::Sort));
        let merge = graph.add_node(Node::new(NodeKind::Merge));
        graph.connect(origin, left).unwrap();
        graph.connect(origin, right).unwrap();
        graph.connect(left, merge).unwrap();
        graph.connect(right, merge).unwrap();
        assert_eq!(graph.wire_count(), 4);
        assert!(graph.reaches(origin, merge));
        assert!(!graph.reaches(merge, origin));
    }

    #[test]
    fn remove_wire_detaches_both_endpoints() {
        let mut graph = Graph::new();
        let ids = chain(&mut graph, &[NodeKind::Query, NodeKind::Filter]);
        let wire_id = graph.node(ids[0]).unwrap().outputs()[0];
        let removed = graph.remove_wire(wire_id).unwrap();
        assert_eq!(removed.target_id(), ids[1]);
        assert!(graph.node(ids[0]).unwrap().outputs().is_empty());
        assert!(graph.node(ids[1]).unwrap().inputs().is_empty());
        assert!(matches!(
            graph.remove_wire(wire_id),
            Err(GraphError::WireNotFound { .. })
        ));
    }

    #[test]
    fn remove_node_cleans_every_incident_wire() {
        let mut graph = Graph::new();
        let origin = graph.add_node(Node::new(NodeKind::CollectionRead));
        let middle = graph.add_node(Node::new(NodeKind::Filter));
        let left = graph.add_node(Node::new(NodeKind::Preview));
        let right = graph.add_node(Node::new(NodeKind::Export));
        graph.connect(origin, middle).unwrap();
        graph.connect(middle, left).unwrap();
        graph.connect(middle, right).unwrap();

        let (removed, wires) = graph.remove_node(middle).unwrap();
        assert_eq!(removed.id(), middle);
        assert_eq!(wires.len(), 3);
        assert_eq!(graph.wire_count(), 0);
        for survivor in [origin, left, right] {
            let node = graph.node(survivor).unwrap();
            assert!(node.inputs().is_empty() && node.outputs().is_empty());
        }
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut graph = Graph::new();
        let ids = chain(
            &mut graph,
            &[NodeKind::Query, NodeKind::Filter, NodeKind::Export],
        );
        let seen: Vec<NodeId> = graph.nodes().map(Node::id).collect();
        assert_eq!(seen, ids);
        assert_eq!(graph.nodes().len(), 3);
    }
}
