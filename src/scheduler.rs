//! Scheduling algorithms over pipeline graphs.
//!
//! Everything here is an explicit worklist/stack iteration with a bounded
//! visited set; none of the walks recurse, so deep chains cannot overflow
//! the stack and diamond fan-ins terminate.
//!
//! - [`topological_order`]: the whole-graph execution order
//! - [`downstream_of`]: the forward closure of one node
//! - [`propagate_stale`]: transitive invalidation along outgoing wires
//!
//! # Determinism
//!
//! Orders among mutually independent nodes are decided by node insertion
//! order and wire registration order, so repeated runs over the same
//! mutation history produce identical traces.

use rustc_hash::FxHashSet;
use tracing::instrument;

use crate::graph::Graph;
use crate::types::NodeId;

/// Compute a full topological order of the graph: every wire's source
/// precedes its target.
///
/// Depth-first post-order driven by incoming wires (inputs before self),
/// rooted at each node in insertion order and memoized by a visited set so
/// shared ancestors are emitted exactly once.
///
/// Assumes the graph is acyclic, which the connect-time cycle guard
/// enforces.
///
/// # Examples
///
/// ```rust
/// use wireloom::graph::Graph;
/// use wireloom::node::Node;
/// use wireloom::scheduler::topological_order;
/// use wireloom::types::NodeKind;
///
/// let mut graph = Graph::new();
/// let count = graph.add_node(Node::new(NodeKind::Aggregate));
/// let rows = graph.add_node(Node::new(NodeKind::CollectionRead));
/// graph.connect(rows, count).unwrap();
///
/// // The source precedes its target even though it was inserted later.
/// assert_eq!(topological_order(&graph), vec![rows, count]);
/// ```
#[instrument(skip(graph), level = "debug", fields(nodes = graph.node_count()))]
#[must_use]
pub fn topological_order(graph: &Graph) -> Vec<NodeId> {
    enum Frame {
        Enter(NodeId),
        Exit(NodeId),
    }

    let mut order = Vec::with_capacity(graph.node_count());
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();

    for &root in graph.node_order() {
        if visited.contains(&root) {
            continue;
        }
        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if !visited.insert(id) {
                        continue;
                    }
                    stack.push(Frame::Exit(id));
                    // Reversed so the first-registered input is walked first.
                    for wire in graph.incoming_wires(id).into_iter().rev() {
                        let source = wire.source_id();
                        if !visited.contains(&source) {
                            stack.push(Frame::Enter(source));
                        }
                    }
                }
                Frame::Exit(id) => order.push(id),
            }
        }
    }

    debug_assert_eq!(order.len(), graph.node_count());
    order
}

/// Collect every node reachable from `start` via outgoing wires, each
/// exactly once, excluding `start` itself.
///
/// The order is forward discovery order; callers wanting a dependency-safe
/// execution order filter [`topological_order`] by this closure instead.
#[must_use]
pub fn downstream_of(graph: &Graph, start: NodeId) -> Vec<NodeId> {
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(start);
    let mut stack = vec![start];
    let mut closure = Vec::new();

    while let Some(current) = stack.pop() {
        for wire in graph.outgoing_wires(current) {
            let next = wire.target_id();
            if visited.insert(next) {
                closure.push(next);
                stack.push(next);
            }
        }
    }
    closure
}

/// Propagate staleness from an already-invalidated node to everything
/// downstream of it.
///
/// For each outgoing wire the target is marked stale; only targets whose
/// state actually changed are expanded further, and the visited set keeps a
/// node from being re-marked within one propagation even when an earlier
/// branch of a diamond already left it stale. Running nodes suppress the
/// mark and stop the walk on their branch.
///
/// Returns the ids whose state changed, in mark order, so callers can emit
/// one state-change notification per transition.
#[instrument(skip(graph), level = "debug")]
pub fn propagate_stale(graph: &mut Graph, from: NodeId) -> Vec<NodeId> {
    let mut changed = Vec::new();
    let mut visited: FxHashSet<NodeId> = FxHashSet::default();
    visited.insert(from);
    let mut worklist = vec![from];

    while let Some(current) = worklist.pop() {
        let targets: Vec<NodeId> = graph
            .outgoing_wires(current)
            .iter()
            .map(|wire| wire.target_id())
            .collect();
        for next in targets {
            if !visited.insert(next) {
                continue;
            }
            let Some(node) = graph.node_mut(next) else {
                debug_assert!(false, "wire targeted unknown node {next}");
                continue;
            };
            if node.mark_stale() {
                changed.push(next);
                worklist.push(next);
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExecutionState, Node};
    use crate::types::NodeKind;

    fn diamond(graph: &mut Graph) -> [NodeId; 4] {
        let top = graph.add_node(Node::new(NodeKind::CollectionRead));
        let left = graph.add_node(Node::new(NodeKind::Filter));
        let right = graph.add_node(Node::new(NodeKind::Sort));
        let bottom = graph.add_node(Node::new(NodeKind::Merge));
        graph.connect(top, left).unwrap();
        graph.connect(top, right).unwrap();
        graph.connect(left, bottom).unwrap();
        graph.connect(right, bottom).unwrap();
        [top, left, right, bottom]
    }

    #[test]
    fn topological_order_respects_every_wire() {
        let mut graph = Graph::new();
        let [top, left, right, bottom] = diamond(&mut graph);
        let order = topological_order(&graph);
        let pos = |id: NodeId| order.iter().position(|n| *n == id).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos(top) < pos(left));
        assert!(pos(top) < pos(right));
        assert!(pos(left) < pos(bottom));
        assert!(pos(right) < pos(bottom));
    }

    #[test]
    fn independent_subgraphs_keep_insertion_order() {
        let mut graph = Graph::new();
        let c = graph.add_node(Node::new(NodeKind::Query));
        let a = graph.add_node(Node::new(NodeKind::Query));
        let b = graph.add_node(Node::new(NodeKind::Query));
        assert_eq!(topological_order(&graph), vec![c, a, b]);
        // Stable across repeated calls.
        assert_eq!(topological_order(&graph), vec![c, a, b]);
    }

    #[test]
    fn shared_ancestors_are_emitted_once() {
        let mut graph = Graph::new();
        let [top, ..] = diamond(&mut graph);
        let order = topological_order(&graph);
        assert_eq!(order.iter().filter(|id| **id == top).count(), 1);
    }

    #[test]
    fn downstream_excludes_the_start_node() {
        let mut graph = Graph::new();
        let [top, left, right, bottom] = diamond(&mut graph);
        let closure = downstream_of(&graph, top);
        assert_eq!(closure.len(), 3);
        assert!(!closure.contains(&top));
        for id in [left, right, bottom] {
            assert!(closure.contains(&id));
        }
        assert!(downstream_of(&graph, bottom).is_empty());
    }

    #[test]
    fn propagation_marks_the_full_closure_and_no_ancestor() {
        let mut graph = Graph::new();
        let [top, left, right, bottom] = diamond(&mut graph);
        for id in [top, left, right, bottom] {
            graph.node_mut(id).unwrap().begin_run();
            graph.node_mut(id).unwrap().complete(serde_json::json!([]));
        }

        graph.node_mut(left).unwrap().mark_stale();
        let changed = propagate_stale(&mut graph, left);
        assert_eq!(changed, vec![bottom]);
        assert_eq!(
            graph.node(top).unwrap().execution_state(),
            ExecutionState::Success
        );
        assert_eq!(
            graph.node(right).unwrap().execution_state(),
            ExecutionState::Success
        );
        assert_eq!(
            graph.node(bottom).unwrap().execution_state(),
            ExecutionState::Stale
        );
    }

    #[test]
    fn propagation_is_idempotent_and_terminates_on_diamonds() {
        let mut graph = Graph::new();
        let [top, left, right, bottom] = diamond(&mut graph);

        graph.node_mut(top).unwrap().mark_stale();
        let first = propagate_stale(&mut graph, top);
        assert_eq!(first.len(), 3);

        let second = propagate_stale(&mut graph, top);
        assert!(second.is_empty());
        for id in [left, right, bottom] {
            assert_eq!(
                graph.node(id).unwrap().execution_state(),
                ExecutionState::Stale
            );
        }
    }

    #[test]
    fn propagation_stops_at_running_nodes() {
        let mut graph = Graph::new();
        let [top, left, _right, bottom] = diamond(&mut graph);
        graph.node_mut(left).unwrap().begin_run();

        graph.node_mut(top).unwrap().mark_stale();
        let changed = propagate_stale(&mut graph, top);
        // The running node suppresses its mark; its branch does not expand,
        // but the other branch still reaches the bottom of the diamond.
        assert!(!changed.contains(&left));
        assert!(changed.contains(&bottom));
        assert_eq!(
            graph.node(left).unwrap().execution_state(),
            ExecutionState::Running
        );
    }
}
