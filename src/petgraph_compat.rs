//! Optional petgraph compatibility layer.
//!
//! Converts a pipeline [`Graph`] into petgraph's `DiGraph`, opening the
//! door to petgraph's algorithm library for analysis and to DOT export
//! for visualization. Node weights are [`NodeId`]s and edge weights are
//! [`WireId`]s, so results map straight back onto the pipeline.
//!
//! # Feature Gate
//!
//! Only available with the `petgraph-compat` feature:
//!
//! ```toml
//! [dependencies]
//! wireloom = { version = "0.1", features = ["petgraph-compat"] }
//! ```
//!
//! # Examples
//!
//! ```ignore
//! use wireloom::petgraph_compat::{is_cyclic, to_dot, to_petgraph};
//!
//! let conversion = to_petgraph(pipeline.graph());
//! assert!(!is_cyclic(pipeline.graph()));
//! std::fs::write("pipeline.dot", to_dot(pipeline.graph()))?;
//! // Then: dot -Tpng pipeline.dot -o pipeline.png
//! ```

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::graph::Graph;
use crate::types::{NodeId, WireId};

/// Petgraph rendition of a pipeline graph.
pub type PipelineDiGraph = DiGraph<NodeId, WireId>;

/// Mapping from pipeline node ids to petgraph indices.
pub type NodeIndexMap = FxHashMap<NodeId, NodeIndex>;

/// Result of converting a pipeline graph to petgraph form.
#[derive(Debug, Clone)]
pub struct PetgraphConversion {
    /// The petgraph directed graph.
    pub graph: PipelineDiGraph,
    /// Lookup from pipeline node id to petgraph index.
    pub index_map: NodeIndexMap,
}

impl PetgraphConversion {
    #[must_use]
    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.index_map.get(&id).copied()
    }

    #[must_use]
    pub fn node_at(&self, index: NodeIndex) -> Option<NodeId> {
        self.graph.node_weight(index).copied()
    }
}

/// Convert a pipeline graph to a petgraph `DiGraph`.
///
/// Nodes convert in insertion order and wires in registration order, so
/// indices are deterministic for a given mutation history.
#[must_use]
pub fn to_petgraph(graph: &Graph) -> PetgraphConversion {
    let mut digraph = DiGraph::new();
    let mut index_map: NodeIndexMap = FxHashMap::default();

    for node in graph.nodes() {
        let index = digraph.add_node(node.id());
        index_map.insert(node.id(), index);
    }
    for wire in graph.wires() {
        let source = index_map[&wire.source_id()];
        let target = index_map[&wire.target_id()];
        digraph.add_edge(source, target, wire.id());
    }

    PetgraphConversion {
        graph: digraph,
        index_map,
    }
}

/// Cycle check via petgraph, usable as a cross-check of the engine's own
/// connect-time guard. Always `false` for graphs built through
/// [`Graph::connect`].
#[must_use]
pub fn is_cyclic(graph: &Graph) -> bool {
    let conversion = to_petgraph(graph);
    petgraph::algo::is_cyclic_directed(&conversion.graph)
}

/// Export a pipeline graph to DOT for rendering with Graphviz.
///
/// Nodes are labelled `label (kind)`; origin nodes are tinted green and
/// emission-family nodes coral so entry and exit points stand out.
#[must_use]
pub fn to_dot(graph: &Graph) -> String {
    use crate::types::NodeFamily;
    use std::fmt::Write;

    let conversion = to_petgraph(graph);
    let mut output = String::new();

    writeln!(output, "digraph {{").unwrap();
    writeln!(output, "    rankdir=TB;").unwrap();
    writeln!(output, "    node [shape=box, style=rounded];").unwrap();

    for index in conversion.graph.node_indices() {
        let Some(node) = conversion.node_at(index).and_then(|id| graph.node(id)) else {
            continue;
        };
        let label = format!("{} ({})", node.label(), node.kind()).replace('"', "\\\"");
        let style = match node.kind().family() {
            NodeFamily::Origin => " style=\"filled\" fillcolor=\"lightgreen\"",
            NodeFamily::Emission => " style=\"filled\" fillcolor=\"lightcoral\"",
            _ => "",
        };
        writeln!(
            output,
            "    {} [ label=\"{}\"{} ];",
            index.index(),
            label,
            style
        )
        .unwrap();
    }

    writeln!(output).unwrap();

    for edge in conversion.graph.edge_indices() {
        let (from, to) = conversion.graph.edge_endpoints(edge).unwrap();
        writeln!(output, "    {} -> {};", from.index(), to.index()).unwrap();
    }

    writeln!(output, "}}").unwrap();
    output
}
