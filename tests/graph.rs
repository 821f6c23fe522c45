mod common;

use common::*;
use serde_json::json;
use wireloom::graph::GraphError;
use wireloom::node::Node;
use wireloom::types::NodeKind;

#[test]
fn refused_wires_leave_the_graph_untouched() {
    let mut pipeline = manual_pipeline("guards");
    let rows = pipeline.add_node(import_node(staff()));
    let filter = pipeline.add_node(filter_node("dept", "eq", json!("eng")));
    let count = pipeline.add_node(count_node());
    pipeline.connect(rows, filter).unwrap();
    pipeline.connect(filter, count).unwrap();
    let before = pipeline.graph().wire_count();

    // Wiring back into the origin is refused.
    assert!(matches!(
        pipeline.connect(count, rows),
        Err(GraphError::OriginTarget { .. })
    ));
    // Wiring back into an upstream non-origin closes a cycle.
    assert!(matches!(
        pipeline.connect(count, filter),
        Err(GraphError::CycleDetected { .. })
    ));
    assert_eq!(pipeline.graph().wire_count(), before);
}

#[test]
fn removing_a_node_leaves_no_dangling_wires() {
    let mut pipeline = manual_pipeline("removal");
    let rows = pipeline.add_node(import_node(staff()));
    let hub = pipeline.add_node(filter_node("dept", "eq", json!("eng")));
    let left = pipeline.add_node(Node::new(NodeKind::Preview));
    let right = pipeline.add_node(count_node());
    let into_hub = pipeline.connect(rows, hub).unwrap();
    let out_left = pipeline.connect(hub, left).unwrap();
    let out_right = pipeline.connect(hub, right).unwrap();

    let (removed, wires) = {
        let node = pipeline.remove_node(hub).unwrap();
        (node, [into_hub, out_left, out_right])
    };
    assert_eq!(removed.id(), hub);
    assert_eq!(pipeline.graph().wire_count(), 0);
    for wire in wires {
        assert!(pipeline.graph().wire(wire).is_none());
    }
    for survivor in [rows, left, right] {
        let node = pipeline.node(survivor).unwrap();
        assert!(node.inputs().is_empty());
        assert!(node.outputs().is_empty());
    }
}

#[test]
fn ported_wires_keep_their_port_names() {
    let mut pipeline = manual_pipeline("ports");
    let branch = pipeline.add_node(Node::new(NodeKind::Branch));
    let sink = pipeline.add_node(Node::new(NodeKind::Preview));
    let wire = pipeline
        .connect_with_ports(branch, sink, "false", "in")
        .unwrap();

    let stored = pipeline.graph().wire(wire).unwrap();
    assert_eq!(stored.source_port(), "false");
    assert_eq!(stored.target_port(), "in");
    assert!(!stored.uses_default_source_port());
}

#[test]
fn incoming_wires_follow_registration_order_across_rewires() {
    let mut pipeline = manual_pipeline("ordering");
    let left = pipeline.add_node(import_node(json!(["l"])));
    let right = pipeline.add_node(import_node(json!(["r"])));
    let join = pipeline.add_node(Node::new(NodeKind::Merge));
    let first = pipeline.connect(left, join).unwrap();
    pipeline.connect(right, join).unwrap();

    let sources: Vec<_> = pipeline
        .graph()
        .incoming_wires(join)
        .iter()
        .map(|w| w.source_id())
        .collect();
    assert_eq!(sources, vec![left, right]);

    // Disconnect and re-connect the left input; it now gathers last.
    pipeline.disconnect(first).unwrap();
    pipeline.connect(left, join).unwrap();
    let sources: Vec<_> = pipeline
        .graph()
        .incoming_wires(join)
        .iter()
        .map(|w| w.source_id())
        .collect();
    assert_eq!(sources, vec![right, left]);
}
