mod common;

use common::*;
use serde_json::json;
use wireloom::node::{ExecutionState, Node};
use wireloom::scheduler::{downstream_of, topological_order};
use wireloom::types::{NodeId, NodeKind};

/// Two origins feeding a passthrough middle layer that reconverges on a sink.
fn layered(pipeline: &mut wireloom::pipeline::Pipeline) -> Vec<NodeId> {
    let a = pipeline.add_node(import_node(json!(["a"])));
    let b = pipeline.add_node(import_node(json!(["b"])));
    let upper = pipeline.add_node(Node::new(NodeKind::Transform));
    let lower = pipeline.add_node(Node::new(NodeKind::Window));
    let sink = pipeline.add_node(Node::new(NodeKind::Merge));
    pipeline.connect(a, upper).unwrap();
    pipeline.connect(b, upper).unwrap();
    pipeline.connect(b, lower).unwrap();
    pipeline.connect(upper, sink).unwrap();
    pipeline.connect(lower, sink).unwrap();
    vec![a, b, upper, lower, sink]
}

#[test]
fn every_wire_source_precedes_its_target() {
    let mut pipeline = manual_pipeline("topo");
    layered(&mut pipeline);

    let order = topological_order(pipeline.graph());
    assert_eq!(order.len(), pipeline.graph().node_count());
    let pos =
        |id: NodeId| order.iter().position(|n| *n == id).expect("node in order");
    for wire in pipeline.graph().wires() {
        assert!(
            pos(wire.source_id()) < pos(wire.target_id()),
            "wire {} out of order",
            wire.id()
        );
    }
}

#[test]
fn ordering_is_stable_across_calls() {
    let mut pipeline = manual_pipeline("stable");
    layered(&mut pipeline);
    let first = topological_order(pipeline.graph());
    let second = topological_order(pipeline.graph());
    assert_eq!(first, second);
}

#[test]
fn downstream_closure_ignores_unrelated_branches() {
    let mut pipeline = manual_pipeline("closure");
    let ids = layered(&mut pipeline);
    let outsider = pipeline.add_node(import_node(json!(["x"])));

    let closure = downstream_of(pipeline.graph(), ids[1]);
    assert!(closure.contains(&ids[2]));
    assert!(closure.contains(&ids[3]));
    assert!(closure.contains(&ids[4]));
    assert!(!closure.contains(&ids[0]));
    assert!(!closure.contains(&outsider));
    assert!(!closure.contains(&ids[1]));
}

#[tokio::test]
async fn invalidation_covers_the_closure_and_nothing_upstream() {
    let mut pipeline = manual_pipeline("staleness");
    let ids = layered(&mut pipeline);
    pipeline.execute_all().await;
    for &id in &ids {
        assert_eq!(
            pipeline.node(id).unwrap().execution_state(),
            ExecutionState::Success
        );
    }

    // Reconfiguring `b` spoils both layers under it but never its peer `a`.
    pipeline
        .configure_node(ids[1], Default::default())
        .unwrap();
    for &id in &ids[1..] {
        assert_eq!(
            pipeline.node(id).unwrap().execution_state(),
            ExecutionState::Stale
        );
    }
    assert_eq!(
        pipeline.node(ids[0]).unwrap().execution_state(),
        ExecutionState::Success
    );
}
