//! Benchmarks for the scheduling core.
//!
//! These benchmarks measure the performance of:
//! - Staleness propagation along outgoing wires
//! - Topological ordering
//! - Downstream closure discovery
//! - Whole-graph execution through the pipeline run loop
//! - petgraph conversion (when feature enabled)

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use wireloom::graph::Graph;
use wireloom::node::Node;
use wireloom::pipeline::Pipeline;
use wireloom::scheduler::{downstream_of, propagate_stale, topological_order};
use wireloom::types::{NodeId, NodeKind, RunMode};

/// Passthrough stage; unregistered kinds dispatch to the identity
/// executor, so execution benchmarks measure engine overhead.
fn stage(i: usize) -> Node {
    Node::new(NodeKind::Custom(format!("stage{i}")))
}

/// stage0 -> stage1 -> ... in one chain. Returns the head.
fn linear_graph(len: usize) -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let ids: Vec<NodeId> = (0..len).map(|i| graph.add_node(stage(i))).collect();
    for pair in ids.windows(2) {
        graph.connect(pair[0], pair[1]).unwrap();
    }
    (graph, ids[0])
}

/// One hub wired into `width` consumers. Returns the hub.
fn fanout_graph(width: usize) -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let hub = graph.add_node(stage(0));
    for i in 0..width {
        let worker = graph.add_node(stage(i + 1));
        graph.connect(hub, worker).unwrap();
    }
    (graph, hub)
}

/// `depth` layers of `width` nodes, each layer fully wired into the
/// next. Returns a first-layer node.
fn layered_graph(depth: usize, width: usize) -> (Graph, NodeId) {
    let mut graph = Graph::new();
    let mut first = None;
    let mut prev: Vec<NodeId> = Vec::new();
    for layer in 0..depth {
        let current: Vec<NodeId> = (0..width)
            .map(|i| graph.add_node(stage(layer * width + i)))
            .collect();
        if first.is_none() {
            first = Some(current[0]);
        }
        for &from in &prev {
            for &to in &current {
                graph.connect(from, to).unwrap();
            }
        }
        prev = current;
    }
    (graph, first.expect("at least one layer"))
}

/// Manual-mode pipeline: one embedded-data origin feeding a chain of
/// passthrough stages.
fn chain_pipeline(len: usize) -> Pipeline {
    let mut pipeline = Pipeline::new("bench").with_run_mode(RunMode::Manual);
    let mut prev = pipeline.add_node(
        Node::new(NodeKind::ExternalImport)
            .with_config([("data".to_string(), json!([{"n": 1}]))]),
    );
    for i in 1..len {
        let next = pipeline.add_node(stage(i));
        pipeline.connect(prev, next).unwrap();
        prev = next;
    }
    pipeline
}

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("staleness_propagation");

    for size in [10, 100, 500] {
        let (graph, head) = linear_graph(size);
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, _| {
            b.iter_batched(
                || graph.clone(),
                |mut graph| propagate_stale(&mut graph, head),
                BatchSize::SmallInput,
            );
        });
    }

    for width in [10, 100, 500] {
        let (graph, hub) = fanout_graph(width);
        group.bench_with_input(BenchmarkId::new("fanout", width), &width, |b, _| {
            b.iter_batched(
                || graph.clone(),
                |mut graph| propagate_stale(&mut graph, hub),
                BatchSize::SmallInput,
            );
        });
    }

    for (depth, width) in [(5, 10), (10, 10)] {
        let (graph, entry) = layered_graph(depth, width);
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{depth}x{width}")),
            &(depth, width),
            |b, _| {
                b.iter_batched(
                    || graph.clone(),
                    |mut graph| propagate_stale(&mut graph, entry),
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_topological_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_order");

    for size in [10, 100, 500] {
        let (graph, _) = linear_graph(size);
        group.bench_with_input(BenchmarkId::new("chain", size), &graph, |b, graph| {
            b.iter(|| topological_order(graph));
        });
    }

    for (depth, width) in [(5, 10), (10, 10)] {
        let (graph, _) = layered_graph(depth, width);
        group.bench_with_input(
            BenchmarkId::new("layered", format!("{depth}x{width}")),
            &graph,
            |b, graph| {
                b.iter(|| topological_order(graph));
            },
        );
    }

    group.finish();
}

fn bench_downstream_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("downstream_closure");

    for size in [10, 100, 500] {
        let (graph, head) = linear_graph(size);
        group.bench_with_input(BenchmarkId::new("chain", size), &graph, |b, graph| {
            b.iter(|| downstream_of(graph, head));
        });
    }

    group.finish();
}

fn bench_execute_all(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("pipeline_execute");

    for size in [10, 50] {
        group.bench_with_input(BenchmarkId::new("chain", size), &size, |b, &size| {
            b.to_async(&rt).iter_batched(
                || chain_pipeline(size),
                |mut pipeline| async move { pipeline.execute_all().await },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

#[cfg(feature = "petgraph-compat")]
fn bench_petgraph_conversion(c: &mut Criterion) {
    use wireloom::petgraph_compat::{is_cyclic, to_dot, to_petgraph};

    let mut group = c.benchmark_group("petgraph_compat");

    for size in [10, 100] {
        let (graph, _) = linear_graph(size);
        group.bench_with_input(BenchmarkId::new("to_petgraph", size), &graph, |b, graph| {
            b.iter(|| to_petgraph(graph));
        });
        group.bench_with_input(BenchmarkId::new("to_dot", size), &graph, |b, graph| {
            b.iter(|| to_dot(graph));
        });
        group.bench_with_input(BenchmarkId::new("is_cyclic", size), &graph, |b, graph| {
            b.iter(|| is_cyclic(graph));
        });
    }

    group.finish();
}

#[cfg(feature = "petgraph-compat")]
criterion_group!(
    benches,
    bench_propagation,
    bench_topological_order,
    bench_downstream_closure,
    bench_execute_all,
    bench_petgraph_conversion,
);

#[cfg(not(feature = "petgraph-compat"))]
criterion_group!(
    benches,
    bench_propagation,
    bench_topological_order,
    bench_downstream_closure,
    bench_execute_all,
);

criterion_main!(benches);
