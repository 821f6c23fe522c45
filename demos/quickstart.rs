//! Quickstart: build a board, run it, inspect the caches.
//!
//! This example shows how to:
//! - Seed a pipeline with an embedded-data origin
//! - Wire a filter and an aggregate behind it
//! - Execute the whole board and read cached outputs
//! - Reconfigure a node and re-run only the stale slice
//!
//! Run with: `cargo run --example quickstart`

use miette::Result;
use serde_json::json;
use tracing::info;
use wireloom::event_bus::EventBus;
use wireloom::node::Node;
use wireloom::pipeline::Pipeline;
use wireloom::types::{NodeKind, RunMode};

fn init_miette() {
    // Pretty panic reports
    miette::set_panic_hook();
}

#[tokio::main]
async fn main() -> Result<()> {
    wireloom::telemetry::init();
    init_miette();

    info!("🚀 Wireloom Quickstart");
    info!("======================");

    // Route node chatter and run summaries through tracing.
    let bus = EventBus::default();
    bus.listen_for_events();

    // Manual mode keeps the engine from re-running after every edit below.
    let mut pipeline = Pipeline::new("quickstart")
        .with_run_mode(RunMode::Manual)
        .with_event_bus(&bus);

    // An embedded-data origin with a handful of ticket rows.
    let tickets = pipeline.add_node(Node::new(NodeKind::ExternalImport).with_config([(
        "data".to_string(),
        json!([
            {"id": "t1", "severity": "high",   "hours": 4},
            {"id": "t2", "severity": "low",    "hours": 1},
            {"id": "t3", "severity": "high",   "hours": 7},
            {"id": "t4", "severity": "medium", "hours": 2},
        ]),
    )]));

    // Keep only the high-severity tickets.
    let high = pipeline.add_node(Node::new(NodeKind::Filter).with_config([
        ("field".to_string(), json!("severity")),
        ("operator".to_string(), json!("eq")),
        ("value".to_string(), json!("high")),
    ]));

    // Count what is left.
    let count = pipeline
        .add_node(Node::new(NodeKind::Aggregate).with_config([(
            "function".to_string(),
            json!("count"),
        )]));

    pipeline.connect(tickets, high)?;
    pipeline.connect(high, count)?;

    info!("\n▶ First run (origin → filter → count)");
    let summary = pipeline.execute_all().await;
    info!(
        "  ✅ {} executed, {} failed",
        summary.executed, summary.failed
    );
    info!(
        "  ✅ high-severity count: {:?}",
        pipeline.node(count).and_then(Node::cached_output)
    );

    // Swap the filter to an hours threshold. Only the filter and the
    // aggregate go stale; the origin keeps its cache.
    info!("\n▶ Reconfiguring the filter (hours > 3)");
    pipeline.configure_node(
        high,
        [
            ("field".to_string(), json!("hours")),
            ("operator".to_string(), json!("gt")),
            ("value".to_string(), json!(3)),
        ]
        .into_iter()
        .collect(),
    )?;

    let summary = pipeline.execute_from(high).await?;
    info!(
        "  ✅ {} executed, {} failed (origin untouched)",
        summary.executed, summary.failed
    );
    info!(
        "  ✅ long-running count: {:?}",
        pipeline.node(count).and_then(Node::cached_output)
    );

    // Give the listener a moment to drain, then shut everything down.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    bus.stop_listener().await;
    pipeline.teardown();

    info!("\n✅ Quickstart complete");
    Ok(())
}
