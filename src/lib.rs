//! # Wireloom: Dataflow Pipeline Engine
//!
//! Wireloom is an engine for directed dataflow pipelines: nodes carry
//! configuration and cached output, wires carry values between named ports,
//! and a scheduler keeps execution deterministic, cycle-free, and aware of
//! exactly which caches a mutation spoiled.
//!
//! ## Core Concepts
//!
//! - **Nodes**: Configured units of work with a cached output and an
//!   execution state (`idle`, `stale`, `running`, `success`, `error`)
//! - **Wires**: Directed, ported connections; a node's input is gathered
//!   from its incoming wires in registration order
//! - **Graph**: The mutable node/wire store, refusing cycles and wires
//!   into origin nodes at connect time
//! - **Scheduler**: Deterministic topological ordering, downstream
//!   closures, and staleness propagation
//! - **Executors**: Pluggable per-kind computations behind a registry with
//!   an identity fallback, so unknown kinds pass data through
//! - **Pipeline**: The aggregate tying it all together with a run mode, a
//!   time cursor, and a debounced single-flight run loop
//!
//! ## Quick Start
//!
//! ### Building a Graph
//!
//! Mutations are synchronous and validated at the call site. Connecting a
//! wire marks the target stale; illegal wires are refused outright:
//!
//! ```
//! use wireloom::graph::GraphError;
//! use wireloom::node::{ExecutionState, Node};
//! use wireloom::pipeline::Pipeline;
//! use wireloom::types::{NodeKind, RunMode};
//!
//! let mut pipeline = Pipeline::new("intake").with_run_mode(RunMode::Manual);
//! let rows = pipeline.add_node(Node::new(NodeKind::ExternalImport));
//! let shaped = pipeline.add_node(Node::new(NodeKind::Filter));
//! pipeline.connect(rows, shaped).unwrap();
//!
//! // The new target is stale until something executes it.
//! assert_eq!(
//!     pipeline.node(shaped).unwrap().execution_state(),
//!     ExecutionState::Stale,
//! );
//!
//! // Origin nodes never take inputs.
//! assert!(matches!(
//!     pipeline.connect(shaped, rows),
//!     Err(GraphError::OriginTarget { .. }),
//! ));
//! ```
//!
//! ### Running a Pipeline
//!
//! Execution is async and serialized: one node at a time in topological
//! order, each executor awaited to completion. Failures land on the node,
//! not on the run:
//!
//! ```
//! use serde_json::json;
//! use wireloom::node::Node;
//! use wireloom::pipeline::Pipeline;
//! use wireloom::types::{NodeKind, RunMode};
//!
//! # async fn demo() -> Result<(), wireloom::graph::GraphError> {
//! let mut pipeline = Pipeline::new("standup digest").with_run_mode(RunMode::Manual);
//!
//! let rows = pipeline.add_node(Node::new(NodeKind::ExternalImport).with_config([(
//!     "data".into(),
//!     json!([{"name": "Ada", "open": 3}, {"name": "Grace", "open": 1}]),
//! )]));
//! let sorted = pipeline.add_node(Node::new(NodeKind::Sort).with_config([
//!     ("field".into(), json!("open")),
//!     ("order".into(), json!("desc")),
//! ]));
//! let names = pipeline.add_node(
//!     Node::new(NodeKind::SelectFields).with_config([("fields".into(), json!(["name"]))]),
//! );
//! pipeline.connect(rows, sorted)?;
//! pipeline.connect(sorted, names)?;
//!
//! pipeline.execute_all().await;
//! assert_eq!(
//!     pipeline.node(names).unwrap().cached_output(),
//!     Some(&json!([{"name": "Ada"}, {"name": "Grace"}])),
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ### Reacting to Change
//!
//! In the default `auto` run mode, edits enqueue work and time-cursor moves
//! arm a trailing debounce window; [`pipeline::Pipeline::run_pending`]
//! drives whatever is scheduled. Lifecycle events stream through the
//! [`event_bus`]:
//!
//! ```
//! use wireloom::event_bus::EventBus;
//! use wireloom::pipeline::Pipeline;
//!
//! # async fn demo() {
//! let bus = EventBus::default();
//! bus.listen_for_events();
//!
//! let mut pipeline = Pipeline::new("dashboard").with_event_bus(&bus);
//! // Every mutation, state change, and run summary now lands on the bus.
//! # pipeline.set_name("dashboard");
//! # }
//! ```
//!
//! ## Best Practices
//!
//! ```
//! use serde_json::json;
//! use wireloom::node::Node;
//! use wireloom::types::NodeKind;
//!
//! // ✅ GOOD: Use the builder-style constructors
//! let node = Node::new(NodeKind::Filter)
//!     .with_label("only open tickets")
//!     .with_config([
//!         ("field".into(), json!("status")),
//!         ("operator".into(), json!("eq")),
//!         ("value".into(), json!("open")),
//!     ]);
//!
//! // ✅ GOOD: Kinds decode from their wire names, unknown ones included
//! assert_eq!(NodeKind::decode("filter"), NodeKind::Filter);
//! assert!(NodeKind::decode("acmeCustom").is_custom());
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Identifiers, node kinds and families, run modes
//! - [`node`] - Node state machine, configuration, cached output
//! - [`wire`] - Ported directed connections between nodes
//! - [`graph`] - Node/wire store with connect-time structural guards
//! - [`scheduler`] - Topological ordering and staleness propagation
//! - [`executors`] - Executor trait, registry, and the builtin set
//! - [`pipeline`] - The pipeline aggregate, run loop, and persistence
//! - [`providers`] - Record-store and temporal-filter collaborator traits
//! - [`event_bus`] - Lifecycle event stream with pluggable sinks
//! - [`config`] - Engine tunables sourced from the environment
//! - [`telemetry`] - Tracing bootstrap for binaries and demos

pub mod config;
pub mod event_bus;
pub mod executors;
pub mod graph;
pub mod node;
#[cfg(feature = "petgraph-compat")]
pub mod petgraph_compat;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod telemetry;
pub mod types;
pub mod wire;
