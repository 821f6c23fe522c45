//! The pipeline aggregate: one graph, one time cursor, one run loop.
//!
//! A [`Pipeline`] owns its [`Graph`] exclusively. Callers mutate through
//! the pipeline's API; every mutation is synchronous, invalidates the
//! affected nodes, and (depending on the run mode) schedules follow-up
//! execution instead of blocking on it:
//!
//! - `auto`: mutations enqueue the touched node; time-cursor moves arm a
//!   trailing debounce window. [`Pipeline::run_pending`] drives both.
//! - `step`: mutations enqueue, but only [`Pipeline::step`] executes, one
//!   queued entry per call.
//! - `manual`: nothing is scheduled; callers invoke
//!   [`Pipeline::execute_all`] or [`Pipeline::execute_from`] themselves.
//!
//! Execution is serialized: one node at a time, each awaited to
//! completion, which keeps invalidation and caching deterministic without
//! any locking. Executor failures land on the failing node as state and
//! never abort a run.
//!
//! No background task outlives the pipeline. The debounce window is plain
//! data awaited by `run_pending`, so dropping the pipeline drops any
//! pending trigger with it; [`Pipeline::teardown`] does the same
//! explicitly.
//!
//! # Examples
//!
//! ```rust
//! use serde_json::json;
//! use wireloom::node::Node;
//! use wireloom::pipeline::Pipeline;
//! use wireloom::types::{NodeKind, RunMode};
//!
//! # async fn demo() -> Result<(), wireloom::graph::GraphError> {
//! let mut pipeline = Pipeline::new("leads").with_run_mode(RunMode::Manual);
//!
//! let rows = pipeline.add_node(
//!     Node::new(NodeKind::ExternalImport)
//!         .with_config([("data".into(), json!([{"n": 1}, {"n": 5}]))]),
//! );
//! let filter = pipeline.add_node(Node::new(NodeKind::Filter).with_config([
//!     ("field".into(), json!("n")),
//!     ("operator".into(), json!("gt")),
//!     ("value".into(), json!(2)),
//! ]));
//! let count = pipeline.add_node(
//!     Node::new(NodeKind::Aggregate).with_config([("function".into(), json!("count"))]),
//! );
//! pipeline.connect(rows, filter)?;
//! pipeline.connect(filter, count)?;
//!
//! pipeline.execute_all().await;
//! assert_eq!(pipeline.node(count).unwrap().cached_output(), Some(&json!(1)));
//! # Ok(())
//! # }
//! ```

pub mod persistence;
mod run_loop;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::event_bus::{EventBus, GraphChange, PipelineEvent, RunSummary};
use crate::executors::{resolve_input, ExecutionContext, ExecutorRegistry};
use crate::graph::{Graph, GraphError};
use crate::node::{Node, NodeConfig};
use crate::providers::{TemporalFilter, Workbench};
use crate::scheduler::{downstream_of, propagate_stale, topological_order};
use crate::types::{NodeId, RunMode, WireId};

use run_loop::{Debounce, RunQueue};

// ============================================================================
// Pipeline
// ============================================================================

/// A dataflow pipeline: graph, executors, time cursor, and run loop.
pub struct Pipeline {
    id: String,
    name: String,
    graph: Graph,
    run_mode: RunMode,
    current_timestamp: Option<DateTime<Utc>>,
    timeline_start: Option<DateTime<Utc>>,
    timeline_end: Option<DateTime<Utc>>,
    /// Opaque presentation-layer snapshots, round-tripped untouched.
    keyframes: Vec<Value>,
    config: EngineConfig,
    registry: ExecutorRegistry,
    workbench: Option<Arc<dyn Workbench>>,
    temporal: Option<Arc<dyn TemporalFilter>>,
    events: Option<flume::Sender<PipelineEvent>>,
    queue: RunQueue,
    debounce: Debounce,
}

impl Pipeline {
    /// Empty pipeline in `auto` mode with default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let config = EngineConfig::default();
        let debounce = Debounce::new(config.debounce());
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            graph: Graph::new(),
            run_mode: RunMode::default(),
            current_timestamp: None,
            timeline_start: None,
            timeline_end: None,
            keyframes: Vec::new(),
            config,
            registry: ExecutorRegistry::default(),
            workbench: None,
            temporal: None,
            events: None,
            queue: RunQueue::default(),
            debounce,
        }
    }

    #[must_use]
    pub fn with_run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.debounce = Debounce::new(config.debounce());
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_workbench(mut self, workbench: Arc<dyn Workbench>) -> Self {
        self.workbench = Some(workbench);
        self
    }

    #[must_use]
    pub fn with_temporal_filter(mut self, temporal: Arc<dyn TemporalFilter>) -> Self {
        self.temporal = Some(temporal);
        self
    }

    /// Publish lifecycle events onto this sender.
    #[must_use]
    pub fn with_event_sender(mut self, sender: flume::Sender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Publish lifecycle events onto an [`EventBus`].
    #[must_use]
    pub fn with_event_bus(self, bus: &EventBus) -> Self {
        self.with_event_sender(bus.get_sender())
    }

    // ------------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Read-only view of the owned graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Convenience lookup on the owned graph.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn current_timestamp(&self) -> Option<DateTime<Utc>> {
        self.current_timestamp
    }

    pub fn timeline(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.timeline_start, self.timeline_end)
    }

    pub fn keyframes(&self) -> &[Value] {
        &self.keyframes
    }

    pub fn set_keyframes(&mut self, keyframes: Vec<Value>) {
        self.keyframes = keyframes;
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Queued node ids awaiting a drain.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether anything is scheduled: queued ids or an armed debounce.
    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty() || self.debounce.is_armed()
    }

    // ------------------------------------------------------------------------
    // Mutation surface (synchronous; schedules, never blocks)
    // ------------------------------------------------------------------------

    /// Add a node. New nodes start `Idle`. Origin-family nodes need no
    /// inputs, so outside manual mode they are queued for a first run
    /// right away; every other kind waits for a wire.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let kind = node.kind().encode();
        let schedule = node.is_origin() && self.run_mode != RunMode::Manual;
        let id = self.graph.add_node(node);
        self.emit(PipelineEvent::graph(GraphChange::NodeAdded {
            node_id: id.to_string(),
            kind,
        }));
        if schedule {
            self.queue.enqueue(id);
        }
        id
    }

    /// Remove a node and every wire incident on it. Former wire targets
    /// that survive are invalidated.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let (node, wires) = self.graph.remove_node(id)?;
        for wire in &wires {
            self.emit(PipelineEvent::graph(GraphChange::WireRemoved {
                wire_id: wire.id().to_string(),
            }));
            if wire.target_id() != id {
                self.invalidate(wire.target_id());
            }
        }
        self.emit(PipelineEvent::graph(GraphChange::NodeRemoved {
            node_id: id.to_string(),
        }));
        Ok(node)
    }

    /// Wire `source -> target` on the default ports.
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> Result<WireId, GraphError> {
        let wire_id = self.graph.connect(source, target)?;
        self.after_connect(wire_id, source, target);
        Ok(wire_id)
    }

    /// Wire `source -> target` on named ports.
    pub fn connect_with_ports(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_port: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Result<WireId, GraphError> {
        let wire_id = self
            .graph
            .connect_with_ports(source, target, source_port, target_port)?;
        self.after_connect(wire_id, source, target);
        Ok(wire_id)
    }

    fn after_connect(&mut self, wire_id: WireId, source: NodeId, target: NodeId) {
        self.emit(PipelineEvent::graph(GraphChange::WireAdded {
            wire_id: wire_id.to_string(),
            source_id: source.to_string(),
            target_id: target.to_string(),
        }));
        self.invalidate(target);
        if self.run_mode != RunMode::Manual {
            self.queue.enqueue(target);
        }
    }

    /// Remove a wire and invalidate its former target.
    pub fn disconnect(&mut self, wire_id: WireId) -> Result<(), GraphError> {
        let wire = self.graph.remove_wire(wire_id)?;
        self.emit(PipelineEvent::graph(GraphChange::WireRemoved {
            wire_id: wire.id().to_string(),
        }));
        self.invalidate(wire.target_id());
        Ok(())
    }

    /// Shallow-merge a partial configuration into a node, invalidating it
    /// and its downstream closure.
    pub fn configure_node(&mut self, id: NodeId, partial: NodeConfig) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or(GraphError::NodeNotFound { id })?;
        node.merge_config(partial);
        self.emit(PipelineEvent::graph(GraphChange::NodeConfigured {
            node_id: id.to_string(),
        }));
        self.invalidate(id);
        if self.run_mode != RunMode::Manual {
            self.queue.enqueue(id);
        }
        Ok(())
    }

    /// Reposition a node. Presentation metadata only; nothing is
    /// invalidated.
    pub fn move_node(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or(GraphError::NodeNotFound { id })?;
        node.set_position(x, y);
        Ok(())
    }

    /// Relabel a node. Presentation metadata only.
    pub fn rename_node(&mut self, id: NodeId, label: impl Into<String>) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or(GraphError::NodeNotFound { id })?;
        node.set_label(label);
        Ok(())
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
        if !mode.is_auto() {
            self.debounce.cancel();
        }
    }

    pub fn set_timeline(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) {
        self.timeline_start = start;
        self.timeline_end = end;
    }

    /// Move (or clear) the time cursor. Unchanged cursors are a no-op.
    ///
    /// A move invalidates every origin node and its downstream closure.
    /// In `auto` mode it arms the trailing debounce window instead of
    /// enqueueing nodes, so a scrub gesture collapses into one full
    /// re-execution; in `step` mode the origins are enqueued.
    pub fn set_timestamp(&mut self, at: Option<DateTime<Utc>>) -> bool {
        if self.current_timestamp == at {
            return false;
        }
        self.current_timestamp = at;

        let origins: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.is_origin())
            .map(Node::id)
            .collect();
        for &origin in &origins {
            self.invalidate(origin);
        }
        self.emit(PipelineEvent::graph(GraphChange::TimestampMoved {
            at: at.map(|t| t.to_rfc3339()),
        }));

        match self.run_mode {
            RunMode::Auto => self.debounce.arm(),
            RunMode::Step => {
                for origin in origins {
                    self.queue.enqueue(origin);
                }
            }
            RunMode::Manual => {}
        }
        true
    }

    /// Cancel all scheduled work: pending queue entries and any armed
    /// debounce window.
    pub fn teardown(&mut self) {
        self.queue.clear();
        self.debounce.cancel();
    }

    /// Mark a node stale and propagate along outgoing wires, publishing a
    /// state-change event per node that actually changed.
    fn invalidate(&mut self, id: NodeId) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        if !node.mark_stale() {
            return;
        }
        let mut changed = vec![id];
        changed.extend(propagate_stale(&mut self.graph, id));
        for node_id in changed {
            self.emit_state(node_id);
        }
    }

    // ------------------------------------------------------------------------
    // Execution surface
    // ------------------------------------------------------------------------

    /// Execute one node: resolve input, dispatch its executor, land the
    /// result as state. Executor failures become the node's `Error` state,
    /// not an `Err` here.
    #[instrument(skip(self), fields(node = %id))]
    pub async fn execute_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::NodeNotFound { id });
        }
        self.execute_node_inner(id).await;
        Ok(())
    }

    /// Execute a node and its full downstream closure in topological
    /// sub-order, then publish a run summary.
    #[instrument(skip(self), fields(node = %id))]
    pub async fn execute_from(&mut self, id: NodeId) -> Result<RunSummary, GraphError> {
        if !self.graph.contains_node(id) {
            return Err(GraphError::NodeNotFound { id });
        }
        Ok(self.execute_from_inner(id).await)
    }

    /// Re-run the whole graph in topological order, skipping nodes still
    /// `Success`, then publish a run summary.
    #[instrument(skip(self))]
    pub async fn execute_all(&mut self) -> RunSummary {
        let mut summary = RunSummary {
            executed: 0,
            failed: 0,
        };
        for id in topological_order(&self.graph) {
            let still_valid = self
                .graph
                .node(id)
                .is_some_and(|node| node.execution_state().is_success());
            if still_valid {
                continue;
            }
            summary.executed += 1;
            if !self.execute_node_inner(id).await {
                summary.failed += 1;
            }
        }
        self.emit(PipelineEvent::Run(summary));
        summary
    }

    /// Drive scheduled work to completion: wait out an armed debounce
    /// window (running the full graph once it elapses), then drain the
    /// queue, executing each queued id's downstream closure.
    #[instrument(skip(self))]
    pub async fn run_pending(&mut self) -> RunSummary {
        let mut total = RunSummary {
            executed: 0,
            failed: 0,
        };
        if self.debounce.expired().await {
            let summary = self.execute_all().await;
            total.executed += summary.executed;
            total.failed += summary.failed;
        }
        if self.queue.begin_drain() {
            while let Some(id) = self.queue.pop() {
                if !self.graph.contains_node(id) {
                    tracing::debug!(node = %id, "queued node no longer exists, skipping");
                    continue;
                }
                let summary = self.execute_from_inner(id).await;
                total.executed += summary.executed;
                total.failed += summary.failed;
            }
            self.queue.finish_drain();
        }
        total
    }

    /// Execute exactly one queued entry (and its downstream closure).
    /// Returns `None` when the queue is empty. The `step` run mode's
    /// drain primitive.
    pub async fn step(&mut self) -> Option<RunSummary> {
        loop {
            let id = self.queue.pop()?;
            if self.graph.contains_node(id) {
                return Some(self.execute_from_inner(id).await);
            }
            tracing::debug!(node = %id, "queued node no longer exists, skipping");
        }
    }

    async fn execute_from_inner(&mut self, id: NodeId) -> RunSummary {
        let mut wanted: FxHashSet<NodeId> = downstream_of(&self.graph, id).into_iter().collect();
        wanted.insert(id);
        let order: Vec<NodeId> = topological_order(&self.graph)
            .into_iter()
            .filter(|node_id| wanted.contains(node_id))
            .collect();

        let mut summary = RunSummary {
            executed: 0,
            failed: 0,
        };
        for node_id in order {
            summary.executed += 1;
            if !self.execute_node_inner(node_id).await {
                summary.failed += 1;
            }
        }
        self.emit(PipelineEvent::Run(summary));
        summary
    }

    /// The single suspension point: everything before and after the
    /// executor dispatch is synchronous state bookkeeping.
    async fn execute_node_inner(&mut self, id: NodeId) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            debug_assert!(false, "executing unknown node {id}");
            return false;
        };
        let kind = node.kind().clone();
        let config = node.config().clone();
        node.begin_run();
        self.emit_state(id);

        let input = resolve_input(&self.graph, id);
        let executor = self.registry.executor_for(&kind);
        let ctx = self.execution_context(id);
        let outcome = executor.execute(&config, input, &ctx).await;

        // The graph cannot change during the await: this method holds
        // `&mut self` and mutations only happen between executions.
        let Some(node) = self.graph.node_mut(id) else {
            debug_assert!(false, "node {id} vanished mid-execution");
            return false;
        };
        let succeeded = match outcome {
            Ok(value) => {
                node.complete(value);
                true
            }
            Err(error) => {
                tracing::warn!(node = %id, kind = %kind, %error, "node execution failed");
                node.fail(error.to_string());
                false
            }
        };
        self.emit_state(id);
        succeeded
    }

    fn execution_context(&self, id: NodeId) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(id);
        if let Some(at) = self.current_timestamp {
            ctx = ctx.with_timestamp(at);
        }
        if let Some(workbench) = &self.workbench {
            ctx = ctx.with_workbench(Arc::clone(workbench));
        }
        if let Some(temporal) = &self.temporal {
            ctx = ctx.with_temporal_filter(Arc::clone(temporal));
        }
        if let Some(sender) = &self.events {
            ctx = ctx.with_events(sender.clone());
        }
        ctx
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.try_send(event);
        }
    }

    fn emit_state(&self, id: NodeId) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        self.emit(PipelineEvent::graph(GraphChange::NodeStateChanged {
            node_id: id.to_string(),
            state: node.execution_state().to_string(),
        }));
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("run_mode", &self.run_mode)
            .field("nodes", &self.graph.node_count())
            .field("wires", &self.graph.wire_count())
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn import_node(rows: Value) -> Node {
        Node::new(crate::types::NodeKind::ExternalImport)
            .with_config([("data".to_string(), rows)])
    }

    fn manual(name: &str) -> Pipeline {
        Pipeline::new(name).with_run_mode(RunMode::Manual)
    }

    #[tokio::test]
    async fn execute_all_flows_values_downstream() {
        let mut pipeline = manual("counts");
        let rows = pipeline.add_node(import_node(json!([{"n": 1}, {"n": 3}, {"n": 5}])));
        let filter = pipeline.add_node(
            Node::new(crate::types::NodeKind::Filter).with_config([
                ("field".to_string(), json!("n")),
                ("operator".to_string(), json!("gt")),
                ("value".to_string(), json!(1)),
            ]),
        );
        let count = pipeline.add_node(
            Node::new(crate::types::NodeKind::Aggregate)
                .with_config([("function".to_string(), json!("count"))]),
        );
        pipeline.connect(rows, filter).unwrap();
        pipeline.connect(filter, count).unwrap();

        let summary = pipeline.execute_all().await;
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(pipeline.node(count).unwrap().cached_output(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn configure_marks_downstream_stale_and_execute_from_recovers() {
        let mut pipeline = manual("reconfigure");
        let rows = pipeline.add_node(import_node(json!([{"n": 1}, {"n": 2}])));
        let filter = pipeline.add_node(
            Node::new(crate::types::NodeKind::Filter).with_config([
                ("field".to_string(), json!("n")),
                ("operator".to_string(), json!("gte")),
                ("value".to_string(), json!(2)),
            ]),
        );
        let count = pipeline.add_node(
            Node::new(crate::types::NodeKind::Aggregate)
                .with_config([("function".to_string(), json!("count"))]),
        );
        pipeline.connect(rows, filter).unwrap();
        pipeline.connect(filter, count).unwrap();
        pipeline.execute_all().await;
        assert_eq!(pipeline.node(count).unwrap().cached_output(), Some(&json!(1)));

        pipeline
            .configure_node(filter, [("value".to_string(), json!(1))].into_iter().collect())
            .unwrap();
        use crate::node::ExecutionState;
        assert_eq!(
            pipeline.node(filter).unwrap().execution_state(),
            ExecutionState::Stale
        );
        assert_eq!(
            pipeline.node(count).unwrap().execution_state(),
            ExecutionState::Stale
        );
        assert_eq!(
            pipeline.node(rows).unwrap().execution_state(),
            ExecutionState::Success
        );

        pipeline.execute_from(filter).await.unwrap();
        assert_eq!(pipeline.node(count).unwrap().cached_output(), Some(&json!(2)));
        assert_eq!(
            pipeline.node(rows).unwrap().execution_state(),
            ExecutionState::Success
        );
    }

    #[tokio::test]
    async fn executor_failure_lands_on_the_node_not_the_loop() {
        let mut pipeline = manual("failures");
        let rows = pipeline.add_node(import_node(json!([{"n": 1}])));
        // Filter missing its `field` key fails; the sibling branch and the
        // run loop keep going.
        let broken = pipeline.add_node(Node::new(crate::types::NodeKind::Filter));
        let healthy = pipeline.add_node(
            Node::new(crate::types::NodeKind::Aggregate)
                .with_config([("function".to_string(), json!("count"))]),
        );
        pipeline.connect(rows, broken).unwrap();
        pipeline.connect(rows, healthy).unwrap();

        let summary = pipeline.execute_all().await;
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.failed, 1);

        use crate::node::ExecutionState;
        let node = pipeline.node(broken).unwrap();
        assert_eq!(node.execution_state(), ExecutionState::Error);
        assert!(node.last_error().unwrap().contains("field"));
        assert_eq!(
            pipeline.node(healthy).unwrap().execution_state(),
            ExecutionState::Success
        );
    }

    #[tokio::test]
    async fn auto_mode_queues_and_run_pending_drains() {
        let mut pipeline = Pipeline::new("auto");
        let rows = pipeline.add_node(import_node(json!([{"n": 1}])));
        // A fresh origin schedules its own first run.
        assert_eq!(pipeline.queue_len(), 1);
        let count = pipeline.add_node(
            Node::new(crate::types::NodeKind::Aggregate)
                .with_config([("function".to_string(), json!("count"))]),
        );
        // Non-origin nodes wait for a wire.
        assert_eq!(pipeline.queue_len(), 1);
        pipeline.connect(rows, count).unwrap();
        assert_eq!(pipeline.queue_len(), 2);

        // Enqueueing the same id again before the drain is a no-op.
        pipeline
            .configure_node(count, NodeConfig::default())
            .unwrap();
        assert_eq!(pipeline.queue_len(), 2);

        let summary = pipeline.run_pending().await;
        assert!(summary.executed >= 1);
        assert_eq!(pipeline.queue_len(), 0);
        assert_eq!(pipeline.node(count).unwrap().cached_output(), Some(&json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn timestamp_scrub_debounces_into_one_full_run() {
        let mut pipeline = Pipeline::new("scrub")
            .with_config(EngineConfig::new(300, EngineConfig::DEFAULT_EVENT_BUFFER));
        let rows = pipeline.add_node(import_node(json!([{"n": 1}])));
        pipeline.run_pending().await;

        use chrono::TimeZone;
        for hour in 0..5 {
            pipeline.set_timestamp(Some(
                Utc.with_ymd_and_hms(2024, 1, 1, 9 + hour, 0, 0).unwrap(),
            ));
        }
        assert!(pipeline.has_pending());

        let summary = pipeline.run_pending().await;
        // One whole-graph run for the whole burst.
        assert_eq!(summary.executed, 1);
        use crate::node::ExecutionState;
        assert_eq!(
            pipeline.node(rows).unwrap().execution_state(),
            ExecutionState::Success
        );
    }

    #[tokio::test]
    async fn unchanged_timestamp_is_a_no_op() {
        let mut pipeline = manual("cursor");
        use chrono::TimeZone;
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(pipeline.set_timestamp(Some(at)));
        assert!(!pipeline.set_timestamp(Some(at)));
        assert!(pipeline.set_timestamp(None));
    }

    #[tokio::test]
    async fn step_mode_executes_one_queued_entry_per_call() {
        let mut pipeline = Pipeline::new("stepper").with_run_mode(RunMode::Step);
        let first = pipeline.add_node(import_node(json!([1])));
        let second = pipeline.add_node(import_node(json!([2])));
        let merge = pipeline.add_node(Node::new(crate::types::NodeKind::Merge));
        // The two origins queued themselves at add time; the merge joins
        // them once wired.
        assert_eq!(pipeline.queue_len(), 2);
        pipeline.connect(first, merge).unwrap();
        pipeline.connect(second, merge).unwrap();
        assert_eq!(pipeline.queue_len(), 3);

        // Touching an already-queued node does not grow the queue.
        pipeline
            .configure_node(first, NodeConfig::default())
            .unwrap();
        assert_eq!(pipeline.queue_len(), 3);

        assert!(pipeline.step().await.is_some());
        assert_eq!(pipeline.queue_len(), 2);
        assert!(pipeline.step().await.is_some());
        assert!(pipeline.step().await.is_some());
        assert!(pipeline.step().await.is_none());
    }

    #[tokio::test]
    async fn teardown_cancels_scheduled_work() {
        let mut pipeline = Pipeline::new("teardown");
        let rows = pipeline.add_node(import_node(json!([1])));
        let sink = pipeline.add_node(Node::new(crate::types::NodeKind::Preview));
        pipeline.connect(rows, sink).unwrap();
        use chrono::TimeZone;
        pipeline.set_timestamp(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert!(pipeline.has_pending());

        pipeline.teardown();
        assert!(!pipeline.has_pending());
        let summary = pipeline.run_pending().await;
        assert_eq!(summary.executed, 0);
    }

    #[tokio::test]
    async fn removing_a_wire_leaves_the_target_with_empty_input() {
        let mut pipeline = manual("rewire");
        let rows = pipeline.add_node(import_node(json!([{"n": 1}])));
        let preview = pipeline.add_node(Node::new(crate::types::NodeKind::Preview));
        let wire = pipeline.connect(rows, preview).unwrap();
        pipeline.execute_all().await;
        assert_eq!(
            pipeline.node(preview).unwrap().cached_output(),
            Some(&json!([{"n": 1}]))
        );

        pipeline.disconnect(wire).unwrap();
        pipeline.execute_node(preview).await.unwrap();
        // Re-resolution sees no upstream at all, not A's old value.
        assert_eq!(pipeline.node(preview).unwrap().cached_output(), Some(&json!(null)));
    }

    #[tokio::test]
    async fn execute_from_missing_node_is_refused() {
        let mut pipeline = manual("missing");
        let ghost = NodeId::new();
        assert!(matches!(
            pipeline.execute_from(ghost).await,
            Err(GraphError::NodeNotFound { .. })
        ));
    }
}
