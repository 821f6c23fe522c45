//! Kind-specific computations and the registry that dispatches them.
//!
//! Every node kind maps to one [`Executor`]: a computation from
//! `(config, resolved input, context)` to an output value. The engine never
//! branches on kinds inline; it looks the executor up once per execution in
//! the [`ExecutorRegistry`] and awaits it. Kinds without a registered
//! executor run under the identity fallback, which returns the input
//! unchanged — unknown kinds are a pass-through, not an error.
//!
//! # Input resolution
//!
//! [`resolve_input`] gathers the cached outputs of a node's upstream
//! sources, in wire-registration order, skipping sources that have not
//! produced a value yet. The arity of what was gathered is load-bearing:
//!
//! - zero values resolve to [`ResolvedInput::Empty`],
//! - exactly one resolves to the bare value ([`ResolvedInput::Single`]),
//! - two or more resolve to an ordered [`ResolvedInput::Many`] list.
//!
//! Executors written for one upstream consume the bare value; the
//! merge/join family special-cases the list form.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use wireloom::executors::{ExecutorRegistry, IdentityExecutor};
//! use wireloom::types::NodeKind;
//!
//! let registry = ExecutorRegistry::default();
//! assert!(registry.has_executor(&NodeKind::Filter));
//!
//! // Unregistered kinds fall back to identity instead of failing.
//! assert!(!registry.has_executor(&NodeKind::Summarize));
//! let _fallback = registry.executor_for(&NodeKind::Summarize);
//!
//! // Callers can extend or replace the table.
//! let registry = ExecutorRegistry::new()
//!     .with_executor(NodeKind::Custom("echo".into()), Arc::new(IdentityExecutor));
//! ```

pub mod control;
pub mod emission;
pub mod origin;
pub mod shaping;
pub mod synthesis;

pub use control::{BranchExecutor, JoinExecutor, MergeExecutor, SwitchExecutor};
pub use emission::{ExportExecutor, LogExecutor, PreviewExecutor};
pub use origin::{CollectionReadExecutor, EmbeddedDataExecutor, QueryExecutor, RecordFocusExecutor};
pub use shaping::{
    DedupeExecutor, FilterExecutor, FlattenExecutor, NullHandlingExecutor, RenameFieldsExecutor,
    SelectFieldsExecutor, SortExecutor,
};
pub use synthesis::{AggregateExecutor, DistinctExecutor, GroupExecutor};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

use crate::event_bus::PipelineEvent;
use crate::graph::Graph;
use crate::node::NodeConfig;
use crate::providers::{ProviderError, TemporalFilter, Workbench};
use crate::types::{NodeId, NodeKind};

// ============================================================================
// Resolved Input
// ============================================================================

/// What a node's upstream wires gathered for one execution.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedInput {
    /// No upstream value was available.
    Empty,
    /// Exactly one upstream value, unwrapped.
    Single(Value),
    /// Two or more upstream values, in wire-registration order.
    Many(Vec<Value>),
}

impl ResolvedInput {
    /// Number of gathered upstream values.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            ResolvedInput::Empty => 0,
            ResolvedInput::Single(_) => 1,
            ResolvedInput::Many(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ResolvedInput::Empty)
    }

    /// The single-input row contract used by shaping/synthesis executors.
    ///
    /// `Empty` is no rows; a single array value is its elements; any other
    /// single value is one row. A multi-input list is refused — executors
    /// that accept several upstreams use [`row_sets`](Self::row_sets).
    pub fn rows(&self) -> Result<Vec<Value>, ExecutorError> {
        match self {
            ResolvedInput::Empty => Ok(Vec::new()),
            ResolvedInput::Single(value) => Ok(value_rows(value)),
            ResolvedInput::Many(values) => Err(ExecutorError::SingleInputExpected {
                got: values.len(),
            }),
        }
    }

    /// Per-upstream row sets, in wire-registration order.
    #[must_use]
    pub fn row_sets(&self) -> Vec<Vec<Value>> {
        match self {
            ResolvedInput::Empty => Vec::new(),
            ResolvedInput::Single(value) => vec![value_rows(value)],
            ResolvedInput::Many(values) => values.iter().map(value_rows).collect(),
        }
    }

    /// Collapse back into one value, the way the identity executor does.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            ResolvedInput::Empty => Value::Null,
            ResolvedInput::Single(value) => value,
            ResolvedInput::Many(values) => Value::Array(values),
        }
    }
}

/// Interpret a cached value as a row set: arrays are their elements, any
/// other value is a single row.
pub(crate) fn value_rows(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows.clone(),
        other => vec![other.clone()],
    }
}

/// Gather a node's input from its upstream caches.
///
/// Sources without a cached output are skipped, not nulled. A wire naming a
/// non-default source port selects that key from an object-shaped upstream
/// cache (how branch/switch publish per-port results); when the key is not
/// an object member, the whole cached value is gathered.
#[must_use]
pub fn resolve_input(graph: &Graph, id: NodeId) -> ResolvedInput {
    let mut gathered = Vec::new();
    for wire in graph.incoming_wires(id) {
        let Some(source) = graph.node(wire.source_id()) else {
            debug_assert!(false, "wire sourced from unknown node {}", wire.source_id());
            continue;
        };
        let Some(cached) = source.cached_output() else {
            continue;
        };
        let value = if wire.uses_default_source_port() {
            cached.clone()
        } else {
            match cached {
                Value::Object(map) => map
                    .get(wire.source_port())
                    .cloned()
                    .unwrap_or_else(|| cached.clone()),
                other => other.clone(),
            }
        };
        gathered.push(value);
    }
    match gathered.len() {
        0 => ResolvedInput::Empty,
        1 => ResolvedInput::Single(gathered.remove(0)),
        _ => ResolvedInput::Many(gathered),
    }
}

// ============================================================================
// Execution Context
// ============================================================================

/// Execution environment handed to executors.
///
/// Carries the collaborators the engine itself does not implement (record
/// workbench, temporal filter), the pipeline's time cursor, and a channel
/// for surfacing node-scoped events. All of it is optional; executors that
/// need a missing collaborator fail their node with
/// [`ExecutorError::MissingCollaborator`].
#[derive(Clone)]
pub struct ExecutionContext {
    /// Id of the node being executed.
    pub node_id: NodeId,
    /// The pipeline's current time cursor, if one is set.
    pub timestamp: Option<DateTime<Utc>>,
    workbench: Option<Arc<dyn Workbench>>,
    temporal: Option<Arc<dyn TemporalFilter>>,
    events: Option<flume::Sender<PipelineEvent>>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            timestamp: None,
            workbench: None,
            temporal: None,
            events: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
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

    #[must_use]
    pub fn with_events(mut self, sender: flume::Sender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// The record workbench, or a typed failure when none was attached.
    pub fn workbench(&self) -> Result<&dyn Workbench, ExecutorError> {
        self.workbench
            .as_deref()
            .ok_or(ExecutorError::MissingCollaborator { what: "workbench" })
    }

    /// The temporal filter, when one was attached.
    pub fn temporal_filter(&self) -> Option<&dyn TemporalFilter> {
        self.temporal.as_deref()
    }

    /// Surface a node-scoped event on the pipeline's event stream.
    ///
    /// Delivery is best-effort: a missing, closed, or full bus never fails
    /// the node.
    pub fn emit(&self, scope: impl Into<String>, message: impl Into<String>) {
        if let Some(sender) = &self.events {
            let _ = sender.try_send(PipelineEvent::node_message(self.node_id, scope, message));
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("node_id", &self.node_id)
            .field("timestamp", &self.timestamp)
            .field("workbench", &self.workbench.is_some())
            .field("temporal", &self.temporal.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures raised by executors.
///
/// These never escape the run loop: the executing node captures the message
/// into its `last_error` and enters the `Error` state, and scheduling of
/// sibling and downstream nodes continues.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// A configuration key is missing or malformed.
    #[error("invalid config `{key}`: {reason}")]
    #[diagnostic(
        code(wireloom::executors::invalid_config),
        help("Check the node's configuration record against its kind's documented keys.")
    )]
    InvalidConfig { key: &'static str, reason: String },

    /// A required collaborator was not attached to the pipeline.
    #[error("missing collaborator: {what}")]
    #[diagnostic(
        code(wireloom::executors::missing_collaborator),
        help("Attach the collaborator when building the pipeline.")
    )]
    MissingCollaborator { what: &'static str },

    /// The requested record does not exist.
    #[error("record not found: {id}")]
    #[diagnostic(code(wireloom::executors::record_not_found))]
    RecordNotFound { id: String },

    /// A single-input executor received a multi-input list.
    #[error("expected a single upstream input, got {got}")]
    #[diagnostic(
        code(wireloom::executors::single_input),
        help("This kind consumes one upstream; route extra inputs through a merge node.")
    )]
    SingleInputExpected { got: usize },

    /// A two-input executor received the wrong arity.
    #[error("expected exactly two upstream inputs, got {got}")]
    #[diagnostic(code(wireloom::executors::pair_input))]
    PairExpected { got: usize },

    /// Collaborator backend failure.
    #[error(transparent)]
    #[diagnostic(code(wireloom::executors::provider))]
    Provider(#[from] ProviderError),

    /// JSON serialization failure.
    #[error(transparent)]
    #[diagnostic(code(wireloom::executors::serde_json))]
    Serde(#[from] serde_json::Error),

    /// CSV formatting failure.
    #[error(transparent)]
    #[diagnostic(code(wireloom::executors::csv))]
    Csv(#[from] csv::Error),

    /// Export output could not be rendered.
    #[error("failed to render export output: {message}")]
    #[diagnostic(code(wireloom::executors::render))]
    Render { message: String },
}

// ============================================================================
// Capability Trait & Registry
// ============================================================================

/// One node kind's computation.
///
/// Executors are stateless and shareable; per-execution inputs arrive
/// through the arguments. Execution is the engine's single suspension
/// point, so an executor may perform slow external work.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        config: &NodeConfig,
        input: ResolvedInput,
        ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError>;
}

/// Pass-through executor: returns the resolved input unchanged.
///
/// The registry's fallback for kinds without a registered computation.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityExecutor;

#[async_trait]
impl Executor for IdentityExecutor {
    async fn execute(
        &self,
        _config: &NodeConfig,
        input: ResolvedInput,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ExecutorError> {
        Ok(input.into_value())
    }
}

/// Mapping from node kinds to executors, with an identity fallback.
///
/// [`ExecutorRegistry::default`] ships the builtin table; callers extend or
/// replace entries to customize kinds, including the agent family this
/// engine deliberately leaves to embedders.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: FxHashMap<NodeKind, Arc<dyn Executor>>,
    identity: Arc<dyn Executor>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry
            .register(NodeKind::CollectionRead, Arc::new(CollectionReadExecutor))
            .register(NodeKind::RecordFocus, Arc::new(RecordFocusExecutor))
            .register(NodeKind::Query, Arc::new(QueryExecutor))
            .register(NodeKind::ExternalImport, Arc::new(EmbeddedDataExecutor))
            .register(NodeKind::InboundWebhook, Arc::new(EmbeddedDataExecutor))
            .register(NodeKind::Filter, Arc::new(FilterExecutor))
            .register(NodeKind::Sort, Arc::new(SortExecutor))
            .register(NodeKind::SelectFields, Arc::new(SelectFieldsExecutor))
            .register(NodeKind::RenameFields, Arc::new(RenameFieldsExecutor))
            .register(NodeKind::Dedupe, Arc::new(DedupeExecutor))
            .register(NodeKind::Flatten, Arc::new(FlattenExecutor))
            .register(NodeKind::NullHandling, Arc::new(NullHandlingExecutor))
            .register(NodeKind::Aggregate, Arc::new(AggregateExecutor))
            .register(NodeKind::Group, Arc::new(GroupExecutor))
            .register(NodeKind::Distinct, Arc::new(DistinctExecutor))
            .register(NodeKind::Branch, Arc::new(BranchExecutor))
            .register(NodeKind::Switch, Arc::new(SwitchExecutor))
            .register(NodeKind::Merge, Arc::new(MergeExecutor))
            .register(NodeKind::Join, Arc::new(JoinExecutor))
            .register(NodeKind::Preview, Arc::new(PreviewExecutor))
            .register(NodeKind::Log, Arc::new(LogExecutor))
            .register(NodeKind::Export, Arc::new(ExportExecutor));
        registry
    }
}

impl ExecutorRegistry {
    /// Creates an empty registry; every kind falls back to identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            executors: FxHashMap::default(),
            identity: Arc::new(IdentityExecutor),
        }
    }

    /// Register (or replace) the executor for a kind.
    ///
    /// Returns `&mut Self` for chaining.
    pub fn register(&mut self, kind: NodeKind, executor: Arc<dyn Executor>) -> &mut Self {
        self.executors.insert(kind, executor);
        self
    }

    /// Builder-style registration, consuming and returning `self`.
    #[must_use]
    pub fn with_executor(mut self, kind: NodeKind, executor: Arc<dyn Executor>) -> Self {
        self.register(kind, executor);
        self
    }

    /// Whether a dedicated executor is registered for this kind.
    #[must_use]
    pub fn has_executor(&self, kind: &NodeKind) -> bool {
        self.executors.contains_key(kind)
    }

    /// The executor dispatched for a kind, falling back to identity for
    /// unregistered kinds.
    #[must_use]
    pub fn executor_for(&self, kind: &NodeKind) -> Arc<dyn Executor> {
        match self.executors.get(kind) {
            Some(executor) => Arc::clone(executor),
            None => {
                tracing::debug!(kind = %kind, "no executor registered, using identity fallback");
                Arc::clone(&self.identity)
            }
        }
    }
}

// ============================================================================
// Condition Evaluation (shared by filter/query/branch/switch)
// ============================================================================

pub(crate) const OPERATORS: &[&str] = &[
    "eq",
    "neq",
    "gt",
    "gte",
    "lt",
    "lte",
    "contains",
    "startsWith",
    "endsWith",
    "exists",
    "missing",
];

/// One `(field, operator, value)` predicate over a row.
#[derive(Clone, Debug)]
pub(crate) struct Condition {
    pub field: String,
    pub operator: String,
    pub value: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConditionLogic {
    All,
    Any,
}

/// Parse conditions out of a configuration-shaped lookup.
///
/// Accepts either a `conditions` array (with optional `logic`: `and`/`or`)
/// or a single top-level `field`/`operator`/`value` triple. Operators are
/// validated here so a typo fails the node instead of silently matching
/// nothing.
pub(crate) fn parse_conditions<'a>(
    get: impl Fn(&str) -> Option<&'a Value>,
) -> Result<(Vec<Condition>, ConditionLogic), ExecutorError> {
    let logic = match get("logic").and_then(Value::as_str) {
        None | Some("and") => ConditionLogic::All,
        Some("or") => ConditionLogic::Any,
        Some(other) => {
            return Err(ExecutorError::InvalidConfig {
                key: "logic",
                reason: format!("expected `and` or `or`, got `{other}`"),
            });
        }
    };

    if let Some(listed) = get("conditions") {
        let entries = listed
            .as_array()
            .ok_or_else(|| ExecutorError::InvalidConfig {
                key: "conditions",
                reason: "expected an array of condition objects".to_string(),
            })?;
        let conditions = entries
            .iter()
            .map(condition_from_value)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((conditions, logic));
    }

    let condition = Condition {
        field: get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::InvalidConfig {
                key: "field",
                reason: "expected a string field name".to_string(),
            })?
            .to_string(),
        operator: validate_operator(get("operator").and_then(Value::as_str))?,
        value: get("value").cloned(),
    };
    Ok((vec![condition], logic))
}

fn condition_from_value(value: &Value) -> Result<Condition, ExecutorError> {
    let object = value
        .as_object()
        .ok_or_else(|| ExecutorError::InvalidConfig {
            key: "conditions",
            reason: "each condition must be an object".to_string(),
        })?;
    Ok(Condition {
        field: object
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| ExecutorError::InvalidConfig {
                key: "conditions",
                reason: "condition is missing a string `field`".to_string(),
            })?
            .to_string(),
        operator: validate_operator(object.get("operator").and_then(Value::as_str))?,
        value: object.get("value").cloned(),
    })
}

fn validate_operator(raw: Option<&str>) -> Result<String, ExecutorError> {
    let operator = raw.unwrap_or("eq");
    if OPERATORS.contains(&operator) {
        Ok(operator.to_string())
    } else {
        Err(ExecutorError::InvalidConfig {
            key: "operator",
            reason: format!("unrecognized operator `{operator}`"),
        })
    }
}

pub(crate) fn eval_conditions(row: &Value, conditions: &[Condition], logic: ConditionLogic) -> bool {
    match logic {
        ConditionLogic::All => conditions.iter().all(|c| matches_condition(row, c)),
        ConditionLogic::Any => conditions.iter().any(|c| matches_condition(row, c)),
    }
}

/// Evaluate one condition against a row. Rows that are not objects have no
/// fields, so everything except `missing` fails on them.
pub(crate) fn matches_condition(row: &Value, condition: &Condition) -> bool {
    let field_value = row.get(&condition.field);
    match condition.operator.as_str() {
        "exists" => field_value.is_some_and(|v| !v.is_null()),
        "missing" => !field_value.is_some_and(|v| !v.is_null()),
        "eq" => field_value == condition.value.as_ref(),
        "neq" => field_value != condition.value.as_ref(),
        "gt" | "gte" | "lt" | "lte" => {
            let (Some(actual), Some(expected)) = (field_value, condition.value.as_ref()) else {
                return false;
            };
            match compare_values(actual, expected) {
                Some(ordering) => match condition.operator.as_str() {
                    "gt" => ordering == Ordering::Greater,
                    "gte" => ordering != Ordering::Less,
                    "lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                None => false,
            }
        }
        "contains" => match (field_value, condition.value.as_ref()) {
            (Some(Value::String(haystack)), Some(Value::String(needle))) => {
                haystack.contains(needle.as_str())
            }
            (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
            _ => false,
        },
        "startsWith" => match (field_value, condition.value.as_ref()) {
            (Some(Value::String(s)), Some(Value::String(prefix))) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        "endsWith" => match (field_value, condition.value.as_ref()) {
            (Some(Value::String(s)), Some(Value::String(suffix))) => s.ends_with(suffix.as_str()),
            _ => false,
        },
        // Parse-time validation keeps this unreachable.
        _ => false,
    }
}

/// Same-type comparison of two JSON values. `None` means incomparable
/// (mixed types, or non-scalar operands).
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(left), Value::Number(right)) => {
            left.as_f64().partial_cmp(&right.as_f64())
        }
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

/// Configuration accessor: a required string key.
pub(crate) fn require_str<'a>(
    config: &'a NodeConfig,
    key: &'static str,
) -> Result<&'a str, ExecutorError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutorError::InvalidConfig {
            key,
            reason: "expected a string value".to_string(),
        })
}

/// Configuration accessor: an optional string key.
pub(crate) fn optional_str<'a>(config: &'a NodeConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Render a float back into the narrowest JSON number.
pub(crate) fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
