//! Core types for the wireloom pipeline engine.
//!
//! This module defines the fundamental vocabulary used throughout the engine
//! for identifying nodes and wires, classifying node kinds into families, and
//! selecting a pipeline run mode. These are the domain concepts that define
//! what a pipeline *is*; the execution machinery lives in [`crate::pipeline`]
//! and [`crate::scheduler`].
//!
//! # Key Types
//!
//! - [`NodeId`] / [`WireId`]: opaque identifiers for graph members
//! - [`NodeKind`]: the closed enumeration of processing-node kinds
//! - [`NodeFamily`]: structural grouping of kinds (origin, shaping, ...)
//! - [`RunMode`]: whether mutations schedule execution automatically
//!
//! # Examples
//!
//! ```rust
//! use wireloom::types::{NodeKind, NodeFamily, RunMode};
//!
//! let kind = NodeKind::Filter;
//! assert_eq!(kind.family(), NodeFamily::Shaping);
//! assert!(!kind.is_origin());
//!
//! // Encode for persistence
//! assert_eq!(NodeKind::CollectionRead.encode(), "collectionRead");
//! assert_eq!(NodeKind::decode("filter"), NodeKind::Filter);
//!
//! // Unknown kinds survive round-trips instead of failing
//! let custom = NodeKind::decode("somethingNewer");
//! assert_eq!(custom, NodeKind::Custom("somethingNewer".into()));
//!
//! assert_eq!(RunMode::default(), RunMode::Auto);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a node in a pipeline graph.
///
/// Assigned once at node creation and immutable thereafter. Backed by a
/// UUID v4; the string form is used in the persisted snapshot contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh node id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its persisted string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Required by thiserror: `GraphError::CycleDetected` has a field named
// `source` (a name fixed by the snapshot/spec contract), which thiserror
// always exposes via `Error::source()` and therefore must be `Error` itself.
impl std::error::Error for NodeId {}

/// Opaque identifier for a wire in a pipeline graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(Uuid);

impl WireId {
    /// Generate a fresh wire id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its persisted string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for WireId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Governs whether graph mutations schedule execution on their own.
///
/// - `Auto`: every invalidating mutation enqueues the affected node, and
///   timestamp moves arm a debounced whole-graph re-run.
/// - `Manual`: mutations only invalidate; the caller runs the pipeline
///   explicitly via `execute_all`/`execute_from`.
/// - `Step`: like `Manual`, for callers that drive node-by-node stepping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Auto,
    Manual,
    Step,
}

impl RunMode {
    /// Encode into the persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            RunMode::Auto => "auto",
            RunMode::Manual => "manual",
            RunMode::Step => "step",
        }
    }

    /// Decode the persisted string form. Returns `None` for unknown modes so
    /// snapshot loading can refuse them explicitly.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(RunMode::Auto),
            "manual" => Some(RunMode::Manual),
            "step" => Some(RunMode::Step),
            _ => None,
        }
    }

    /// Returns `true` if mutations should schedule execution themselves.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        matches!(self, RunMode::Auto)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Structural grouping of node kinds.
///
/// Family membership determines the structural rules a node lives under:
/// origin-family nodes may have zero inputs, are eligible pipeline entry
/// points, may never be the target of a wire, and are the ones invalidated
/// when the time cursor moves. Every other family participates in wiring
/// without restriction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeFamily {
    /// Data sources: read collections, single records, imports, webhooks.
    Origin,
    /// Row-level reshaping: filter, sort, field selection, dedupe.
    Shaping,
    /// Multi-row synthesis: aggregate, group, pivot, distinct.
    Synthesis,
    /// Model-backed transforms: classify, extract, summarize.
    Agent,
    /// Flow control: branch, switch, merge, join.
    Control,
    /// Outputs: preview, export, write-back, webhooks.
    Emission,
    /// Kinds this engine version does not recognize.
    Custom,
}

impl fmt::Display for NodeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeFamily::Origin => "origin",
            NodeFamily::Shaping => "shaping",
            NodeFamily::Synthesis => "synthesis",
            NodeFamily::Agent => "agent",
            NodeFamily::Control => "control",
            NodeFamily::Emission => "emission",
            NodeFamily::Custom => "custom",
        };
        write!(f, "{name}")
    }
}

/// Identifies the kind of a processing node.
///
/// `NodeKind` is a closed, versionable enumeration: every recognized kind is
/// a named variant, grouped into a [`NodeFamily`] that determines its
/// structural rules, and mapped by the executor registry to the computation
/// run when the node executes. Kinds from newer engine versions decode into
/// [`NodeKind::Custom`] so persisted pipelines keep loading; the registry
/// answers those with its identity fallback.
///
/// # Persistence
///
/// The persisted snapshot stores kinds by their string form via
/// [`encode`](Self::encode)/[`decode`](Self::decode).
///
/// # Examples
///
/// ```rust
/// use wireloom::types::{NodeKind, NodeFamily};
///
/// assert_eq!(NodeKind::Join.family(), NodeFamily::Control);
/// assert!(NodeKind::Query.is_origin());
///
/// let round_trip = NodeKind::decode(&NodeKind::SelectFields.encode());
/// assert_eq!(round_trip, NodeKind::SelectFields);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Origin family
    /// Read a full record collection from the workbench, temporally filtered
    /// to the pipeline's current timestamp.
    CollectionRead,
    /// Read a saved view (a named, pre-filtered collection slice).
    SavedViewRead,
    /// Focus on a single record by id.
    RecordFocus,
    /// Import rows supplied out-of-band (config-embedded data).
    ExternalImport,
    /// Run a query expression against a collection.
    Query,
    /// Rows delivered by an inbound webhook call.
    InboundWebhook,

    // Shaping family
    /// Keep rows matching a predicate.
    Filter,
    /// Order rows by a field.
    Sort,
    /// Keep only the named fields.
    SelectFields,
    /// Rename fields via a mapping.
    RenameFields,
    /// Drop duplicate rows by a field (or whole-row).
    Dedupe,
    /// Unwind an array-valued field into one row per element.
    Flatten,
    /// Drop or default rows with null/missing values in a field.
    NullHandling,
    /// Free-form per-row transform.
    Transform,

    // Synthesis family
    /// Reduce rows to a single value (count, sum, avg, min, max).
    Aggregate,
    /// Group rows by a field into keyed buckets.
    Group,
    /// Pivot rows into a cross-tabulation.
    Pivot,
    /// Hierarchical rollup aggregation.
    Rollup,
    /// Windowed aggregation over ordered rows.
    Window,
    /// Distinct values of a field.
    Distinct,

    // Agent family
    Classify,
    Extract,
    Generate,
    Embed,
    Summarize,
    SemanticMatch,

    // Control family
    /// Two-way split on a predicate, published on `true`/`false` ports.
    Branch,
    /// N-way split on a field's value, published on per-case ports.
    Switch,
    /// Concatenate all inputs into one row set.
    Merge,
    /// Relational join of two inputs on a key.
    Join,
    Loop,
    ErrorHandler,

    // Emission family
    /// Pass-through that surfaces the rows for inspection.
    Preview,
    WriteBack,
    /// Format rows as CSV or JSON text.
    Export,
    OutboundWebhook,
    /// Pass-through that records the rows to the event stream.
    Log,

    /// A kind this engine version does not recognize, preserved verbatim.
    ///
    /// Runs under the registry's identity fallback.
    Custom(String),
}

impl NodeKind {
    /// The structural family this kind belongs to.
    #[must_use]
    pub fn family(&self) -> NodeFamily {
        use NodeKind::*;
        match self {
            CollectionRead | SavedViewRead | RecordFocus | ExternalImport | Query
            | InboundWebhook => NodeFamily::Origin,
            Filter | Sort | SelectFields | RenameFields | Dedupe | Flatten | NullHandling
            | Transform => NodeFamily::Shaping,
            Aggregate | Group | Pivot | Rollup | Window | Distinct => NodeFamily::Synthesis,
            Classify | Extract | Generate | Embed | Summarize | SemanticMatch => NodeFamily::Agent,
            Branch | Switch | Merge | Join | Loop | ErrorHandler => NodeFamily::Control,
            Preview | WriteBack | Export | OutboundWebhook | Log => NodeFamily::Emission,
            Custom(_) => NodeFamily::Custom,
        }
    }

    /// Returns `true` if this kind belongs to the origin family.
    ///
    /// Origin nodes may have zero inputs, may never be a wire target, and are
    /// invalidated when the pipeline's time cursor moves.
    #[must_use]
    pub fn is_origin(&self) -> bool {
        self.family() == NodeFamily::Origin
    }

    /// Returns `true` if this is an unrecognized kind.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Encode into the persisted string form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use wireloom::types::NodeKind;
    /// assert_eq!(NodeKind::Filter.encode(), "filter");
    /// assert_eq!(NodeKind::Custom("acme".into()).encode(), "acme");
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        use NodeKind::*;
        let name = match self {
            CollectionRead => "collectionRead",
            SavedViewRead => "savedViewRead",
            RecordFocus => "recordFocus",
            ExternalImport => "externalImport",
            Query => "query",
            InboundWebhook => "inboundWebhook",
            Filter => "filter",
            Sort => "sort",
            SelectFields => "selectFields",
            RenameFields => "renameFields",
            Dedupe => "dedupe",
            Flatten => "flatten",
            NullHandling => "nullHandling",
            Transform => "transform",
            Aggregate => "aggregate",
            Group => "group",
            Pivot => "pivot",
            Rollup => "rollup",
            Window => "window",
            Distinct => "distinct",
            Classify => "classify",
            Extract => "extract",
            Generate => "generate",
            Embed => "embed",
            Summarize => "summarize",
            SemanticMatch => "semanticMatch",
            Branch => "branch",
            Switch => "switch",
            Merge => "merge",
            Join => "join",
            Loop => "loop",
            ErrorHandler => "errorHandler",
            Preview => "preview",
            WriteBack => "writeBack",
            Export => "export",
            OutboundWebhook => "outboundWebhook",
            Log => "log",
            Custom(s) => return s.clone(),
        };
        name.to_string()
    }

    /// Decode the persisted string form back into a kind.
    ///
    /// Forward compatible: unrecognized strings become
    /// [`NodeKind::Custom`] rather than failing, so snapshots written by a
    /// newer engine still load.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use wireloom::types::NodeKind;
    /// assert_eq!(NodeKind::decode("aggregate"), NodeKind::Aggregate);
    /// assert_eq!(
    ///     NodeKind::decode("somethingNewer"),
    ///     NodeKind::Custom("somethingNewer".into()),
    /// );
    /// ```
    pub fn decode(s: &str) -> Self {
        use NodeKind::*;
        match s {
            "collectionRead" => CollectionRead,
            "savedViewRead" => SavedViewRead,
            "recordFocus" => RecordFocus,
            "externalImport" => ExternalImport,
            "query" => Query,
            "inboundWebhook" => InboundWebhook,
            "filter" => Filter,
            "sort" => Sort,
            "selectFields" => SelectFields,
            "renameFields" => RenameFields,
            "dedupe" => Dedupe,
            "flatten" => Flatten,
            "nullHandling" => NullHandling,
            "transform" => Transform,
            "aggregate" => Aggregate,
            "group" => Group,
            "pivot" => Pivot,
            "rollup" => Rollup,
            "window" => Window,
            "distinct" => Distinct,
            "classify" => Classify,
            "extract" => Extract,
            "generate" => Generate,
            "embed" => Embed,
            "summarize" => Summarize,
            "semanticMatch" => SemanticMatch,
            "branch" => Branch,
            "switch" => Switch,
            "merge" => Merge,
            "join" => Join,
            "loop" => Loop,
            "errorHandler" => ErrorHandler,
            "preview" => Preview,
            "writeBack" => WriteBack,
            "export" => Export,
            "outboundWebhook" => OutboundWebhook,
            "log" => Log,
            other => Custom(other.to_string()),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

// Developer experience: allow string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        NodeKind::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_encode_decode_round_trip() {
        let kinds = [
            NodeKind::CollectionRead,
            NodeKind::Filter,
            NodeKind::Aggregate,
            NodeKind::Branch,
            NodeKind::Export,
            NodeKind::Custom("acmeWidget".into()),
        ];
        for kind in kinds {
            assert_eq!(NodeKind::decode(&kind.encode()), kind);
        }
    }

    #[test]
    fn families_cover_every_kind() {
        assert_eq!(NodeKind::Query.family(), NodeFamily::Origin);
        assert_eq!(NodeKind::Dedupe.family(), NodeFamily::Shaping);
        assert_eq!(NodeKind::Window.family(), NodeFamily::Synthesis);
        assert_eq!(NodeKind::Embed.family(), NodeFamily::Agent);
        assert_eq!(NodeKind::ErrorHandler.family(), NodeFamily::Control);
        assert_eq!(NodeKind::WriteBack.family(), NodeFamily::Emission);
        assert_eq!(NodeKind::Custom("x".into()).family(), NodeFamily::Custom);
    }

    #[test]
    fn origin_predicate_matches_family() {
        assert!(NodeKind::InboundWebhook.is_origin());
        assert!(!NodeKind::Merge.is_origin());
        assert!(!NodeKind::Custom("later".into()).is_origin());
    }

    #[test]
    fn run_mode_decode_rejects_unknown() {
        assert_eq!(RunMode::decode("auto"), Some(RunMode::Auto));
        assert_eq!(RunMode::decode("step"), Some(RunMode::Step));
        assert_eq!(RunMode::decode("turbo"), None);
    }

    #[test]
    fn ids_are_unique_and_parseable() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
        assert_eq!(NodeId::parse(&a.to_string()).unwrap(), a);
    }
}
