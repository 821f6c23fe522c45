//! Pipeline event feed: fan-out bus, sinks, and subscriber APIs.
//!
//! Structural changes, node messages, and run summaries all travel as
//! [`PipelineEvent`]s through an [`EventBus`]. Sinks decide presentation;
//! the default routes onto the `tracing` subscriber, while [`MemorySink`]
//! and [`ChannelSink`] serve tests and live consumers.

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{GraphChange, NodeMessage, PipelineEvent, RunSummary};
pub use sink::{ChannelSink, EventSink, MemorySink, TracingSink};
