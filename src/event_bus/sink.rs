use std::io::{self, Result as IoResult};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::event::PipelineEvent;

/// Abstraction over an output target that consumes full event objects.
pub trait EventSink: Sync + Send {
    /// Handle a structured event. The sink decides how to render it.
    fn handle(&mut self, event: &PipelineEvent) -> IoResult<()>;
}

/// Routes events onto the `tracing` subscriber under the
/// `wireloom::events` target. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn handle(&mut self, event: &PipelineEvent) -> IoResult<()> {
        tracing::info!(target: "wireloom::events", kind = event.kind_label(), "{event}");
        Ok(())
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events so far.
    pub fn snapshot(&self) -> Vec<PipelineEvent> {
        self.entries.lock().unwrap().clone()
    }

    /// Drop all captured events.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &PipelineEvent) -> IoResult<()> {
        self.entries.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming to async consumers.
///
/// Events are forwarded to a tokio mpsc channel without blocking. Useful
/// for live dashboards or SSE endpoints mirroring a pipeline.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &PipelineEvent) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
