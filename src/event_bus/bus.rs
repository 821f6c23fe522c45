use std::sync::{Arc, Mutex};

use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task;

use super::event::PipelineEvent;
use super::sink::{ChannelSink, EventSink, TracingSink};

/// Receives pipeline events and broadcasts them to every attached sink.
///
/// Producers hold a cloned [`flume::Sender`] from [`EventBus::get_sender`];
/// a background listener drains the channel and fans out. The listener is
/// started explicitly so a bus can also be used as a passive channel in
/// tests.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<PipelineEvent>, flume::Receiver<PipelineEvent>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(TracingSink)
    }
}

impl EventBus {
    /// Bus with a single sink and an unbounded channel.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::build(vec![Box::new(sink)], None)
    }

    /// Bus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self::build(sinks, None)
    }

    /// Bus with a bounded channel. Producers emit best-effort, so a full
    /// buffer drops events instead of blocking executors.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(vec![Box::new(TracingSink)], Some(capacity))
    }

    fn build(sinks: Vec<Box<dyn EventSink>>, capacity: Option<usize>) -> Self {
        let event_channel = match capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().unwrap().push(Box::new(sink));
    }

    /// Clone of the sender side so producers can emit events.
    pub fn get_sender(&self) -> flume::Sender<PipelineEvent> {
        self.event_channel.0.clone()
    }

    /// Subscribe to the live event feed as an async stream.
    ///
    /// Requires the listener to be running; events published before the
    /// subscription are not replayed.
    pub fn subscribe(&self) -> impl Stream<Item = PipelineEvent> + Send + Unpin {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_sink(ChannelSink::new(tx));
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        }))
    }

    /// Spawn a background task that drains the channel into the sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock().expect("listener poisoned");
        if guard.is_some() {
            return;
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        // Every sender dropped; nothing more will arrive.
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock().unwrap();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(error) = sink.handle(&event) {
                                    tracing::warn!(%error, "event sink failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener, waiting for in-flight fan-out.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(state) = guard.take() {
                let _ = state.shutdown_tx.send(());
                state.handle.abort();
            }
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::{GraphChange, MemorySink};
    use std::time::Duration;

    #[tokio::test]
    async fn listener_fans_out_to_sinks() {
        let sink = MemorySink::new();
        let bus = EventBus::with_sink(sink.clone());
        bus.listen_for_events();

        let sender = bus.get_sender();
        sender
            .send(PipelineEvent::graph(GraphChange::NodeRemoved {
                node_id: "n".to_string(),
            }))
            .unwrap();
        sender.send(PipelineEvent::run_completed(2, 0)).unwrap();

        // The listener drains asynchronously.
        for _ in 0..50 {
            if sink.snapshot().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.snapshot().len(), 2);
        bus.stop_listener().await;
    }

    #[tokio::test]
    async fn subscribe_streams_live_events() {
        use futures_util::StreamExt;

        let bus = EventBus::with_sink(MemorySink::new());
        let mut stream = bus.subscribe();
        bus.listen_for_events();

        bus.get_sender()
            .send(PipelineEvent::run_completed(1, 1))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream produced no event in time");
        assert_eq!(event, Some(PipelineEvent::run_completed(1, 1)));
        bus.stop_listener().await;
    }

    #[tokio::test]
    async fn listener_start_is_idempotent() {
        let bus = EventBus::default();
        bus.listen_for_events();
        bus.listen_for_events();
        bus.stop_listener().await;
    }
}
