//! Canvas event fan-out.
//!
//! Every structural mutation and every execution-time diagnostic is emitted
//! as a [`CanvasEvent`] through the canvas's [`EventBus`]. Producers hold a
//! cheap [`EventEmitter`]; the bus broadcasts to any number of
//! [`EventSink`]s, either from a background listener task
//! ([`EventBus::listen_for_events`]) or synchronously on demand
//! ([`EventBus::pump`]).

use std::fmt;
use std::io::{self, Result as IoResult, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task;

use crate::types::{ConnectionId, GroupId, NodeId, PortRef};

/// A structural or execution event observed on a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanvasEvent {
    NodeAdded {
        node: NodeId,
        type_name: String,
    },
    NodeRemoved {
        node: NodeId,
    },
    /// A node's dynamic port set changed after a property edit.
    NodeReconfigured {
        node: NodeId,
        added: Vec<PortRef>,
        removed: Vec<PortRef>,
    },
    ConnectionAdded {
        connection: ConnectionId,
        source: PortRef,
        target: PortRef,
    },
    ConnectionRemoved {
        connection: ConnectionId,
        source: PortRef,
        target: PortRef,
    },
    GroupAdded {
        group: GroupId,
    },
    GroupRemoved {
        group: GroupId,
    },
    /// An output port published a value observers should re-read.
    PortValueChanged {
        port: PortRef,
    },
    PropertyChanged {
        node: NodeId,
        name: String,
    },
    /// Free-form message emitted by a node during execution.
    NodeMessage {
        node: NodeId,
        scope: String,
        message: String,
        when: DateTime<Utc>,
    },
    /// A flow execution finished.
    RunCompleted {
        nodes_run: u64,
        activations: u64,
    },
}

impl CanvasEvent {
    pub fn node_message(node: NodeId, scope: impl Into<String>, message: impl Into<String>) -> Self {
        CanvasEvent::NodeMessage {
            node,
            scope: scope.into(),
            message: message.into(),
            when: Utc::now(),
        }
    }

    /// Short label identifying the event family, for sinks that group output.
    pub fn label(&self) -> &'static str {
        match self {
            CanvasEvent::NodeAdded { .. } => "node_added",
            CanvasEvent::NodeRemoved { .. } => "node_removed",
            CanvasEvent::NodeReconfigured { .. } => "node_reconfigured",
            CanvasEvent::ConnectionAdded { .. } => "connection_added",
            CanvasEvent::ConnectionRemoved { .. } => "connection_removed",
            CanvasEvent::GroupAdded { .. } => "group_added",
            CanvasEvent::GroupRemoved { .. } => "group_removed",
            CanvasEvent::PortValueChanged { .. } => "port_value_changed",
            CanvasEvent::PropertyChanged { .. } => "property_changed",
            CanvasEvent::NodeMessage { .. } => "node_message",
            CanvasEvent::RunCompleted { .. } => "run_completed",
        }
    }
}

impl fmt::Display for CanvasEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasEvent::NodeAdded { node, type_name } => {
                write!(f, "[node_added] {type_name} {node}")
            }
            CanvasEvent::NodeRemoved { node } => write!(f, "[node_removed] {node}"),
            CanvasEvent::NodeReconfigured { node, added, removed } => write!(
                f,
                "[node_reconfigured] {node} +{} -{}",
                added.len(),
                removed.len()
            ),
            CanvasEvent::ConnectionAdded { source, target, .. } => {
                write!(f, "[connection_added] {source} -> {target}")
            }
            CanvasEvent::ConnectionRemoved { source, target, .. } => {
                write!(f, "[connection_removed] {source} -> {target}")
            }
            CanvasEvent::GroupAdded { group } => write!(f, "[group_added] {group}"),
            CanvasEvent::GroupRemoved { group } => write!(f, "[group_removed] {group}"),
            CanvasEvent::PortValueChanged { port } => write!(f, "[port_value_changed] {port}"),
            CanvasEvent::PropertyChanged { node, name } => {
                write!(f, "[property_changed] {node}.{name}")
            }
            CanvasEvent::NodeMessage {
                node,
                scope,
                message,
                ..
            } => write!(f, "[{scope}] {node}: {message}"),
            CanvasEvent::RunCompleted {
                nodes_run,
                activations,
            } => write!(f, "[run_completed] nodes={nodes_run} activations={activations}"),
        }
    }
}

/// Abstraction over an output target that consumes full events.
pub trait EventSink: Send + Sync {
    fn handle(&mut self, event: &CanvasEvent) -> IoResult<()>;
}

/// Stdout sink writing one line per event.
#[derive(Default)]
pub struct StdOutSink;

impl EventSink for StdOutSink {
    fn handle(&mut self, event: &CanvasEvent) -> IoResult<()> {
        let mut out = io::stdout();
        writeln!(out, "{event}")?;
        out.flush()
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<CanvasEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<CanvasEvent> {
        self.entries.lock().expect("sink poisoned").clone()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("sink poisoned").clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &CanvasEvent) -> IoResult<()> {
        self.entries
            .lock()
            .expect("sink poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Channel sink for streaming events to async consumers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CanvasEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<CanvasEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &CanvasEvent) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}

/// Cheap, cloneable producer handle.
///
/// Emission is best-effort: once the owning bus is gone the emitter drops
/// events silently. Structural code paths never fail on observation.
#[derive(Clone)]
pub struct EventEmitter {
    tx: flume::Sender<CanvasEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: CanvasEvent) {
        let _ = self.tx.send(event);
    }
}

/// Receives events and broadcasts them to registered sinks.
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<CanvasEvent>, flume::Receiver<CanvasEvent>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with no sinks. Events accumulate in the channel until a
    /// listener runs or [`EventBus::pump`] drains them.
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(Mutex::new(Vec::new())),
            event_channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_sink<T: EventSink + 'static>(sink: T) -> Self {
        let bus = Self::new();
        bus.add_sink(sink);
        bus
    }

    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().expect("sinks poisoned").push(Box::new(sink));
    }

    /// Get a producer handle for this bus.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            tx: self.event_channel.0.clone(),
        }
    }

    /// Synchronously drain pending events into the sinks. Useful in tests
    /// and in callers that do not run a listener task.
    pub fn pump(&self) {
        while let Ok(event) = self.event_channel.1.try_recv() {
            self.dispatch(&event);
        }
    }

    fn dispatch(&self, event: &CanvasEvent) {
        let mut sinks = self.sinks.lock().expect("sinks poisoned");
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.handle(event) {
                eprintln!("event bus sink error: {e}");
            }
        }
    }

    /// Spawn a background task that listens for events and broadcasts to all
    /// sinks. Idempotent: calling multiple times has no effect. Requires a
    /// tokio runtime.
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
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock().expect("sinks poisoned");
                            for sink in sinks_guard.iter_mut() {
                                if let Err(e) = sink.handle(&event) {
                                    eprintln!("event bus sink error: {e}");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState { shutdown_tx, handle });
    }

    /// Stop the background listener task, draining anything still queued.
    pub async fn stop_listener(&self) {
        let state = {
            let mut guard = self.listener.lock().expect("listener poisoned");
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
        self.pump();
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

    #[test]
    fn pump_delivers_to_memory_sink() {
        let sink = MemorySink::new();
        let bus = EventBus::with_sink(sink.clone());
        let emitter = bus.emitter();
        let node = NodeId::new();
        emitter.emit(CanvasEvent::NodeRemoved { node });
        bus.pump();
        assert_eq!(sink.snapshot(), vec![CanvasEvent::NodeRemoved { node }]);
    }

    #[test]
    fn emitter_outlives_bus_silently() {
        let emitter = {
            let bus = EventBus::new();
            bus.emitter()
        };
        emitter.emit(CanvasEvent::NodeRemoved { node: NodeId::new() });
    }

    #[tokio::test]
    async fn channel_sink_streams_to_async_consumers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = EventBus::with_sink(ChannelSink::new(tx));
        let node = NodeId::new();
        bus.emitter().emit(CanvasEvent::NodeRemoved { node });
        bus.pump();
        assert_eq!(rx.recv().await, Some(CanvasEvent::NodeRemoved { node }));
    }

    #[tokio::test]
    async fn listener_broadcasts_until_stopped() {
        let sink = MemorySink::new();
        let bus = EventBus::with_sink(sink.clone());
        bus.listen_for_events();
        let emitter = bus.emitter();
        emitter.emit(CanvasEvent::RunCompleted {
            nodes_run: 3,
            activations: 2,
        });
        bus.stop_listener().await;
        assert_eq!(sink.snapshot().len(), 1);
    }
}
