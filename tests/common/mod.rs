#![allow(dead_code)]

pub mod nodes;

use std::sync::Arc;

use flowcanvas::canvas::Canvas;
use flowcanvas::event_bus::{EventBus, MemorySink};
use flowcanvas::registry::NodeRegistry;
use flowcanvas::types::NodeId;
use flowcanvas::value::Value;

/// Registry with every built-in plus the test-only behaviors.
pub fn test_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    nodes::install(&mut registry);
    registry
}

pub fn canvas() -> Canvas {
    Canvas::new(Arc::new(test_registry()))
}

/// Canvas wired to a memory sink; call `canvas.event_bus().pump()` then
/// `sink.snapshot()` to observe events.
pub fn observed_canvas() -> (Canvas, MemorySink) {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    (Canvas::with_event_bus(Arc::new(test_registry()), bus), sink)
}

/// Last published value on a node output, `None` until something published.
pub fn published(canvas: &Canvas, node: NodeId, port: &str) -> Option<Value> {
    canvas
        .node(node)
        .and_then(|n| n.output(port))
        .and_then(|p| p.published())
        .filter(|v| !v.is_null())
}
