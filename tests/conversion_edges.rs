//! Conversion behavior on live edges: per-port converters, engine-level
//! registered pairs, and collection bridging through a running graph.

mod common;

use std::sync::Arc;

use chrono::DateTime;
use flowcanvas::canvas::{CanvasError, ConnectError};
use flowcanvas::types::PortRef;
use flowcanvas::value::{Value, ValueType};

fn seconds_to_datetime(value: &Value) -> Option<Value> {
    match value {
        Value::Float(x) => DateTime::from_timestamp(*x as i64, 0).map(Value::DateTime),
        Value::Int(i) => DateTime::from_timestamp(*i, 0).map(Value::DateTime),
        _ => None,
    }
}

/// A seconds value on a float output, driving a datetime input downstream.
/// The `add` node's `sum` output carries the narrow `float` type, unlike a
/// constant's `any` output which every input accepts.
fn seconds_source(canvas: &mut flowcanvas::canvas::Canvas, seconds: f64) -> flowcanvas::types::NodeId {
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let add = canvas.create_node("add", 0.0, 0.0).unwrap();
    canvas
        .set_property(constant, "value", Value::Float(seconds))
        .unwrap();
    canvas
        .connect(PortRef::output(constant, "value"), PortRef::input(add, "a"))
        .unwrap();
    add
}

#[tokio::test]
async fn per_port_converter_unlocks_and_converts_an_edge() {
    let mut canvas = common::canvas();
    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    let add = seconds_source(&mut canvas, 12.0);
    let stamp = canvas.create_node("timestamp", 0.0, 0.0).unwrap();

    let when = PortRef::input(stamp, "when");
    // Rejected without the converter...
    assert!(matches!(
        canvas.connect(PortRef::output(add, "sum"), when.clone()),
        Err(CanvasError::Connect(ConnectError::TypeMismatch { .. }))
    ));
    // ...accepted with it.
    canvas
        .set_input_converter(&when, Arc::new(seconds_to_datetime))
        .unwrap();
    canvas
        .connect(PortRef::output(add, "sum"), when)
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(add, "run"))
        .unwrap();
    canvas
        .connect(PortRef::output(add, "done"), PortRef::input(stamp, "run"))
        .unwrap();

    canvas.run().await.unwrap();
    assert_eq!(
        common::published(&canvas, stamp, "text"),
        Some(Value::Str("1970-01-01T00:00:12+00:00".into()))
    );
}

#[tokio::test]
async fn engine_registered_pair_applies_to_every_edge() {
    let mut canvas = common::canvas();
    canvas.conversion().register_converter(
        ValueType::Float,
        ValueType::DateTime,
        Arc::new(seconds_to_datetime),
    );

    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    let add = seconds_source(&mut canvas, 60.0);
    let stamp = canvas.create_node("timestamp", 0.0, 0.0).unwrap();
    canvas
        .connect(PortRef::output(add, "sum"), PortRef::input(stamp, "when"))
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(add, "run"))
        .unwrap();
    canvas
        .connect(PortRef::output(add, "done"), PortRef::input(stamp, "run"))
        .unwrap();

    canvas.run().await.unwrap();
    assert_eq!(
        common::published(&canvas, stamp, "text"),
        Some(Value::Str("1970-01-01T00:01:00+00:00".into()))
    );
}

#[test]
fn converters_attach_to_data_inputs_only() {
    let mut canvas = common::canvas();
    let add = canvas.create_node("add", 0.0, 0.0).unwrap();
    assert!(matches!(
        canvas.set_input_converter(
            &PortRef::output(add, "sum"),
            Arc::new(seconds_to_datetime)
        ),
        Err(CanvasError::ConverterTarget { .. })
    ));
    assert!(matches!(
        canvas.set_input_converter(
            &PortRef::input(add, "run"),
            Arc::new(seconds_to_datetime)
        ),
        Err(CanvasError::ConverterTarget { .. })
    ));
}

#[tokio::test]
async fn unconnected_and_unconvertible_inputs_fall_back_to_defaults() {
    // `add` with only one input connected: the other reads as 0.
    let mut canvas = common::canvas();
    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let add = canvas.create_node("add", 0.0, 0.0).unwrap();
    canvas.set_property(constant, "value", Value::Float(8.0)).unwrap();
    canvas
        .connect(PortRef::output(constant, "value"), PortRef::input(add, "a"))
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(add, "run"))
        .unwrap();

    canvas.run().await.unwrap();
    assert_eq!(common::published(&canvas, add, "sum"), Some(Value::Float(8.0)));
}

#[tokio::test]
async fn collection_values_bridge_across_any_typed_edges() {
    // A list constant through an `Any` print input arrives intact.
    let (mut canvas, sink) = common::observed_canvas();
    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let print = canvas.create_node("print", 0.0, 0.0).unwrap();
    canvas
        .set_property(
            constant,
            "value",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )
        .unwrap();
    canvas
        .connect(
            PortRef::output(constant, "value"),
            PortRef::input(print, "value"),
        )
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(print, "run"))
        .unwrap();

    canvas.run().await.unwrap();
    canvas.event_bus().pump();
    let printed = sink.snapshot().into_iter().find_map(|e| match e {
        flowcanvas::event_bus::CanvasEvent::NodeMessage { message, .. } => Some(message),
        _ => None,
    });
    assert_eq!(printed.as_deref(), Some("[1, 2, 3]"));
}
