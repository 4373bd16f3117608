//! Dynamic port reconfiguration and property promotion.

mod common;

use flowcanvas::canvas::CanvasError;
use flowcanvas::event_bus::CanvasEvent;
use flowcanvas::ports::ElementOrigin;
use flowcanvas::types::{PortKind, PortRef};
use flowcanvas::value::{Value, ValueType};

#[test]
fn template_edits_grow_and_shrink_argument_ports() {
    let mut canvas = common::canvas();
    let format = canvas.create_node("format", 0.0, 0.0).unwrap();

    canvas
        .set_property(format, "template", Value::Str("{} + {} = {}".into()))
        .unwrap();
    {
        let node = canvas.node(format).unwrap();
        for name in ["arg0", "arg1", "arg2"] {
            let port = node.input(name).unwrap();
            assert!(port.origin.is_dynamic());
            assert_eq!(port.value_type, ValueType::Str);
        }
        assert!(node.input("arg3").is_none());
    }

    canvas
        .set_property(format, "template", Value::Str("just {}".into()))
        .unwrap();
    let node = canvas.node(format).unwrap();
    assert!(node.input("arg0").is_some());
    assert!(node.input("arg1").is_none());
    assert!(node.input("arg2").is_none());
}

#[test]
fn shrinking_the_layout_drops_connections_to_removed_ports() {
    let mut canvas = common::canvas();
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let format = canvas.create_node("format", 0.0, 0.0).unwrap();
    canvas
        .set_property(format, "template", Value::Str("{} {}".into()))
        .unwrap();
    canvas
        .connect(
            PortRef::output(constant, "value"),
            PortRef::input(format, "arg1"),
        )
        .unwrap();

    canvas
        .set_property(format, "template", Value::Str("{}".into()))
        .unwrap();

    assert!(canvas.connections().is_empty());
    assert!(!canvas
        .node(constant)
        .unwrap()
        .output("value")
        .unwrap()
        .is_connected());
}

#[test]
fn surviving_ports_keep_their_connections_across_reconfigure() {
    let mut canvas = common::canvas();
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let format = canvas.create_node("format", 0.0, 0.0).unwrap();
    canvas
        .set_property(format, "template", Value::Str("{} {}".into()))
        .unwrap();
    let kept = canvas
        .connect(
            PortRef::output(constant, "value"),
            PortRef::input(format, "arg0"),
        )
        .unwrap();

    canvas
        .set_property(format, "template", Value::Str("{} and {} and {}".into()))
        .unwrap();

    assert!(canvas.connection(kept).is_some());
    assert_eq!(
        canvas.node(format).unwrap().input("arg0").unwrap().connections,
        vec![kept]
    );
    assert!(canvas.node(format).unwrap().input("arg2").is_some());
}

#[test]
fn reconfigure_events_carry_the_diff() {
    let (mut canvas, sink) = common::observed_canvas();
    let format = canvas.create_node("format", 0.0, 0.0).unwrap();
    canvas
        .set_property(format, "template", Value::Str("{}".into()))
        .unwrap();
    canvas.event_bus().pump();

    let reconfigured: Vec<CanvasEvent> = sink
        .snapshot()
        .into_iter()
        .filter(|e| matches!(e, CanvasEvent::NodeReconfigured { .. }))
        .collect();
    assert_eq!(reconfigured.len(), 1);
    let CanvasEvent::NodeReconfigured { node, added, removed } = &reconfigured[0] else {
        unreachable!();
    };
    assert_eq!(*node, format);
    assert_eq!(added, &vec![PortRef::input(format, "arg0")]);
    assert!(removed.is_empty());
}

#[test]
fn connectable_properties_are_promoted_to_hidden_inputs() {
    let mut canvas = common::canvas();
    let sequence = canvas.create_node("sequence", 0.0, 0.0).unwrap();
    let node = canvas.node(sequence).unwrap();

    for name in ["from", "to"] {
        let port = node.input(name).unwrap();
        assert_eq!(port.kind, PortKind::Input);
        assert_eq!(port.value_type, ValueType::Int);
        assert!(!port.visible);
        assert!(matches!(port.origin, ElementOrigin::Dynamic { .. }));
    }

    // The promoted port is a real input: it connects and survives edits.
    let constant = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let to_port = PortRef::input(sequence, "to");
    canvas.set_port_visible(&to_port, true).unwrap();
    canvas
        .connect(PortRef::output(constant, "value"), to_port.clone())
        .unwrap();
    canvas
        .set_property(sequence, "from", Value::Int(3))
        .unwrap();
    assert!(canvas.find_port(&to_port).unwrap().is_connected());
}

#[test]
fn property_values_are_coerced_like_any_edge() {
    let mut canvas = common::canvas();
    let sequence = canvas.create_node("sequence", 0.0, 0.0).unwrap();
    canvas
        .set_property(sequence, "to", Value::Str("7".into()))
        .unwrap();
    assert_eq!(
        canvas.node(sequence).unwrap().property("to").unwrap().value,
        Value::Int(7)
    );

    assert!(matches!(
        canvas.set_property(sequence, "to", Value::Str("many".into())),
        Err(CanvasError::PropertyType { .. })
    ));
    assert!(matches!(
        canvas.set_property(sequence, "nope", Value::Int(1)),
        Err(CanvasError::PropertyNotFound { .. })
    ));
}
