//! Canvas document round-trips and tolerant restore.

mod common;

use std::sync::Arc;

use flowcanvas::canvas::NodeGroup;
use flowcanvas::persist::{self, PersistError};
use flowcanvas::registry::NodeRegistry;
use flowcanvas::types::PortRef;
use flowcanvas::value::Value;

#[test]
fn round_trip_preserves_structure_and_values() {
    let mut canvas = common::canvas();
    let start = canvas.create_node("start", 1.0, 2.0).unwrap();
    let constant = canvas.create_node("constant", 3.0, 4.0).unwrap();
    let format = canvas.create_node("format", 5.0, 6.0).unwrap();
    canvas.node_mut(constant).unwrap().name = "answer".to_string();
    canvas.set_property(constant, "value", Value::Int(42)).unwrap();
    canvas
        .set_property(format, "template", Value::Str("{} {}".into()))
        .unwrap();
    let data_edge = canvas
        .connect(
            PortRef::output(constant, "value"),
            PortRef::input(format, "arg0"),
        )
        .unwrap();
    let flow_edge = canvas
        .connect(PortRef::output(start, "run"), PortRef::input(format, "run"))
        .unwrap();
    let group_id = canvas.add_group(
        NodeGroup::new("text")
            .with_color("#ff8800")
            .with_nodes([constant, format]),
    );

    let json = persist::to_json(&canvas).unwrap();
    let restored = persist::from_json(&json, Arc::new(common::test_registry())).unwrap();

    // Nodes with identity, placement, and display state.
    let node = restored.node(constant).unwrap();
    assert_eq!(node.type_name(), "constant");
    assert_eq!(node.name, "answer");
    assert_eq!((node.x, node.y), (3.0, 4.0));
    assert_eq!(node.property("value").unwrap().value, Value::Int(42));

    // Dynamic ports re-materialized from the restored template.
    let format_node = restored.node(format).unwrap();
    assert!(format_node.input("arg0").is_some());
    assert!(format_node.input("arg1").is_some());

    // Connections with preserved identity, symmetric on both ports.
    assert_eq!(restored.connections().len(), 2);
    assert!(restored.connection(data_edge).is_some());
    assert!(restored.connection(flow_edge).is_some());
    assert!(format_node.input("arg0").unwrap().connections.contains(&data_edge));

    // Groups.
    let group = restored.group(group_id).unwrap();
    assert_eq!(group.name, "text");
    assert_eq!(group.node_ids, vec![constant, format]);
}

#[test]
fn unknown_node_types_are_skipped_with_their_connections() {
    let mut canvas = common::canvas();
    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    let fail = canvas.create_node("fail", 0.0, 0.0).unwrap();
    let print = canvas.create_node("print", 0.0, 0.0).unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(fail, "run"))
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(print, "run"))
        .unwrap();
    let json = persist::to_json(&canvas).unwrap();

    // Restore against a registry without the test-only `fail` type.
    let restored = persist::from_json(&json, Arc::new(NodeRegistry::with_builtins())).unwrap();

    assert!(restored.node(fail).is_none());
    assert!(restored.node(start).is_some());
    assert_eq!(restored.connections().len(), 1);
    assert!(restored
        .node(print)
        .unwrap()
        .flow_in("run")
        .unwrap()
        .is_connected());
}

#[test]
fn hidden_ports_stay_hidden_after_restore() {
    let mut canvas = common::canvas();
    let add = canvas.create_node("add", 0.0, 0.0).unwrap();
    let b = PortRef::input(add, "b");
    canvas.set_port_visible(&b, false).unwrap();

    let json = persist::to_json(&canvas).unwrap();
    let restored = persist::from_json(&json, Arc::new(common::test_registry())).unwrap();
    assert!(!restored.find_port(&b).unwrap().visible);
}

#[test]
fn garbage_and_version_mismatches_are_fatal() {
    let registry = Arc::new(common::test_registry());
    assert!(matches!(
        persist::from_json("{not json", registry.clone()),
        Err(PersistError::Parse(_))
    ));
    let future = r#"{"version": 99, "nodes": [], "connections": []}"#;
    assert!(matches!(
        persist::from_json(future, registry),
        Err(PersistError::UnsupportedVersion { found: 99 })
    ));
}

#[tokio::test]
async fn file_round_trip() {
    let mut canvas = common::canvas();
    let add = addition(&mut canvas);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("canvas.json");
    persist::save_to_file(&canvas, &path).await.unwrap();

    let restored = persist::load_from_file(&path, Arc::new(common::test_registry()))
        .await
        .unwrap();
    restored.run().await.unwrap();
    assert_eq!(
        common::published(&restored, add, "sum"),
        Some(Value::Float(12.0))
    );
}

fn addition(canvas: &mut flowcanvas::canvas::Canvas) -> flowcanvas::types::NodeId {
    let five = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let seven = canvas.create_node("constant", 0.0, 0.0).unwrap();
    let add = canvas.create_node("add", 0.0, 0.0).unwrap();
    let start = canvas.create_node("start", 0.0, 0.0).unwrap();
    canvas.set_property(five, "value", Value::Float(5.0)).unwrap();
    canvas.set_property(seven, "value", Value::Float(7.0)).unwrap();
    canvas
        .connect(PortRef::output(five, "value"), PortRef::input(add, "a"))
        .unwrap();
    canvas
        .connect(PortRef::output(seven, "value"), PortRef::input(add, "b"))
        .unwrap();
    canvas
        .connect(PortRef::output(start, "run"), PortRef::input(add, "run"))
        .unwrap();
    add
}
