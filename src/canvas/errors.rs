//! Canvas error types.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::{ConnectionId, GroupId, NodeId, PortKind, PortRef};
use crate::value::ValueType;

/// Reasons a connection request is rejected.
///
/// Validation runs in a fixed order: endpoint existence, distinct nodes,
/// kind pairing, then type acceptance. The first failing check wins.
#[derive(Debug, Error, Diagnostic)]
pub enum ConnectError {
    #[error("no such port: {port}")]
    #[diagnostic(
        code(flowcanvas::canvas::port_not_found),
        help("Port addresses are (node, direction, name); dynamic ports vanish when the layout changes.")
    )]
    PortNotFound { port: PortRef },

    // Fields named `source` would become the error's cause chain under the
    // derive, so the offending port goes by `source_port`.
    #[error("cannot connect a node to itself: {source_port} -> {target}")]
    #[diagnostic(code(flowcanvas::canvas::same_node))]
    SameNode {
        source_port: PortRef,
        target: PortRef,
    },

    #[error("port kinds do not pair: {source_port} is {source_kind}, {target} is {target_kind}")]
    #[diagnostic(
        code(flowcanvas::canvas::kind_mismatch),
        help("Connections run output-to-input within one layer: data to data, flow to flow.")
    )]
    KindMismatch {
        source_port: PortRef,
        source_kind: PortKind,
        target: PortRef,
        target_kind: PortKind,
    },

    #[error("{target} ({target_type}) does not accept values from {source_port} ({source_type})")]
    #[diagnostic(
        code(flowcanvas::canvas::type_mismatch),
        help("Register a converter for this type pair, or route through a converting node.")
    )]
    TypeMismatch {
        source_port: PortRef,
        source_type: ValueType,
        target: PortRef,
        target_type: ValueType,
    },
}

/// Errors from canvas structural operations.
#[derive(Debug, Error, Diagnostic)]
pub enum CanvasError {
    #[error("unknown node type: {type_name}")]
    #[diagnostic(
        code(flowcanvas::canvas::unknown_node_type),
        help("Register the type on the NodeRegistry this canvas was built with.")
    )]
    UnknownNodeType { type_name: String },

    #[error("a node with id {node} already exists")]
    #[diagnostic(code(flowcanvas::canvas::duplicate_node_id))]
    DuplicateNodeId { node: NodeId },

    #[error("no such node: {node}")]
    #[diagnostic(code(flowcanvas::canvas::node_not_found))]
    NodeNotFound { node: NodeId },

    #[error("no such port: {port}")]
    #[diagnostic(code(flowcanvas::canvas::port_not_found))]
    PortNotFound { port: PortRef },

    #[error("no such connection: {connection}")]
    #[diagnostic(code(flowcanvas::canvas::connection_not_found))]
    ConnectionNotFound { connection: ConnectionId },

    #[error("no such group: {group}")]
    #[diagnostic(code(flowcanvas::canvas::group_not_found))]
    GroupNotFound { group: GroupId },

    #[error("node {node} has no property `{name}`")]
    #[diagnostic(code(flowcanvas::canvas::property_not_found))]
    PropertyNotFound { node: NodeId, name: String },

    #[error("value not convertible for property `{name}` on {node} (expects {expected})")]
    #[diagnostic(
        code(flowcanvas::canvas::property_type),
        help("Property values are coerced through the conversion engine; this pair has no path.")
    )]
    PropertyType {
        node: NodeId,
        name: String,
        expected: ValueType,
    },

    #[error("converters attach to data input ports only: {port}")]
    #[diagnostic(code(flowcanvas::canvas::converter_target))]
    ConverterTarget { port: PortRef },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Connect(#[from] ConnectError),
}
