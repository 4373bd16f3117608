//! Ports and connections.
//!
//! A [`Port`] is one endpoint on a node: data input, data output, flow-in,
//! or flow-out. Output ports own a shared [`ValueSlot`] holding their last
//! published value; connected inputs read from that slot at execution time,
//! so data never travels eagerly along edges.
//!
//! Connections are plain entities addressed by id; only the canvas creates
//! and destroys them, and it keeps the symmetry invariant: a connection id
//! appears in both endpoint ports' connection lists, or in neither.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::convert::CustomConverter;
use crate::types::{ConnectionId, NodeId, PortKind, PortRef};
use crate::value::{Value, ValueType};

/// Shared storage for an output port's last published value.
pub type ValueSlot = Arc<RwLock<Value>>;

/// Whether a port or property was declared statically in the node schema or
/// materialized by a dynamic layout pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementOrigin {
    Static,
    Dynamic { key: String },
}

impl ElementOrigin {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ElementOrigin::Dynamic { .. })
    }
}

/// One endpoint on a node.
pub struct Port {
    pub name: String,
    pub kind: PortKind,
    pub value_type: ValueType,
    pub visible: bool,
    pub origin: ElementOrigin,
    /// Connection ids touching this port, in attach order.
    pub connections: Vec<ConnectionId>,
    /// Input-side override applied before the engine-level conversion.
    pub(crate) converter: Option<CustomConverter>,
    /// Output ports publish here; `None` for every other kind.
    pub(crate) slot: Option<ValueSlot>,
}

impl Port {
    pub fn input(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PortKind::Input, value_type)
    }

    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        let mut port = Self::new(name, PortKind::Output, value_type);
        port.slot = Some(Arc::new(RwLock::new(Value::Null)));
        port
    }

    pub fn flow_in(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::FlowIn, ValueType::Flow)
    }

    pub fn flow_out(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::FlowOut, ValueType::Flow)
    }

    fn new(name: impl Into<String>, kind: PortKind, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type,
            visible: true,
            origin: ElementOrigin::Static,
            connections: Vec::new(),
            converter: None,
            slot: None,
        }
    }

    pub fn dynamic(mut self, key: impl Into<String>) -> Self {
        self.origin = ElementOrigin::Dynamic { key: key.into() };
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Data inputs hold at most one connection; every other kind fans out.
    pub fn is_single_connection(&self) -> bool {
        self.kind == PortKind::Input
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Shared slot for output ports, `None` otherwise.
    pub fn slot(&self) -> Option<&ValueSlot> {
        self.slot.as_ref()
    }

    /// Last published value of an output port.
    pub fn published(&self) -> Option<Value> {
        self.slot.as_ref().map(|s| s.read().clone())
    }

    /// Connection-time type check: can a value of `source` type arrive here?
    /// A registered per-port converter overrides the static check.
    pub fn can_accept(&self, source: &ValueType) -> bool {
        if self.kind.is_flow() {
            return matches!(source, ValueType::Flow);
        }
        self.converter.is_some() || self.value_type.accepts(source)
    }

    pub(crate) fn attach(&mut self, id: ConnectionId) {
        if !self.connections.contains(&id) {
            self.connections.push(id);
        }
    }

    pub(crate) fn detach(&mut self, id: ConnectionId) {
        self.connections.retain(|c| *c != id);
    }
}

/// An edge between an output-side port and an input-side port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: PortRef,
    pub target: PortRef,
}

impl Connection {
    pub fn new(source: PortRef, target: PortRef) -> Self {
        Self::with_id(ConnectionId::new(), source, target)
    }

    pub fn with_id(id: ConnectionId, source: PortRef, target: PortRef) -> Self {
        Self { id, source, target }
    }

    pub fn touches_node(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }

    pub fn touches_port(&self, port: &PortRef) -> bool {
        &self.source == port || &self.target == port
    }
}
