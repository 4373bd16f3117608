//! The canvas: owning container for nodes, connections, and groups.
//!
//! All structural mutation goes through [`Canvas`] methods, which is what
//! keeps the graph invariants local to this module:
//!
//! - a [`ConnectionId`] appears in both endpoint ports' lists, or neither;
//! - a data input holds at most one connection (connecting again replaces);
//! - removing a node removes every connection touching it;
//! - dynamic ports and properties always match the node's current
//!   [`DynamicLayout`](crate::node::DynamicLayout).
//!
//! Ports never reach back into the canvas; they are addressed by
//! [`PortRef`] and resolved here.

mod errors;
mod groups;

pub use errors::{CanvasError, ConnectError};
pub use groups::NodeGroup;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::convert::{ConversionEngine, CustomConverter};
use crate::engine::{ExecutionEngine, ExecutionError, RunReport};
use crate::event_bus::{CanvasEvent, EventBus, EventEmitter};
use crate::node::{port_from_spec, DynamicLayout, NodeInstance, PortSpec, Property};
use crate::ports::{Connection, ElementOrigin, Port};
use crate::registry::NodeRegistry;
use crate::types::{ConnectionId, GroupId, NodeId, PortKind, PortRef};
use crate::value::{Value, ValueType};

/// A node-graph document: nodes, connections, groups, and the services
/// (registry, conversion engine, event bus) they share.
pub struct Canvas {
    registry: Arc<NodeRegistry>,
    convert: Arc<ConversionEngine>,
    nodes: Vec<NodeInstance>,
    connections: Vec<Connection>,
    groups: Vec<NodeGroup>,
    bus: EventBus,
    emitter: EventEmitter,
}

impl Canvas {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_event_bus(registry, EventBus::new())
    }

    pub fn with_event_bus(registry: Arc<NodeRegistry>, bus: EventBus) -> Self {
        let emitter = bus.emitter();
        Self {
            registry,
            convert: Arc::new(ConversionEngine::new()),
            nodes: Vec::new(),
            connections: Vec::new(),
            groups: Vec::new(),
            bus,
            emitter,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Shared conversion engine used for edges, properties, and outputs.
    pub fn conversion(&self) -> &Arc<ConversionEngine> {
        &self.convert
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn emitter(&self) -> EventEmitter {
        self.emitter.clone()
    }

    /// Nodes in insertion order. Entry-set discovery and persistence both
    /// rely on this order being stable.
    pub fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Mutable access to a node's display state (name, description,
    /// position, visibility). Structural mutation stays behind canvas
    /// operations.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeInstance> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn groups(&self) -> &[NodeGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> Option<&NodeGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Resolve a port address against the current graph.
    pub fn find_port(&self, port: &PortRef) -> Option<&Port> {
        self.node(port.node)?.port(port.direction, &port.name)
    }

    fn find_port_mut(&mut self, port: &PortRef) -> Option<&mut Port> {
        self.node_mut(port.node)?.port_mut(port.direction, &port.name)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Create a node of a registered type at a canvas position.
    pub fn create_node(
        &mut self,
        type_name: &str,
        x: f64,
        y: f64,
    ) -> Result<NodeId, CanvasError> {
        self.create_node_with_id(NodeId::new(), type_name, x, y)
    }

    /// Create a node with an explicit identity, used when restoring a
    /// persisted canvas.
    #[instrument(skip(self), fields(%id))]
    pub fn create_node_with_id(
        &mut self,
        id: NodeId,
        type_name: &str,
        x: f64,
        y: f64,
    ) -> Result<NodeId, CanvasError> {
        if self.node(id).is_some() {
            return Err(CanvasError::DuplicateNodeId { node: id });
        }
        let behavior = self
            .registry
            .create(type_name)
            .ok_or_else(|| CanvasError::UnknownNodeType {
                type_name: type_name.to_string(),
            })?;
        let mut node = NodeInstance::new(id, type_name, behavior);
        node.x = x;
        node.y = y;
        node.initialize();
        self.nodes.push(node);
        self.emitter.emit(CanvasEvent::NodeAdded {
            node: id,
            type_name: type_name.to_string(),
        });
        // Materialize the dynamic shape implied by default property values.
        self.reconfigure_node(id)?;
        debug!(type_name, "node created");
        Ok(id)
    }

    /// Remove a node and cascade-remove every connection touching it.
    #[instrument(skip(self), fields(%id))]
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), CanvasError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id() == id)
            .ok_or(CanvasError::NodeNotFound { node: id })?;
        let touching: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.touches_node(id))
            .map(|c| c.id)
            .collect();
        for cid in touching {
            self.disconnect(cid)?;
        }
        for group in &mut self.groups {
            group.remove_node(id);
        }
        self.nodes.remove(index);
        self.emitter.emit(CanvasEvent::NodeRemoved { node: id });
        Ok(())
    }

    /// Clone a node: same type, same property values, offset position,
    /// fresh identity, no connections.
    pub fn duplicate_node(&mut self, id: NodeId) -> Result<NodeId, CanvasError> {
        let (type_name, name, description, x, y, properties) = {
            let node = self.node(id).ok_or(CanvasError::NodeNotFound { node: id })?;
            (
                node.type_name().to_string(),
                node.name.clone(),
                node.description.clone(),
                node.x,
                node.y,
                node.properties().to_vec(),
            )
        };
        let new_id = self.create_node_with_id(NodeId::new(), &type_name, x + 40.0, y + 40.0)?;
        if let Some(node) = self.node_mut(new_id) {
            node.name = name;
            node.description = description;
        }
        // Static values first; each edit reconfigures, so dynamic
        // properties exist by the time their values are applied.
        let (static_props, dynamic_props): (Vec<Property>, Vec<Property>) = properties
            .into_iter()
            .partition(|p| !p.origin.is_dynamic());
        for prop in static_props.into_iter().chain(dynamic_props) {
            match self.set_property(new_id, &prop.name, prop.value) {
                Ok(()) => {}
                // A dynamic property the new layout no longer produces.
                Err(CanvasError::PropertyNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(new_id)
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect an output-side port to an input-side port.
    ///
    /// Connecting to an already-connected data input replaces the previous
    /// connection. Connecting an already-connected pair is a no-op
    /// returning the existing id.
    pub fn connect(
        &mut self,
        source: PortRef,
        target: PortRef,
    ) -> Result<ConnectionId, CanvasError> {
        self.connect_with_id(ConnectionId::new(), source, target)
    }

    /// [`Canvas::connect`] with an explicit identity, used when restoring a
    /// persisted canvas.
    #[instrument(skip(self), fields(%id))]
    pub fn connect_with_id(
        &mut self,
        id: ConnectionId,
        source: PortRef,
        target: PortRef,
    ) -> Result<ConnectionId, CanvasError> {
        if let Some(existing) = self
            .connections
            .iter()
            .find(|c| c.source == source && c.target == target)
        {
            return Ok(existing.id);
        }
        self.validate_connection(&source, &target)?;

        // A data input holds one connection; replace silently.
        let stale: Vec<ConnectionId> = match self.find_port(&target) {
            Some(port) if port.is_single_connection() => port.connections.clone(),
            _ => Vec::new(),
        };
        for cid in stale {
            self.disconnect(cid)?;
        }

        if let Some(port) = self.find_port_mut(&source) {
            port.attach(id);
        }
        if let Some(port) = self.find_port_mut(&target) {
            port.attach(id);
        }
        self.connections
            .push(Connection::with_id(id, source.clone(), target.clone()));
        self.emitter.emit(CanvasEvent::ConnectionAdded {
            connection: id,
            source,
            target,
        });
        Ok(id)
    }

    fn validate_connection(
        &self,
        source: &PortRef,
        target: &PortRef,
    ) -> Result<(), ConnectError> {
        let source_port = self
            .find_port(source)
            .ok_or_else(|| ConnectError::PortNotFound {
                port: source.clone(),
            })?;
        let target_port = self
            .find_port(target)
            .ok_or_else(|| ConnectError::PortNotFound {
                port: target.clone(),
            })?;
        if source.node == target.node {
            return Err(ConnectError::SameNode {
                source_port: source.clone(),
                target: target.clone(),
            });
        }
        if !source_port.kind.connects_to(target_port.kind) {
            return Err(ConnectError::KindMismatch {
                source_port: source.clone(),
                source_kind: source_port.kind,
                target: target.clone(),
                target_kind: target_port.kind,
            });
        }
        if source_port.kind.is_data()
            && !target_port.can_accept(&source_port.value_type)
            && !self
                .convert
                .has_converter(&source_port.value_type, &target_port.value_type)
        {
            return Err(ConnectError::TypeMismatch {
                source_port: source.clone(),
                source_type: source_port.value_type.clone(),
                target: target.clone(),
                target_type: target_port.value_type.clone(),
            });
        }
        Ok(())
    }

    /// Remove a connection, detaching it from both endpoint ports.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), CanvasError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or(CanvasError::ConnectionNotFound { connection: id })?;
        let connection = self.connections.remove(index);
        // Endpoint ports may already be gone mid-cascade (node removal,
        // dynamic reconfigure); detach is best-effort by design.
        if let Some(port) = self.find_port_mut(&connection.source) {
            port.detach(id);
        }
        if let Some(port) = self.find_port_mut(&connection.target) {
            port.detach(id);
        }
        self.emitter.emit(CanvasEvent::ConnectionRemoved {
            connection: id,
            source: connection.source,
            target: connection.target,
        });
        Ok(())
    }

    /// Remove every connection touching a port. Returns how many went.
    pub fn disconnect_port(&mut self, port: &PortRef) -> Result<usize, CanvasError> {
        let touching: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.touches_port(port))
            .map(|c| c.id)
            .collect();
        let count = touching.len();
        for cid in touching {
            self.disconnect(cid)?;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Ports & properties
    // ------------------------------------------------------------------

    /// Show or hide a port. Hiding disconnects it first.
    pub fn set_port_visible(&mut self, port: &PortRef, visible: bool) -> Result<(), CanvasError> {
        if self.find_port(port).is_none() {
            return Err(CanvasError::PortNotFound { port: port.clone() });
        }
        if !visible {
            self.disconnect_port(port)?;
        }
        if let Some(p) = self.find_port_mut(port) {
            p.visible = visible;
        }
        Ok(())
    }

    /// Attach a per-port input converter, applied before the engine-level
    /// conversion and consulted by connection-time type checks.
    pub fn set_input_converter(
        &mut self,
        port: &PortRef,
        converter: CustomConverter,
    ) -> Result<(), CanvasError> {
        match self.find_port_mut(port) {
            Some(p) if p.kind == PortKind::Input => {
                p.converter = Some(converter);
                Ok(())
            }
            Some(_) => Err(CanvasError::ConverterTarget { port: port.clone() }),
            None => Err(CanvasError::PortNotFound { port: port.clone() }),
        }
    }

    /// Set a property value, coercing it to the property's declared type,
    /// then reconcile the node's dynamic shape.
    #[instrument(skip(self, value), fields(%node))]
    pub fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: Value,
    ) -> Result<(), CanvasError> {
        let convert = Arc::clone(&self.convert);
        {
            let instance = self
                .node_mut(node)
                .ok_or(CanvasError::NodeNotFound { node })?;
            let property =
                instance
                    .property_mut(name)
                    .ok_or_else(|| CanvasError::PropertyNotFound {
                        node,
                        name: name.to_string(),
                    })?;
            let coerced = if value.is_null()
                || matches!(property.value_type, ValueType::Any)
                || crate::convert::matches_exactly(&value, &property.value_type)
            {
                value
            } else {
                convert
                    .convert(&value, &property.value_type)
                    .ok_or_else(|| CanvasError::PropertyType {
                        node,
                        name: name.to_string(),
                        expected: property.value_type.clone(),
                    })?
            };
            property.value = coerced;
        }
        self.emitter.emit(CanvasEvent::PropertyChanged {
            node,
            name: name.to_string(),
        });
        self.reconfigure_node(node)
    }

    /// Reconcile a node's dynamic ports and properties with its behavior's
    /// current [`DynamicLayout`]. Re-entrant calls while a pass is already
    /// mutating the node are no-ops.
    pub fn reconfigure_node(&mut self, node: NodeId) -> Result<(), CanvasError> {
        let desired = {
            let instance = self.node(node).ok_or(CanvasError::NodeNotFound { node })?;
            if instance.reconfiguring {
                return Ok(());
            }
            let behavior = instance.behavior();
            behavior.dynamic_layout(&instance.property_view())
        };
        if let Some(instance) = self.node_mut(node) {
            instance.reconfiguring = true;
        }
        let result = self.apply_layout(node, &desired);
        if let Some(instance) = self.node_mut(node) {
            instance.reconfiguring = false;
        }
        let (added, removed) = result?;
        if !added.is_empty() || !removed.is_empty() {
            debug!(%node, added = added.len(), removed = removed.len(), "node reconfigured");
            self.emitter
                .emit(CanvasEvent::NodeReconfigured { node, added, removed });
        }
        Ok(())
    }

    /// Diff-apply a desired dynamic layout: stale dynamic elements are
    /// disconnected and dropped, missing ones added, static schema elements
    /// untouched.
    fn apply_layout(
        &mut self,
        node: NodeId,
        desired: &DynamicLayout,
    ) -> Result<(Vec<PortRef>, Vec<PortRef>), CanvasError> {
        // Properties first, so promoted ports reflect the new property set.
        let (stale_props, new_props) = {
            let instance = self.node(node).ok_or(CanvasError::NodeNotFound { node })?;
            let stale: Vec<String> = instance
                .properties()
                .iter()
                .filter(|p| p.origin.is_dynamic())
                .filter(|p| !desired.properties.iter().any(|spec| spec.name == p.name))
                .map(|p| p.name.clone())
                .collect();
            let fresh: Vec<_> = desired
                .properties
                .iter()
                .filter(|spec| instance.property(&spec.name).is_none())
                .cloned()
                .collect();
            (stale, fresh)
        };
        if let Some(instance) = self.node_mut(node) {
            for name in &stale_props {
                instance.remove_property(name);
            }
            for spec in &new_props {
                instance.add_property(Property::from_spec(
                    spec,
                    ElementOrigin::Dynamic {
                        key: spec.name.clone(),
                    },
                ));
            }
        }

        // Desired dynamic ports: the layout's own, plus one hidden input
        // per connectable property so graphs can drive the value.
        let (stale_ports, new_ports) = {
            let instance = self.node(node).ok_or(CanvasError::NodeNotFound { node })?;
            let mut wanted: Vec<(PortKind, PortSpec)> = Vec::new();
            for spec in &desired.inputs {
                wanted.push((PortKind::Input, spec.clone()));
            }
            for spec in &desired.outputs {
                wanted.push((PortKind::Output, spec.clone()));
            }
            for spec in &desired.flow_ins {
                wanted.push((PortKind::FlowIn, spec.clone()));
            }
            for spec in &desired.flow_outs {
                wanted.push((PortKind::FlowOut, spec.clone()));
            }
            for property in instance.properties() {
                if property.connectable {
                    wanted.push((
                        PortKind::Input,
                        PortSpec::new(property.name.clone(), property.value_type.clone()).hidden(),
                    ));
                }
            }

            let mut stale: Vec<(PortKind, String)> = Vec::new();
            for port in instance.ports().filter(|p| p.origin.is_dynamic()) {
                let still_wanted = wanted.iter().any(|(kind, spec)| {
                    *kind == port.kind
                        && spec.name == port.name
                        && spec.value_type == port.value_type
                });
                if !still_wanted {
                    stale.push((port.kind, port.name.clone()));
                }
            }
            let mut fresh: Vec<(PortKind, PortSpec)> = Vec::new();
            for (kind, spec) in &wanted {
                let occupied = instance
                    .port(kind.direction(), &spec.name)
                    .is_some_and(|existing| {
                        // A same-typed port already there (static or still-
                        // wanted dynamic) satisfies the slot; a stale one is
                        // about to be removed and must be replaced.
                        !stale
                            .iter()
                            .any(|(k, n)| *k == existing.kind && *n == existing.name)
                    });
                if !occupied {
                    fresh.push((*kind, spec.clone()));
                }
            }
            (stale, fresh)
        };

        let mut removed = Vec::new();
        for (kind, name) in stale_ports {
            let port_ref = PortRef::new(node, kind.direction(), name.clone());
            self.disconnect_port(&port_ref)?;
            if let Some(instance) = self.node_mut(node) {
                instance.remove_port(kind, &name);
            }
            removed.push(port_ref);
        }
        let mut added = Vec::new();
        for (kind, spec) in new_ports {
            if let Some(instance) = self.node_mut(node) {
                let port = port_from_spec(
                    &spec,
                    kind,
                    ElementOrigin::Dynamic {
                        key: spec.name.clone(),
                    },
                );
                added.push(instance.port_ref(&port));
                instance.add_port(port);
            }
        }
        Ok((added, removed))
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Add a group, pruning member ids that do not resolve to nodes.
    pub fn add_group(&mut self, mut group: NodeGroup) -> GroupId {
        let before = group.node_ids.len();
        group.node_ids.retain(|id| self.node(*id).is_some());
        if group.node_ids.len() < before {
            warn!(group = %group.id, "dropped unknown node ids from group");
        }
        let id = group.id;
        self.groups.push(group);
        self.emitter.emit(CanvasEvent::GroupAdded { group: id });
        id
    }

    /// Remove a group. Member nodes are unaffected.
    pub fn remove_group(&mut self, id: GroupId) -> Result<(), CanvasError> {
        let index = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or(CanvasError::GroupNotFound { group: id })?;
        self.groups.remove(index);
        self.emitter.emit(CanvasEvent::GroupRemoved { group: id });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Run the canvas to completion with an external cancellation handle.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<RunReport, ExecutionError> {
        ExecutionEngine::new(self, cancel).run().await
    }

    /// Run the canvas to completion.
    pub async fn run(&self) -> Result<RunReport, ExecutionError> {
        self.execute(CancellationToken::new()).await
    }
}
