//! Node instances: materialized ports, properties, and placement.

use std::sync::Arc;

use crate::ports::{ElementOrigin, Port, ValueSlot};
use crate::types::{NodeId, PortDirection, PortKind, PortRef};
use crate::value::{FromValue, Value, ValueType};

use super::behavior::NodeBehavior;
use super::schema::{PortSpec, PropertySpec};

/// A configuration property on a node instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value_type: ValueType,
    pub value: Value,
    pub connectable: bool,
    pub origin: ElementOrigin,
}

impl Property {
    pub fn from_spec(spec: &PropertySpec, origin: ElementOrigin) -> Self {
        Self {
            name: spec.name.clone(),
            value_type: spec.value_type.clone(),
            value: spec.default.clone(),
            connectable: spec.connectable,
            origin,
        }
    }
}

/// Read-only view over a node's properties, handed to
/// [`NodeBehavior::dynamic_layout`](super::NodeBehavior::dynamic_layout).
pub struct PropertyView<'a> {
    properties: &'a [Property],
}

impl<'a> PropertyView<'a> {
    pub fn new(properties: &'a [Property]) -> Self {
        Self { properties }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn get_or<T: FromValue>(&self, name: &str, default: T) -> T {
        self.get(name)
            .and_then(|v| T::from_value(v))
            .unwrap_or(default)
    }

    pub fn str_or(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(Value::Str(s)) => s.clone(),
            Some(v) if !v.is_null() => v.to_string(),
            _ => default.to_string(),
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.get_or(name, default)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }
}

/// One node placed on a canvas.
///
/// Owns its ports and properties; the behavior is shared logic created by
/// the registry, one instance per node so behaviors may carry per-node
/// execution state.
pub struct NodeInstance {
    id: NodeId,
    type_name: String,
    pub name: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    behavior: Arc<dyn NodeBehavior>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    flow_ins: Vec<Port>,
    flow_outs: Vec<Port>,
    properties: Vec<Property>,
    initialized: bool,
    /// Guards against dynamic-layout recursion while a reconfigure pass is
    /// already mutating this node.
    pub(crate) reconfiguring: bool,
}

impl NodeInstance {
    pub(crate) fn new(id: NodeId, type_name: impl Into<String>, behavior: Arc<dyn NodeBehavior>) -> Self {
        let type_name = type_name.into();
        Self {
            id,
            name: type_name.clone(),
            type_name,
            description: String::new(),
            x: 0.0,
            y: 0.0,
            visible: true,
            behavior,
            inputs: Vec::new(),
            outputs: Vec::new(),
            flow_ins: Vec::new(),
            flow_outs: Vec::new(),
            properties: Vec::new(),
            initialized: false,
            reconfiguring: false,
        }
    }

    /// Materialize static ports and properties from the behavior's schema.
    /// Idempotent; later calls are no-ops so a restored node keeps its
    /// already-populated state.
    pub(crate) fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        let schema = self.behavior.schema();
        for spec in &schema.inputs {
            self.inputs.push(port_from_spec(spec, PortKind::Input, ElementOrigin::Static));
        }
        for spec in &schema.outputs {
            self.outputs.push(port_from_spec(spec, PortKind::Output, ElementOrigin::Static));
        }
        for spec in &schema.flow_ins {
            self.flow_ins.push(port_from_spec(spec, PortKind::FlowIn, ElementOrigin::Static));
        }
        for spec in &schema.flow_outs {
            self.flow_outs.push(port_from_spec(spec, PortKind::FlowOut, ElementOrigin::Static));
        }
        for spec in &schema.properties {
            self.properties.push(Property::from_spec(spec, ElementOrigin::Static));
        }
        self.initialized = true;
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn behavior(&self) -> Arc<dyn NodeBehavior> {
        Arc::clone(&self.behavior)
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn flow_ins(&self) -> &[Port] {
        &self.flow_ins
    }

    pub fn flow_outs(&self) -> &[Port] {
        &self.flow_outs
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property_view(&self) -> PropertyView<'_> {
        PropertyView::new(&self.properties)
    }

    /// All ports in a fixed order: inputs, outputs, flow-ins, flow-outs.
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .chain(self.flow_ins.iter())
            .chain(self.flow_outs.iter())
    }

    /// Resolve a port by direction and name. Data ports shadow flow ports
    /// in lookup order, but names are unique per direction anyway.
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&Port> {
        let (data, flow) = match direction {
            PortDirection::In => (&self.inputs, &self.flow_ins),
            PortDirection::Out => (&self.outputs, &self.flow_outs),
        };
        data.iter()
            .chain(flow.iter())
            .find(|p| p.name == name)
    }

    pub(crate) fn port_mut(&mut self, direction: PortDirection, name: &str) -> Option<&mut Port> {
        let (data, flow) = match direction {
            PortDirection::In => (&mut self.inputs, &mut self.flow_ins),
            PortDirection::Out => (&mut self.outputs, &mut self.flow_outs),
        };
        data.iter_mut()
            .chain(flow.iter_mut())
            .find(|p| p.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn flow_in(&self, name: &str) -> Option<&Port> {
        self.flow_ins.iter().find(|p| p.name == name)
    }

    pub fn flow_out(&self, name: &str) -> Option<&Port> {
        self.flow_outs.iter().find(|p| p.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Shared output slot for `name`, if such an output exists.
    pub fn output_slot(&self, name: &str) -> Option<ValueSlot> {
        self.output(name).and_then(|p| p.slot().cloned())
    }

    /// Address of one of this node's ports.
    pub fn port_ref(&self, port: &Port) -> PortRef {
        PortRef::new(self.id, port.kind.direction(), port.name.clone())
    }

    /// True when no flow-in port has a connection; such nodes belong to the
    /// execution entry set.
    pub fn is_flow_entry(&self) -> bool {
        self.flow_ins.iter().all(|p| !p.is_connected())
    }

    pub fn has_flow_ports(&self) -> bool {
        !self.flow_ins.is_empty() || !self.flow_outs.is_empty()
    }

    pub(crate) fn add_port(&mut self, port: Port) {
        let bucket = match port.kind {
            PortKind::Input => &mut self.inputs,
            PortKind::Output => &mut self.outputs,
            PortKind::FlowIn => &mut self.flow_ins,
            PortKind::FlowOut => &mut self.flow_outs,
        };
        if !bucket.iter().any(|p| p.name == port.name) {
            bucket.push(port);
        }
    }

    pub(crate) fn remove_port(&mut self, kind: PortKind, name: &str) -> Option<Port> {
        let bucket = match kind {
            PortKind::Input => &mut self.inputs,
            PortKind::Output => &mut self.outputs,
            PortKind::FlowIn => &mut self.flow_ins,
            PortKind::FlowOut => &mut self.flow_outs,
        };
        let idx = bucket.iter().position(|p| p.name == name)?;
        Some(bucket.remove(idx))
    }

    pub(crate) fn add_property(&mut self, property: Property) {
        if self.property(&property.name).is_none() {
            self.properties.push(property);
        }
    }

    pub(crate) fn remove_property(&mut self, name: &str) -> Option<Property> {
        let idx = self.properties.iter().position(|p| p.name == name)?;
        Some(self.properties.remove(idx))
    }
}

pub(crate) fn port_from_spec(spec: &PortSpec, kind: PortKind, origin: ElementOrigin) -> Port {
    let mut port = match kind {
        PortKind::Input => Port::input(spec.name.clone(), spec.value_type.clone()),
        PortKind::Output => Port::output(spec.name.clone(), spec.value_type.clone()),
        PortKind::FlowIn => Port::flow_in(spec.name.clone()),
        PortKind::FlowOut => Port::flow_out(spec.name.clone()),
    };
    port.visible = spec.visible;
    port.origin = origin;
    port
}
