//! Static node shape declarations.
//!
//! A [`NodeSchema`] declares the ports and properties every instance of a
//! node type starts with. The registry holds one schema per registered type;
//! instances materialize their ports from it on first initialization.
//! Dynamic shape on top of the schema is described by [`DynamicLayout`],
//! recomputed from property values after every property edit.

use crate::value::{Value, ValueType};

/// Declaration of one port in a schema or dynamic layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub value_type: ValueType,
    pub visible: bool,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            visible: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Declaration of one configuration property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub value_type: ValueType,
    pub default: Value,
    /// Promotable properties get a same-named dynamic input port so graphs
    /// can drive the value instead of the stored configuration.
    pub connectable: bool,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, value_type: ValueType, default: Value) -> Self {
        Self {
            name: name.into(),
            value_type,
            default,
            connectable: false,
        }
    }

    pub fn connectable(mut self) -> Self {
        self.connectable = true;
        self
    }
}

/// Static shape of a node type: its ports and properties.
///
/// Built fluently by node implementations:
///
/// ```
/// use flowcanvas::node::NodeSchema;
/// use flowcanvas::value::{Value, ValueType};
///
/// let schema = NodeSchema::new()
///     .input("a", ValueType::Float)
///     .input("b", ValueType::Float)
///     .output("sum", ValueType::Float)
///     .flow_in("run")
///     .flow_out("done")
///     .property("round", ValueType::Bool, Value::Bool(false));
/// assert_eq!(schema.inputs.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSchema {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub flow_ins: Vec<PortSpec>,
    pub flow_outs: Vec<PortSpec>,
    pub properties: Vec<PropertySpec>,
}

impl NodeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn input(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.inputs.push(PortSpec::new(name, value_type));
        self
    }

    #[must_use]
    pub fn input_spec(mut self, spec: PortSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    #[must_use]
    pub fn output(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.outputs.push(PortSpec::new(name, value_type));
        self
    }

    #[must_use]
    pub fn flow_in(mut self, name: impl Into<String>) -> Self {
        self.flow_ins.push(PortSpec::new(name, ValueType::Flow));
        self
    }

    #[must_use]
    pub fn flow_out(mut self, name: impl Into<String>) -> Self {
        self.flow_outs.push(PortSpec::new(name, ValueType::Flow));
        self
    }

    #[must_use]
    pub fn property(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        default: Value,
    ) -> Self {
        self.properties
            .push(PropertySpec::new(name, value_type, default));
        self
    }

    #[must_use]
    pub fn connectable_property(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        default: Value,
    ) -> Self {
        self.properties
            .push(PropertySpec::new(name, value_type, default).connectable());
        self
    }
}

/// Desired dynamic shape of a node, computed from its current property
/// values. The canvas diffs this against the node's present dynamic
/// elements: stale ones are disconnected and removed, missing ones added,
/// and everything declared in the static schema is left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicLayout {
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub flow_ins: Vec<PortSpec>,
    pub flow_outs: Vec<PortSpec>,
    pub properties: Vec<PropertySpec>,
}

impl DynamicLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn input(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.inputs.push(PortSpec::new(name, value_type));
        self
    }

    #[must_use]
    pub fn output(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.outputs.push(PortSpec::new(name, value_type));
        self
    }

    #[must_use]
    pub fn flow_in(mut self, name: impl Into<String>) -> Self {
        self.flow_ins.push(PortSpec::new(name, ValueType::Flow));
        self
    }

    #[must_use]
    pub fn flow_out(mut self, name: impl Into<String>) -> Self {
        self.flow_outs.push(PortSpec::new(name, ValueType::Flow));
        self
    }

    #[must_use]
    pub fn property(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        default: Value,
    ) -> Self {
        self.properties
            .push(PropertySpec::new(name, value_type, default));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
            && self.outputs.is_empty()
            && self.flow_ins.is_empty()
            && self.flow_outs.is_empty()
            && self.properties.is_empty()
    }
}
