//! Shared identifier and addressing types.
//!
//! Everything on a canvas is addressed by value: nodes and connections by
//! uuid-backed newtypes, ports by a [`PortRef`] triple (owning node,
//! direction, name). Port names are unique per node and direction, so the
//! triple is a stable address that survives serialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connection between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a visual node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a node a port sits on.
///
/// Data inputs and flow inputs share the `In` direction; data outputs and
/// flow outputs share `Out`. Port names are unique within a node per
/// direction, which is what makes [`PortRef`] unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    In,
    Out,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::In => write!(f, "in"),
            PortDirection::Out => write!(f, "out"),
        }
    }
}

/// The four port kinds a node can expose.
///
/// `Input`/`Output` carry data values; `FlowIn`/`FlowOut` carry execution
/// activations and have no value type beyond the flow marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Input,
    Output,
    FlowIn,
    FlowOut,
}

impl PortKind {
    pub fn direction(&self) -> PortDirection {
        match self {
            PortKind::Input | PortKind::FlowIn => PortDirection::In,
            PortKind::Output | PortKind::FlowOut => PortDirection::Out,
        }
    }

    pub fn is_flow(&self) -> bool {
        matches!(self, PortKind::FlowIn | PortKind::FlowOut)
    }

    pub fn is_data(&self) -> bool {
        !self.is_flow()
    }

    /// Whether a connection may run from a port of this kind to one of
    /// `target`'s kind. Data connects to data, flow to flow, always
    /// out-to-in.
    pub fn connects_to(&self, target: PortKind) -> bool {
        matches!(
            (self, target),
            (PortKind::Output, PortKind::Input) | (PortKind::FlowOut, PortKind::FlowIn)
        )
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PortKind::Input => "input",
            PortKind::Output => "output",
            PortKind::FlowIn => "flow-in",
            PortKind::FlowOut => "flow-out",
        };
        write!(f, "{label}")
    }
}

/// Stable address of one port: owning node, direction, and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub direction: PortDirection,
    pub name: String,
}

impl PortRef {
    pub fn new(node: NodeId, direction: PortDirection, name: impl Into<String>) -> Self {
        Self {
            node,
            direction,
            name: name.into(),
        }
    }

    /// Address of an input-side port (data input or flow-in).
    pub fn input(node: NodeId, name: impl Into<String>) -> Self {
        Self::new(node, PortDirection::In, name)
    }

    /// Address of an output-side port (data output or flow-out).
    pub fn output(node: NodeId, name: impl Into<String>) -> Self {
        Self::new(node, PortDirection::Out, name)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.node, self.direction, self.name)
    }
}
