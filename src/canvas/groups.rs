//! Visual node groups.
//!
//! Groups are presentation-layer containers: a named, colored region with a
//! membership list. They never affect execution or connectivity; removing a
//! group leaves its member nodes untouched.

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, NodeId};

/// A named region of the canvas containing member nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroup {
    pub id: GroupId,
    pub name: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub node_ids: Vec<NodeId>,
}

impl NodeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            color: "#808080".to_string(),
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 150.0,
            node_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.node_ids.extend(nodes);
        self
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.node_ids.contains(&node)
    }

    pub fn add_node(&mut self, node: NodeId) {
        if !self.contains_node(node) {
            self.node_ids.push(node);
        }
    }

    pub fn remove_node(&mut self, node: NodeId) {
        self.node_ids.retain(|n| *n != node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_deduplicated() {
        let node = NodeId::new();
        let mut group = NodeGroup::new("math");
        group.add_node(node);
        group.add_node(node);
        assert_eq!(group.node_ids.len(), 1);
        group.remove_node(node);
        assert!(!group.contains_node(node));
    }
}
