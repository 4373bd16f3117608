//! Node type registry.
//!
//! Canvases create nodes by type name; the registry maps each name to its
//! static [`NodeSchema`] and a factory producing a fresh behavior per node
//! instance. Registration is explicit: applications list their node types
//! at startup, typically starting from [`NodeRegistry::with_builtins`].

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::node::{NodeBehavior, NodeSchema};

type BehaviorFactory = Box<dyn Fn() -> Arc<dyn NodeBehavior> + Send + Sync>;

/// One registered node type.
pub struct NodeType {
    type_name: String,
    schema: NodeSchema,
    factory: BehaviorFactory,
}

impl NodeType {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn schema(&self) -> &NodeSchema {
        &self.schema
    }
}

/// Registry of node types available to a canvas.
#[derive(Default)]
pub struct NodeRegistry {
    types: FxHashMap<String, NodeType>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in node library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::nodes::install(&mut registry);
        registry
    }

    /// Register a behavior type constructible via `Default`. Re-registering
    /// a name replaces the previous entry.
    pub fn register<B>(&mut self)
    where
        B: NodeBehavior + Default + 'static,
    {
        let prototype = B::default();
        let type_name = prototype.type_name().to_string();
        let schema = prototype.schema();
        self.types.insert(
            type_name.clone(),
            NodeType {
                type_name,
                schema,
                factory: Box::new(|| Arc::new(B::default())),
            },
        );
    }

    /// Register with an explicit factory, for behaviors that need
    /// construction arguments.
    pub fn register_with<F>(&mut self, factory: F)
    where
        F: Fn() -> Arc<dyn NodeBehavior> + Send + Sync + 'static,
    {
        let prototype = factory();
        let type_name = prototype.type_name().to_string();
        let schema = prototype.schema();
        self.types.insert(
            type_name.clone(),
            NodeType {
                type_name,
                schema,
                factory: Box::new(factory),
            },
        );
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Fresh behavior instance for `type_name`.
    pub fn create(&self, type_name: &str) -> Option<Arc<dyn NodeBehavior>> {
        self.types.get(type_name).map(|t| (t.factory)())
    }

    pub fn schema(&self, type_name: &str) -> Option<&NodeSchema> {
        self.types.get(type_name).map(|t| &t.schema)
    }

    /// Registered type names in sorted order.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = NodeRegistry::with_builtins();
        assert!(registry.contains("start"));
        assert!(registry.contains("add"));
        assert!(registry.create("add").is_some());
        assert!(registry.create("nope").is_none());
    }

    #[test]
    fn factories_produce_distinct_behaviors() {
        let registry = NodeRegistry::with_builtins();
        let a = registry.create("accumulate").unwrap();
        let b = registry.create("accumulate").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
