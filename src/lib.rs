//! # Flowcanvas: Node-graph Canvas Engine
//!
//! Flowcanvas is the headless core of a visual node-graph editor: a typed
//! port and connection model, a never-failing value conversion engine, a
//! dynamic node model, and a flow-driven asynchronous execution engine.
//!
//! ## Core Concepts
//!
//! - **Values**: Dynamically typed runtime values with a conversion engine
//!   bridging type mismatches on every edge
//! - **Ports**: Typed endpoints on nodes; data ports move values, flow
//!   ports move execution
//! - **Nodes**: Async behaviors with static schemas and property-driven
//!   dynamic ports
//! - **Canvas**: The owning graph container enforcing all structural
//!   invariants
//! - **Engine**: Depth-first, activation-driven execution with cooperative
//!   cancellation
//!
//! ## Quick Start
//!
//! ```
//! use flowcanvas::canvas::Canvas;
//! use flowcanvas::registry::NodeRegistry;
//! use flowcanvas::types::PortRef;
//! use flowcanvas::value::Value;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut canvas = Canvas::new(registry);
//!
//! let five = canvas.create_node("constant", 0.0, 0.0)?;
//! let seven = canvas.create_node("constant", 0.0, 120.0)?;
//! let add = canvas.create_node("add", 240.0, 60.0)?;
//! let start = canvas.create_node("start", 0.0, 240.0)?;
//!
//! canvas.set_property(five, "value", Value::Float(5.0))?;
//! canvas.set_property(seven, "value", Value::Float(7.0))?;
//! canvas.connect(PortRef::output(five, "value"), PortRef::input(add, "a"))?;
//! canvas.connect(PortRef::output(seven, "value"), PortRef::input(add, "b"))?;
//! canvas.connect(PortRef::output(start, "run"), PortRef::input(add, "run"))?;
//!
//! canvas.run().await?;
//! let sum = canvas
//!     .node(add)
//!     .and_then(|n| n.output("sum"))
//!     .and_then(|p| p.published());
//! assert_eq!(sum, Some(Value::Float(12.0)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! ## Module Guide
//!
//! - [`value`] - Runtime values, value types, typed extraction
//! - [`convert`] - The conversion engine and its strategy pipeline
//! - [`ports`] - Ports, output slots, and connection entities
//! - [`node`] - Behavior contract, schemas, instances, execution context
//! - [`registry`] - Node type registration and factories
//! - [`canvas`] - The graph container and its structural operations
//! - [`engine`] - Flow-driven execution
//! - [`persist`] - JSON document round-trip and file I/O
//! - [`event_bus`] - Structural and execution event fan-out
//! - [`nodes`] - Built-in node library

pub mod canvas;
pub mod convert;
pub mod engine;
pub mod event_bus;
pub mod node;
pub mod nodes;
pub mod persist;
pub mod ports;
pub mod registry;
pub mod telemetry;
pub mod types;
pub mod value;
