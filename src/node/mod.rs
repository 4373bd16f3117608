//! Node model: behavior contract, schemas, and placed instances.

mod behavior;
mod instance;
mod schema;

pub use behavior::{NodeBehavior, NodeCtx, NodeError};
pub(crate) use behavior::{OutputHandle, ResolvedInput};
pub use instance::{NodeInstance, Property, PropertyView};
pub(crate) use instance::port_from_spec;
pub use schema::{DynamicLayout, NodeSchema, PortSpec, PropertySpec};
