//! Built-in node library.
//!
//! A small set of general-purpose behaviors covering the common canvas
//! patterns: flow sources, constants, arithmetic, text formatting with
//! dynamic ports, looping, stateful accumulation, and sinks. Applications
//! register their own behaviors alongside these via
//! [`NodeRegistry::register`](crate::registry::NodeRegistry::register).

mod accumulate;
mod constant;
mod format;
mod math;
mod print;
mod sequence;
mod start;

pub use accumulate::AccumulateNode;
pub use constant::ConstantNode;
pub use format::FormatNode;
pub use math::AddNode;
pub use print::PrintNode;
pub use sequence::SequenceNode;
pub use start::StartNode;

use crate::registry::NodeRegistry;

/// Register every built-in node type.
pub fn install(registry: &mut NodeRegistry) {
    registry.register::<StartNode>();
    registry.register::<ConstantNode>();
    registry.register::<AddNode>();
    registry.register::<FormatNode>();
    registry.register::<SequenceNode>();
    registry.register::<AccumulateNode>();
    registry.register::<PrintNode>();
}
