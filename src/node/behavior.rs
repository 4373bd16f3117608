//! Node execution contract.
//!
//! This module provides the core abstractions for executable canvas nodes:
//! the [`NodeBehavior`] trait, the per-invocation [`NodeCtx`], and node
//! error handling.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::convert::{ConversionEngine, CustomConverter};
use crate::event_bus::{CanvasEvent, EventEmitter};
use crate::ports::ValueSlot;
use crate::types::{NodeId, PortRef};
use crate::value::{FromValue, IntoValue, Value, ValueType};

use super::instance::{Property, PropertyView};
use super::schema::{DynamicLayout, NodeSchema};

/// Core trait implemented by every node type.
///
/// A behavior declares its static shape via [`NodeBehavior::schema`], its
/// property-driven shape via [`NodeBehavior::dynamic_layout`], and does its
/// work in [`NodeBehavior::process`]. The registry creates one behavior per
/// node instance, so behaviors may carry per-node state behind interior
/// mutability (see the accumulate node for the pattern).
///
/// # Flow
///
/// `process` runs once per activation. Nodes with flow-out ports push
/// downstream activations with [`NodeCtx::activate`], which suspends the
/// node until the entire downstream chain has finished. A looping node
/// therefore interleaves deterministically with its body:
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use flowcanvas::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
/// use flowcanvas::value::ValueType;
///
/// #[derive(Default)]
/// struct CountdownNode;
///
/// #[async_trait]
/// impl NodeBehavior for CountdownNode {
///     fn type_name(&self) -> &'static str {
///         "countdown"
///     }
///
///     fn schema(&self) -> NodeSchema {
///         NodeSchema::new()
///             .output("current", ValueType::Int)
///             .flow_in("run")
///             .flow_out("tick")
///     }
///
///     async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
///         for i in (0i64..3).rev() {
///             ctx.set_output("current", i)?;
///             ctx.activate("tick").await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    /// Registry key for this node type.
    fn type_name(&self) -> &'static str;

    /// Static ports and properties every instance starts with.
    fn schema(&self) -> NodeSchema;

    /// Property-driven shape recomputed after every property edit. The
    /// default is no dynamic shape.
    fn dynamic_layout(&self, _properties: &PropertyView<'_>) -> DynamicLayout {
        DynamicLayout::default()
    }

    /// Execute one activation of this node.
    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError>;
}

/// A data input resolved against the graph at invocation time.
pub(crate) struct ResolvedInput {
    /// Source output's slot; `None` when the input is unconnected.
    pub(crate) slot: Option<ValueSlot>,
    pub(crate) converter: Option<CustomConverter>,
    pub(crate) target_type: ValueType,
}

/// An output port handle the context can publish through.
pub(crate) struct OutputHandle {
    pub(crate) slot: ValueSlot,
    pub(crate) value_type: ValueType,
    pub(crate) port: PortRef,
}

/// Execution context passed to a node for one activation.
///
/// Reading an input pulls the connected source slot's current value and
/// converts it to the input's declared type; absent or unconvertible values
/// read as `None`, so node code decides its own defaults.
pub struct NodeCtx {
    node_id: NodeId,
    node_name: String,
    inputs: FxHashMap<String, ResolvedInput>,
    outputs: FxHashMap<String, OutputHandle>,
    properties: Vec<Property>,
    flow_outs: Vec<String>,
    activations: flume::Sender<String>,
    cancel: CancellationToken,
    emitter: EventEmitter,
    convert: Arc<ConversionEngine>,
}

impl NodeCtx {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        node_id: NodeId,
        node_name: String,
        inputs: FxHashMap<String, ResolvedInput>,
        outputs: FxHashMap<String, OutputHandle>,
        properties: Vec<Property>,
        flow_outs: Vec<String>,
        activations: flume::Sender<String>,
        cancel: CancellationToken,
        emitter: EventEmitter,
        convert: Arc<ConversionEngine>,
    ) -> Self {
        Self {
            node_id,
            node_name,
            inputs,
            outputs,
            properties,
            flow_outs,
            activations,
            cancel,
            emitter,
            convert,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Current value of a data input, converted to the input's declared
    /// type. `None` when unconnected, unpublished, or unconvertible.
    pub fn input(&self, name: &str) -> Option<Value> {
        let resolved = self.inputs.get(name)?;
        let raw = resolved.slot.as_ref()?.read().clone();
        if raw.is_null() {
            return None;
        }
        if let Some(converter) = &resolved.converter {
            if let Some(v) = converter(&raw) {
                return Some(v);
            }
        }
        self.convert.convert(&raw, &resolved.target_type)
    }

    /// Typed input read with a fallback default.
    pub fn input_or<T: FromValue>(&self, name: &str, default: T) -> T {
        match self.input(name) {
            Some(v) => T::from_value(&v)
                .or_else(|| {
                    self.convert
                        .convert(&v, &T::value_type())
                        .and_then(|v| T::from_value(&v))
                })
                .unwrap_or(default),
            None => default,
        }
    }

    /// Effective property value: the connected same-named input when a
    /// promoted port drives it, otherwise the stored configuration value.
    pub fn property(&self, name: &str) -> Option<Value> {
        if let Some(resolved) = self.inputs.get(name) {
            if resolved.slot.is_some() {
                if let Some(v) = self.input(name) {
                    return Some(v);
                }
            }
        }
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.clone())
            .filter(|v| !v.is_null())
    }

    /// Typed property read with a fallback default.
    pub fn property_or<T: FromValue>(&self, name: &str, default: T) -> T {
        match self.property(name) {
            Some(v) => T::from_value(&v)
                .or_else(|| {
                    self.convert
                        .convert(&v, &T::value_type())
                        .and_then(|v| T::from_value(&v))
                })
                .unwrap_or(default),
            None => default,
        }
    }

    /// Publish a value on one of this node's outputs.
    ///
    /// The value is coerced to the output's declared type; a value the
    /// engine cannot coerce is a programming error in the node and fails
    /// the activation. Publishing a changed value (or any value on a
    /// collection-typed output, whose contents may have mutated in place)
    /// raises [`CanvasEvent::PortValueChanged`].
    pub fn set_output(&self, name: &str, value: impl IntoValue) -> Result<(), NodeError> {
        let handle = self
            .outputs
            .get(name)
            .ok_or_else(|| NodeError::UnknownPort {
                port: name.to_string(),
            })?;
        let value = value.into_value();
        let coerced = if value.is_null()
            || matches!(handle.value_type, ValueType::Any)
            || crate::convert::matches_exactly(&value, &handle.value_type)
        {
            value
        } else {
            self.convert
                .convert(&value, &handle.value_type)
                .ok_or_else(|| NodeError::OutputType {
                    port: name.to_string(),
                    expected: handle.value_type.clone(),
                })?
        };
        let changed = {
            let mut slot = handle.slot.write();
            let changed = *slot != coerced || handle.value_type.is_collection();
            *slot = coerced;
            changed
        };
        if changed {
            self.emitter.emit(CanvasEvent::PortValueChanged {
                port: handle.port.clone(),
            });
        }
        Ok(())
    }

    /// Push an activation out of `flow_out` and wait for the downstream
    /// chain to finish executing.
    ///
    /// The activation channel is a rendezvous: the send completes only once
    /// the engine has picked the token up, and the engine runs the whole
    /// downstream propagation before picking up the next one. Downstream
    /// nodes therefore observe this node's outputs exactly as they were at
    /// the moment of the activation.
    pub async fn activate(&self, flow_out: &str) -> Result<(), NodeError> {
        if !self.flow_outs.iter().any(|n| n == flow_out) {
            return Err(NodeError::UnknownPort {
                port: flow_out.to_string(),
            });
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(NodeError::Cancelled),
            res = self.activations.send_async(flow_out.to_string()) => {
                res.map_err(|_| NodeError::Cancelled)
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cooperative cancellation check for long-running loops.
    pub fn check_cancelled(&self) -> Result<(), NodeError> {
        if self.cancel.is_cancelled() {
            Err(NodeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Emit a node-scoped message to the canvas event bus.
    pub fn emit(&self, scope: impl Into<String>, message: impl Into<String>) {
        self.emitter
            .emit(CanvasEvent::node_message(self.node_id, scope, message));
    }
}

/// Errors that can occur during node execution.
///
/// These are fatal for the execution: the engine stops the run and surfaces
/// the failing node.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// The node addressed a port its instance does not have.
    #[error("no such port on this node: {port}")]
    #[diagnostic(
        code(flowcanvas::node::unknown_port),
        help("Port names come from the node's schema and dynamic layout; check for a rename.")
    )]
    UnknownPort { port: String },

    /// A published value could not be coerced to the output's declared type.
    #[error("value not convertible for output `{port}` (expects {expected})")]
    #[diagnostic(code(flowcanvas::node::output_type))]
    OutputType { port: String, expected: ValueType },

    /// The execution was cancelled while this node was running.
    #[error("execution cancelled")]
    #[diagnostic(code(flowcanvas::node::cancelled))]
    Cancelled,

    /// Node-specific failure.
    #[error("node failed: {0}")]
    #[diagnostic(code(flowcanvas::node::failed))]
    Failed(String),
}

impl NodeError {
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::Failed(message.into())
    }
}
