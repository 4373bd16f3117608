//! Flow-driven execution engine.
//!
//! A run starts from the entry set: every node whose flow-in ports have no
//! incoming connection. Nodes without any flow ports run first, publishing
//! their outputs (constants, pure data sources); flow entries run after, in
//! canvas insertion order.
//!
//! Activation is a rendezvous. [`NodeCtx::activate`](crate::node::NodeCtx)
//! sends a flow-out name on a zero-capacity channel; the engine receives it,
//! suspends the sending node mid-`process`, and depth-first executes every
//! node connected to that flow-out before letting the sender resume. A loop
//! body therefore observes the looping node's outputs once per iteration,
//! in order.
//!
//! Re-entrancy is "one execution per activation": a node with several
//! incoming flow edges runs once each time any of them fires. Join behavior
//! (wait for all, accumulate) is expressed inside node behaviors, not by
//! the engine.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::canvas::Canvas;
use crate::event_bus::CanvasEvent;
use crate::node::{NodeCtx, NodeError, NodeInstance, OutputHandle, ResolvedInput};
use crate::types::NodeId;

/// Summary of one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Node executions, entry passes included.
    pub nodes_run: u64,
    /// Flow activations handled.
    pub activations: u64,
}

/// Errors that abort a run.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutionError {
    /// A node's `process` returned an error; the run stops at once.
    #[error("node `{name}` ({node}) failed")]
    #[diagnostic(code(flowcanvas::engine::node_failed))]
    NodeFailed {
        node: NodeId,
        name: String,
        #[source]
        #[diagnostic_source]
        source: NodeError,
    },

    /// The cancellation token fired before the run completed.
    #[error("execution cancelled")]
    #[diagnostic(code(flowcanvas::engine::cancelled))]
    Cancelled,

    /// A node disappeared mid-run. Executions borrow the canvas immutably,
    /// so this indicates corruption, not a race.
    #[error("node {node} vanished during execution")]
    #[diagnostic(code(flowcanvas::engine::node_vanished))]
    NodeVanished { node: NodeId },
}

/// One execution of a canvas.
///
/// Borrows the canvas for the duration of the run; structure cannot change
/// underneath it, only output slot contents move.
pub struct ExecutionEngine<'a> {
    canvas: &'a Canvas,
    cancel: CancellationToken,
    nodes_run: AtomicU64,
    activations: AtomicU64,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(canvas: &'a Canvas, cancel: CancellationToken) -> Self {
        Self {
            canvas,
            cancel,
            nodes_run: AtomicU64::new(0),
            activations: AtomicU64::new(0),
        }
    }

    /// Run to completion: data pass, then every flow entry.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunReport, ExecutionError> {
        let data_entries: Vec<NodeId> = self
            .canvas
            .nodes()
            .iter()
            .filter(|n| !n.has_flow_ports())
            .map(NodeInstance::id)
            .collect();
        let flow_entries: Vec<NodeId> = self
            .canvas
            .nodes()
            .iter()
            .filter(|n| n.has_flow_ports() && n.is_flow_entry())
            .map(NodeInstance::id)
            .collect();

        for id in data_entries.into_iter().chain(flow_entries) {
            if self.cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            self.run_node(id).await?;
        }

        let report = RunReport {
            nodes_run: self.nodes_run.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
        };
        self.canvas.emitter().emit(CanvasEvent::RunCompleted {
            nodes_run: report.nodes_run,
            activations: report.activations,
        });
        debug!(nodes_run = report.nodes_run, activations = report.activations, "run complete");
        Ok(report)
    }

    /// Execute one node, handling its activations as they arrive.
    ///
    /// Boxed because activation handling recurses into downstream nodes.
    fn run_node(&self, id: NodeId) -> BoxFuture<'_, Result<(), ExecutionError>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            let node = self
                .canvas
                .node(id)
                .ok_or(ExecutionError::NodeVanished { node: id })?;
            let node_name = node.name.clone();
            debug!(node = %id, name = %node_name, "running node");
            self.nodes_run.fetch_add(1, Ordering::Relaxed);

            // Zero capacity: the node's `activate` completes only once this
            // loop has picked the token up and finished propagating it.
            let (tx, rx) = flume::bounded::<String>(0);
            let ctx = self.build_ctx(node, tx);
            let behavior = node.behavior();
            let mut fut = behavior.process(ctx);

            let finished = loop {
                tokio::select! {
                    biased;
                    res = &mut fut => break res,
                    activation = rx.recv_async() => match activation {
                        Ok(flow_out) => {
                            self.activations.fetch_add(1, Ordering::Relaxed);
                            self.propagate(id, &flow_out).await?;
                        }
                        // The node dropped its context before returning;
                        // nothing more can arrive, so just finish it.
                        Err(_) => break (&mut fut).await,
                    }
                }
            };
            finished.map_err(|source| match source {
                NodeError::Cancelled => ExecutionError::Cancelled,
                source => ExecutionError::NodeFailed {
                    node: id,
                    name: node_name,
                    source,
                },
            })
        })
    }

    /// Depth-first execution of every node attached to one flow-out.
    async fn propagate(&self, from: NodeId, flow_out: &str) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let targets: Vec<NodeId> = {
            let node = self
                .canvas
                .node(from)
                .ok_or(ExecutionError::NodeVanished { node: from })?;
            match node.flow_out(flow_out) {
                Some(port) => port
                    .connections
                    .iter()
                    .filter_map(|cid| self.canvas.connection(*cid))
                    .map(|c| c.target.node)
                    .collect(),
                None => Vec::new(),
            }
        };
        for target in targets {
            self.run_node(target).await?;
        }
        Ok(())
    }

    /// Resolve one node's graph environment into an execution context.
    fn build_ctx(&self, node: &NodeInstance, activations: flume::Sender<String>) -> NodeCtx {
        let mut inputs = FxHashMap::default();
        for port in node.inputs() {
            let slot = port.connections.first().and_then(|cid| {
                let connection = self.canvas.connection(*cid)?;
                self.canvas
                    .node(connection.source.node)?
                    .output_slot(&connection.source.name)
            });
            inputs.insert(
                port.name.clone(),
                ResolvedInput {
                    slot,
                    converter: port.converter.clone(),
                    target_type: port.value_type.clone(),
                },
            );
        }
        let mut outputs = FxHashMap::default();
        for port in node.outputs() {
            if let Some(slot) = port.slot() {
                outputs.insert(
                    port.name.clone(),
                    OutputHandle {
                        slot: slot.clone(),
                        value_type: port.value_type.clone(),
                        port: node.port_ref(port),
                    },
                );
            }
        }
        let flow_outs = node.flow_outs().iter().map(|p| p.name.clone()).collect();
        NodeCtx::new(
            node.id(),
            node.name.clone(),
            inputs,
            outputs,
            node.properties().to_vec(),
            flow_outs,
            activations,
            self.cancel.clone(),
            self.canvas.emitter(),
            self.canvas.conversion().clone(),
        )
    }
}
