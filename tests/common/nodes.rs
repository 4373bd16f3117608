//! Test-only node behaviors.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use flowcanvas::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use flowcanvas::registry::NodeRegistry;
use flowcanvas::value::{Value, ValueType};

/// Shared recording buffer for [`CollectNode`].
pub type Collected = Arc<Mutex<Vec<Value>>>;

pub fn collected() -> Collected {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records its `value` input once per activation.
pub struct CollectNode {
    seen: Collected,
}

impl CollectNode {
    pub fn new(seen: Collected) -> Self {
        Self { seen }
    }
}

#[async_trait]
impl NodeBehavior for CollectNode {
    fn type_name(&self) -> &'static str {
        "collect"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .input("value", ValueType::Any)
            .flow_in("run")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        self.seen
            .lock()
            .push(ctx.input("value").unwrap_or(Value::Null));
        Ok(())
    }
}

/// Fails every activation.
#[derive(Default)]
pub struct FailNode;

#[async_trait]
impl NodeBehavior for FailNode {
    fn type_name(&self) -> &'static str {
        "fail"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new().flow_in("run").flow_out("done")
    }

    async fn process(&self, _ctx: NodeCtx) -> Result<(), NodeError> {
        Err(NodeError::failed("intentional test failure"))
    }
}

/// Spins until cancelled, checking cooperatively.
#[derive(Default)]
pub struct BlockNode;

#[async_trait]
impl NodeBehavior for BlockNode {
    fn type_name(&self) -> &'static str {
        "block"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new().flow_in("run")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        loop {
            ctx.check_cancelled()?;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

/// Narrow-typed inputs for exercising connection-time type rejection.
#[derive(Default)]
pub struct TimestampNode;

#[async_trait]
impl NodeBehavior for TimestampNode {
    fn type_name(&self) -> &'static str {
        "timestamp"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .input("when", ValueType::DateTime)
            .output("text", ValueType::Str)
            .flow_in("run")
            .flow_out("done")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        if let Some(when) = ctx.input("when") {
            ctx.set_output("text", when.to_string())?;
        }
        ctx.activate("done").await
    }
}

/// Register the stateless test behaviors. [`CollectNode`] shares a buffer
/// with the test, so tests register it themselves via
/// [`NodeRegistry::register_with`].
pub fn install(registry: &mut NodeRegistry) {
    registry.register::<FailNode>();
    registry.register::<BlockNode>();
    registry.register::<TimestampNode>();
}

/// Register a collect node wired to `seen`.
pub fn install_collect(registry: &mut NodeRegistry, seen: Collected) {
    registry.register_with(move || Arc::new(CollectNode::new(seen.clone())));
}
