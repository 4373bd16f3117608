use async_trait::async_trait;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use crate::value::{Value, ValueType};

/// Counts from `from` to `to` inclusive, firing `body` once per value with
/// the current number on the `current` output, then `done`.
///
/// Both bounds are connectable properties, so a graph can drive them from
/// upstream outputs instead of stored configuration. An empty range
/// (`from > to`) fires `done` immediately.
#[derive(Default)]
pub struct SequenceNode;

#[async_trait]
impl NodeBehavior for SequenceNode {
    fn type_name(&self) -> &'static str {
        "sequence"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .output("current", ValueType::Int)
            .connectable_property("from", ValueType::Int, Value::Int(1))
            .connectable_property("to", ValueType::Int, Value::Int(5))
            .flow_in("run")
            .flow_out("body")
            .flow_out("done")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        let from = ctx.property_or("from", 1i64);
        let to = ctx.property_or("to", 5i64);
        for current in from..=to {
            ctx.check_cancelled()?;
            ctx.set_output("current", current)?;
            ctx.activate("body").await?;
        }
        ctx.activate("done").await
    }
}
