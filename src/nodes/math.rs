use async_trait::async_trait;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use crate::value::ValueType;

/// `sum = a + b`. Unconnected inputs read as zero.
#[derive(Default)]
pub struct AddNode;

#[async_trait]
impl NodeBehavior for AddNode {
    fn type_name(&self) -> &'static str {
        "add"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .input("a", ValueType::Float)
            .input("b", ValueType::Float)
            .output("sum", ValueType::Float)
            .flow_in("run")
            .flow_out("done")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        let a = ctx.input_or("a", 0.0);
        let b = ctx.input_or("b", 0.0);
        ctx.set_output("sum", a + b)?;
        ctx.activate("done").await
    }
}
