use async_trait::async_trait;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use crate::value::{Value, ValueType};

/// Publishes its configured `value` property on the `value` output.
///
/// Has no flow ports, so the engine runs it in the data pass before any
/// flow entry fires; consumers always see the value published.
#[derive(Default)]
pub struct ConstantNode;

#[async_trait]
impl NodeBehavior for ConstantNode {
    fn type_name(&self) -> &'static str {
        "constant"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .output("value", ValueType::Any)
            .property("value", ValueType::Any, Value::Null)
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        ctx.set_output("value", ctx.property("value").unwrap_or(Value::Null))
    }
}
