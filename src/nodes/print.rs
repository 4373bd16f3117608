use async_trait::async_trait;
use tracing::info;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use crate::value::{Value, ValueType};

/// Sink: logs its input and emits it on the event bus.
#[derive(Default)]
pub struct PrintNode;

#[async_trait]
impl NodeBehavior for PrintNode {
    fn type_name(&self) -> &'static str {
        "print"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .input("value", ValueType::Any)
            .property("prefix", ValueType::Str, Value::Str(String::new()))
            .flow_in("run")
            .flow_out("done")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        let prefix = ctx.property_or("prefix", String::new());
        let text = match ctx.input("value") {
            Some(value) => format!("{prefix}{value}"),
            None => format!("{prefix}<no value>"),
        };
        info!(node = %ctx.node_id(), "{text}");
        ctx.emit("print", text);
        ctx.activate("done").await
    }
}
