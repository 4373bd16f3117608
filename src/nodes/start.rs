use async_trait::async_trait;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};

/// Flow source: fires its single `run` flow-out once per execution.
#[derive(Default)]
pub struct StartNode;

#[async_trait]
impl NodeBehavior for StartNode {
    fn type_name(&self) -> &'static str {
        "start"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new().flow_out("run")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        ctx.activate("run").await
    }
}
