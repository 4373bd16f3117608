use async_trait::async_trait;
use parking_lot::Mutex;

use crate::node::{NodeBehavior, NodeCtx, NodeError, NodeSchema};
use crate::value::ValueType;

/// Running sum across activations.
///
/// Each `add` activation folds the `value` input into a per-node total and
/// republishes it on `total`. The registry creates one behavior per node
/// instance, so the state is per-node; it carries across runs of the same
/// canvas. This is the node-level join pattern: a node fed by several flow
/// edges runs once per activation and keeps its own state.
#[derive(Default)]
pub struct AccumulateNode {
    total: Mutex<f64>,
}

#[async_trait]
impl NodeBehavior for AccumulateNode {
    fn type_name(&self) -> &'static str {
        "accumulate"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .input("value", ValueType::Float)
            .output("total", ValueType::Float)
            .flow_in("add")
            .flow_out("updated")
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        let value = ctx.input_or("value", 0.0);
        let total = {
            let mut guard = self.total.lock();
            *guard += value;
            *guard
        };
        ctx.set_output("total", total)?;
        ctx.activate("updated").await
    }
}
