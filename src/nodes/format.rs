use async_trait::async_trait;

use crate::node::{DynamicLayout, NodeBehavior, NodeCtx, NodeError, NodeSchema, PropertyView};
use crate::value::{Value, ValueType};

/// Substitutes `{}` placeholders in a template with argument inputs.
///
/// The `template` property drives the dynamic layout: one `argN` input per
/// placeholder, in order. Editing the template adds and removes argument
/// ports; connections to removed ports are dropped by the canvas.
#[derive(Default)]
pub struct FormatNode;

fn placeholder_count(template: &str) -> usize {
    template.matches("{}").count()
}

#[async_trait]
impl NodeBehavior for FormatNode {
    fn type_name(&self) -> &'static str {
        "format"
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new()
            .output("text", ValueType::Str)
            .property("template", ValueType::Str, Value::Str(String::new()))
            .flow_in("run")
            .flow_out("done")
    }

    fn dynamic_layout(&self, properties: &PropertyView<'_>) -> DynamicLayout {
        let template = properties.str_or("template", "");
        let mut layout = DynamicLayout::new();
        for i in 0..placeholder_count(&template) {
            layout = layout.input(format!("arg{i}"), ValueType::Str);
        }
        layout
    }

    async fn process(&self, ctx: NodeCtx) -> Result<(), NodeError> {
        let template = ctx.property_or("template", String::new());
        let mut text = String::with_capacity(template.len());
        let mut rest = template.as_str();
        let mut index = 0;
        while let Some(pos) = rest.find("{}") {
            text.push_str(&rest[..pos]);
            text.push_str(&ctx.input_or(&format!("arg{index}"), String::new()));
            rest = &rest[pos + 2..];
            index += 1;
        }
        text.push_str(rest);
        ctx.set_output("text", text)?;
        ctx.activate("done").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_counting() {
        assert_eq!(placeholder_count(""), 0);
        assert_eq!(placeholder_count("{} and {}"), 2);
        assert_eq!(placeholder_count("{ }"), 0);
    }
}
