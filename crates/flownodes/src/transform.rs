use crate::template::{exact_placeholder, input_items, interpolate};
use async_trait::async_trait;
use flowcore::{Executor, ExecutorContext, NodeError, Value};
use flowruntime::{ExecutorFactory, ExecutorMetadata};
use serde_json::json;
use std::sync::Arc;

/// Reshapes each input item through a template document
pub struct TransformExecutor;

/// Walk `template`, filling placeholders from `item`
fn render(template: &Value, item: &Value) -> Value {
    match template {
        Value::String(text) => {
            if let Some(path) = exact_placeholder(text) {
                return item.lookup_path(path).cloned().unwrap_or(Value::Null);
            }
            if text.contains("{{") {
                let rendered = interpolate(text, |path| item.lookup_path(path).map(|v| v.to_string()));
                return Value::String(rendered);
            }
            template.clone()
        }
        Value::Array(items) => Value::Array(items.iter().map(|t| render(t, item)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, t)| (key.clone(), render(t, item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[async_trait]
impl Executor for TransformExecutor {
    fn executor_type(&self) -> &str {
        "transform"
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        let mapping = ctx.require_config("mapping")?;
        let items = input_items(&ctx.inputs);

        tracing::debug!(node_id = ctx.node_id, "Transforming {} items", items.len());

        Ok(Value::Array(
            items.iter().map(|item| render(mapping, item)).collect(),
        ))
    }
}

pub struct TransformExecutorFactory;

impl ExecutorFactory for TransformExecutorFactory {
    fn create(&self) -> Arc<dyn Executor> {
        Arc::new(TransformExecutor)
    }

    fn executor_type(&self) -> &str {
        "transform"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Transforms data based on a mapping".to_string(),
            category: "Data Processing".to_string(),
            config_schema: json!({
                "type": "object",
                "required": ["mapping"],
                "properties": {"mapping": {"type": "object"}}
            }),
            input_schema: json!({"type": "object", "properties": {"input": {"type": "array"}}}),
            output_schema: json!({"type": "array"}),
        }
    }
}
