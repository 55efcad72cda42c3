use crate::template::input_items;
use async_trait::async_trait;
use flowcore::{Executor, ExecutorContext, NodeError, Value};
use flowruntime::{ExecutorFactory, ExecutorMetadata};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

/// Comparison applied between an item's field and the configured operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
}

impl FromStr for FilterOperator {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "greater_than" => Ok(Self::GreaterThan),
            "less_than" => Ok(Self::LessThan),
            other => Err(NodeError::Config(format!("Unknown filter operator: {}", other))),
        }
    }
}

impl FilterOperator {
    /// `field` is `None` when the item has no value at the configured path;
    /// such an item only satisfies `not_equals`.
    pub fn matches(&self, field: Option<&Value>, operand: &Value) -> bool {
        let Some(field) = field else {
            return *self == Self::NotEquals;
        };
        match self {
            Self::Equals => field.to_string() == operand.to_string(),
            Self::NotEquals => field.to_string() != operand.to_string(),
            Self::Contains => field.to_string().contains(&operand.to_string()),
            Self::GreaterThan => numeric(field, operand).is_some_and(|(a, b)| a > b),
            Self::LessThan => numeric(field, operand).is_some_and(|(a, b)| a < b),
        }
    }
}

fn numeric(field: &Value, operand: &Value) -> Option<(f64, f64)> {
    Some((field.as_number()?, operand.as_number()?))
}

/// Keeps the items whose field satisfies the operator
pub struct FilterExecutor;

#[async_trait]
impl Executor for FilterExecutor {
    fn executor_type(&self) -> &str {
        "filter"
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        let field = ctx.config_str("field")?.unwrap_or("");
        let operator: FilterOperator = ctx.config_str("operator")?.unwrap_or("equals").parse()?;
        let operand = ctx.get_config_or("value", Value::Null);

        let items = input_items(&ctx.inputs);
        let total = items.len();
        let kept: Vec<Value> = items
            .into_iter()
            .filter(|item| operator.matches(item.lookup_path(field), &operand))
            .collect();

        tracing::debug!(node_id = ctx.node_id, "Filter kept {} of {} items", kept.len(), total);
        Ok(Value::Array(kept))
    }
}

pub struct FilterExecutorFactory;

impl ExecutorFactory for FilterExecutorFactory {
    fn create(&self) -> Arc<dyn Executor> {
        Arc::new(FilterExecutor)
    }

    fn executor_type(&self) -> &str {
        "filter"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Filters data based on conditions".to_string(),
            category: "Data Processing".to_string(),
            config_schema: json!({
                "type": "object",
                "properties": {
                    "field": {"type": "string"},
                    "operator": {
                        "type": "string",
                        "enum": ["equals", "not_equals", "contains", "greater_than", "less_than"],
                        "default": "equals"
                    },
                    "value": {}
                }
            }),
            input_schema: json!({"type": "object", "properties": {"input": {"type": "array"}}}),
            output_schema: json!({"type": "array"}),
        }
    }
}
