//! Standard node library
//!
//! Built-in executors: outbound HTTP calls, item filtering and template
//! transforms.

mod filter;
mod http;
mod template;
mod transform;

pub use filter::{FilterExecutor, FilterExecutorFactory, FilterOperator};
pub use http::{HttpRequestExecutor, HttpRequestExecutorFactory};
pub use transform::{TransformExecutor, TransformExecutorFactory};

use flowcore::NodeTypeEntry;
use flowruntime::{ExecutorFactory, ExecutorRegistry};
use std::sync::Arc;

fn factories() -> Vec<(Arc<dyn ExecutorFactory>, &'static str)> {
    let http: Arc<dyn ExecutorFactory> = Arc::new(HttpRequestExecutorFactory);
    let filter: Arc<dyn ExecutorFactory> = Arc::new(FilterExecutorFactory);
    let transform: Arc<dyn ExecutorFactory> = Arc::new(TransformExecutorFactory);
    vec![
        (http, "HTTP Request"),
        (filter, "Filter"),
        (transform, "Transform"),
    ]
}

/// Register all standard executors with a registry
pub fn register_all(registry: &mut ExecutorRegistry) {
    for (factory, _) in factories() {
        registry.register(factory);
    }
}

/// Catalog entries for the built-in node types, keyed by executor name
pub fn node_types() -> Vec<NodeTypeEntry> {
    factories()
        .into_iter()
        .map(|(factory, name)| {
            let metadata = factory.metadata();
            NodeTypeEntry {
                key: factory.executor_type().to_string(),
                name: name.to_string(),
                description: metadata.description,
                category: metadata.category,
                executor: factory.executor_type().to_string(),
                config_schema: metadata.config_schema,
                input_schema: metadata.input_schema,
                output_schema: metadata.output_schema,
            }
        })
        .collect()
}
