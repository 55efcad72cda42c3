use crate::loader::{self, PLUGIN_PREFIX};
use flowcore::{Executor, WorkflowError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Factory trait for creating executor instances
pub trait ExecutorFactory: Send + Sync {
    /// Create a new executor. Factories take no parameters; per-node
    /// configuration arrives with each invocation.
    fn create(&self) -> Arc<dyn Executor>;

    /// Executor name this factory is registered under
    fn executor_type(&self) -> &str;

    /// Optional: Get executor metadata (description, schemas, etc.)
    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// Metadata about an executor, used by editor tooling only
#[derive(Debug, Clone)]
pub struct ExecutorMetadata {
    pub description: String,
    pub category: String,
    pub config_schema: serde_json::Value,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

impl Default for ExecutorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            config_schema: serde_json::Value::Null,
            input_schema: serde_json::Value::Null,
            output_schema: serde_json::Value::Null,
        }
    }
}

/// Hands out one shared executor instance
struct SharedFactory {
    executor: Arc<dyn Executor>,
}

impl ExecutorFactory for SharedFactory {
    fn create(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    fn executor_type(&self) -> &str {
        self.executor.executor_type()
    }
}

/// Registry of available executors
pub struct ExecutorRegistry {
    factories: HashMap<String, Arc<dyn ExecutorFactory>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an executor factory
    pub fn register(&mut self, factory: Arc<dyn ExecutorFactory>) {
        let executor_type = factory.executor_type().to_string();
        tracing::info!("Registering executor: {}", executor_type);
        self.factories.insert(executor_type, factory);
    }

    /// Register a ready-made executor under its own type name
    pub fn register_executor(&mut self, executor: Arc<dyn Executor>) {
        self.register(Arc::new(SharedFactory { executor }));
    }

    /// Resolve an executor reference.
    ///
    /// Registered names are matched first; `plugin:<path>` references load an
    /// out-of-process extension. Anything else is an unknown executor.
    pub async fn resolve(&self, reference: &str) -> Result<Arc<dyn Executor>, WorkflowError> {
        if let Some(factory) = self.factories.get(reference) {
            return Ok(factory.create());
        }

        if let Some(path) = reference.strip_prefix(PLUGIN_PREFIX) {
            let plugin = loader::load_plugin(Path::new(path)).await?;
            return Ok(Arc::new(plugin));
        }

        Err(WorkflowError::UnknownExecutor(reference.to_string()))
    }

    /// Get all registered executor names
    pub fn list_executor_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for an executor
    pub fn get_metadata(&self, executor_type: &str) -> Option<ExecutorMetadata> {
        self.factories.get(executor_type).map(|f| f.metadata())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
