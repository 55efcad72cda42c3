use crate::{Document, NodeError, NodeId, RunId, Value};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Runtime behavior bound to a node type.
///
/// An executor sees only its configuration and its resolved inputs; it may
/// assume every declared input is complete when it is invoked, nothing else
/// about ordering.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executor name (e.g., "httpRequest", "filter")
    fn executor_type(&self) -> &str;

    /// Produce this node's output from its configuration and inputs
    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError>;
}

/// Execution context passed to each executor
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    pub run_id: RunId,
    pub node_id: NodeId,

    /// Values delivered on each input port, or the run input for start nodes
    pub inputs: Document,

    /// Static configuration for this node
    pub config: Document,

    /// Cancelled when the run times out or is abandoned
    pub cancellation: CancellationToken,
}

impl ExecutorContext {
    pub fn new(run_id: RunId, node_id: NodeId) -> Self {
        Self {
            run_id,
            node_id,
            inputs: Document::new(),
            config: Document::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: Document) -> Self {
        self.config = config;
        self
    }

    pub fn with_inputs(mut self, inputs: Document) -> Self {
        self.inputs = inputs;
        self
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Config(format!("{} is required in config", name)))
    }

    /// Optional string config; present values of another type are an error
    pub fn config_str(&self, name: &str) -> Result<Option<&str>, NodeError> {
        match self.config.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(NodeError::Config(format!("{} must be a string", name))),
        }
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }
}
