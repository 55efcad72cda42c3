use crate::{NodeId, RunId, RunStatus};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// The run-level cause, when there is one
    pub fn as_workflow(&self) -> Option<&WorkflowError> {
        match self {
            FlowError::Workflow(e) => Some(e),
            _ => None,
        }
    }
}

/// Failures raised by an executor while running one node
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Extension broke the executor contract: {0}")]
    ExtensionContract(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Failures that abort a whole run
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Failed to parse run input: {0}")]
    InputParse(String),

    #[error("Failed to parse configuration of node {node_id}: {reason}")]
    ConfigParse { node_id: NodeId, reason: String },

    #[error("Workflow has no start nodes")]
    NoStartNode,

    #[error("Cyclic dependency detected at node {0}")]
    CyclicDependency(NodeId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    #[error("Unknown executor: {0}")]
    UnknownExecutor(String),

    #[error("Failed to load extension {path}: {reason}")]
    ExtensionLoad { path: String, reason: String },

    #[error("Extension {path} does not provide a valid executor factory: {reason}")]
    ExtensionContract { path: String, reason: String },

    #[error("Node {node_id} failed: {source}")]
    NodeFailed {
        node_id: NodeId,
        #[source]
        source: NodeError,
    },

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run {run_id} is already {status}")]
    AlreadyClaimed { run_id: RunId, status: RunStatus },
}

/// Failures of the data-access layer
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Run {run_id} cannot be claimed while {status}")]
    Conflict { run_id: RunId, status: RunStatus },

    #[error("Lease on run {0} is no longer held")]
    LeaseLost(RunId),
}
