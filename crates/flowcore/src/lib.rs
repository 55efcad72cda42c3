//! Core abstractions for the flow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: the workflow/run data model, the dynamic value
//! type, the executor contract and the storage boundary.

mod error;
mod executor;
mod run;
pub mod store;
mod value;
mod workflow;

pub use error::{FlowError, NodeError, StoreError, WorkflowError};
pub use executor::{Executor, ExecutorContext};
pub use run::{Run, RunId, RunStatus, StepRun, StepRunId, StepStatus};
pub use store::{MemoryStore, RunStore};
pub use value::{Document, Value};
pub use workflow::{
    Connection, ConnectionId, NodeId, NodeSpec, NodeTypeEntry, Position, Workflow, WorkflowId,
    DEFAULT_SOURCE_HANDLE, DEFAULT_TARGET_HANDLE,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
