//! Workflow execution runtime
//!
//! This crate provides the engine that runs workflows, the executor registry
//! with its extension loader, and the validated execution plan the engine
//! walks.

mod engine;
pub mod loader;
mod plan;
mod registry;
mod runtime;

pub use engine::{ExecutionResult, RunOptions, WorkflowEngine};
pub use loader::{PluginExecutor, FACTORY_ENTRY_POINT, PLUGIN_PREFIX, PROTOCOL_VERSION};
pub use plan::ExecutionPlan;
pub use registry::{ExecutorFactory, ExecutorMetadata, ExecutorRegistry};
pub use runtime::{FlowRuntime, RunReport};
