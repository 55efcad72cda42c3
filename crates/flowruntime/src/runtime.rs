use crate::{ExecutionResult, ExecutorRegistry, RunOptions, WorkflowEngine};
use flowcore::{FlowError, Run, RunId, RunStore, StepRun, Workflow, WorkflowId};
use std::sync::Arc;

/// Main runtime: the store, the executor registry and the engine over them
pub struct FlowRuntime {
    store: Arc<dyn RunStore>,
    engine: Arc<WorkflowEngine>,
}

/// Snapshot of a run and its step-runs, for polling
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: Run,
    pub steps: Vec<StepRun>,
}

impl FlowRuntime {
    pub fn new(store: Arc<dyn RunStore>, registry: Arc<ExecutorRegistry>) -> Self {
        let engine = Arc::new(WorkflowEngine::new(store.clone(), registry));
        Self { store, engine }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        self.engine.registry()
    }

    /// Register a workflow
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<(), FlowError> {
        tracing::info!("Registering workflow: {} ({})", workflow.name, workflow.id);
        self.store.insert_workflow(workflow).await?;
        Ok(())
    }

    /// Create a pending run; its execution is triggered separately
    pub async fn create_run(
        &self,
        workflow_id: WorkflowId,
        input: impl Into<String>,
    ) -> Result<Run, FlowError> {
        Ok(self.store.create_run(workflow_id, input.into()).await?)
    }

    /// Create a run and execute it in place
    pub async fn execute(
        &self,
        workflow_id: WorkflowId,
        input: impl Into<String>,
        options: RunOptions,
    ) -> Result<ExecutionResult, FlowError> {
        let run = self.create_run(workflow_id, input).await?;
        self.engine.execute_run(run.id, options).await
    }

    /// Current state of a run and its step-runs
    pub async fn status(&self, run_id: RunId) -> Result<RunReport, FlowError> {
        let run = self.store.get_run(run_id).await?;
        let steps = self.store.list_step_runs(run_id).await?;
        Ok(RunReport { run, steps })
    }
}
