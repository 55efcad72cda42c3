use crate::plan::ExecutionPlan;
use crate::registry::ExecutorRegistry;
use chrono::Utc;
use flowcore::{
    Document, ExecutorContext, FlowError, NodeId, NodeSpec, Run, RunId, RunStatus, RunStore,
    StepRun, StoreError, Value, WorkflowError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-run execution controls
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Lease id written when the run is claimed
    pub lease: Uuid,
    /// Wall-clock budget for the whole run
    pub timeout: Option<Duration>,
    /// Cancels the run from outside, e.g. on shutdown
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn new() -> Self {
        Self {
            lease: Uuid::new_v4(),
            timeout: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_lease(mut self, lease: Uuid) -> Self {
        self.lease = lease;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of workflow execution
#[derive(Debug)]
pub struct ExecutionResult {
    pub run_id: RunId,
    pub status: RunStatus,
    pub outputs: BTreeMap<NodeId, Value>,
    pub completed_nodes: usize,
    pub total_nodes: usize,
    /// First failure encountered, when the run failed
    pub error: Option<FlowError>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn timed_out(&self) -> bool {
        matches!(
            self.error.as_ref().and_then(FlowError::as_workflow),
            Some(WorkflowError::Timeout(_))
        )
    }
}

/// Stops a run when its token is cancelled or its deadline passes
struct RunGuard {
    cancellation: CancellationToken,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl RunGuard {
    fn new(options: &RunOptions) -> Self {
        Self {
            cancellation: options.cancellation.clone(),
            timeout: options.timeout,
            deadline: options.timeout.map(|t| Instant::now() + t),
        }
    }

    fn check(&self) -> Result<(), WorkflowError> {
        if self.cancellation.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Err(WorkflowError::Timeout(timeout))
            }
            _ => Ok(()),
        }
    }

    /// Resolves with the reason the run must stop
    async fn stopped(&self) -> WorkflowError {
        let expired = async {
            match (self.deadline, self.timeout) {
                (Some(deadline), Some(timeout)) => {
                    tokio::time::sleep_until(deadline).await;
                    timeout
                }
                _ => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => WorkflowError::Cancelled,
            timeout = expired => WorkflowError::Timeout(timeout),
        }
    }
}

/// In-memory state of one traversal
struct Traversal {
    input: Document,
    results: BTreeMap<NodeId, Value>,
}

/// Executes workflow runs node by node, recording step-runs as it goes
pub struct WorkflowEngine {
    store: Arc<dyn RunStore>,
    registry: Arc<ExecutorRegistry>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn RunStore>, registry: Arc<ExecutorRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Execute a pending run.
    ///
    /// Returns `Err` only when the run could not be claimed or its final
    /// state could not be written. Failures inside the run are recorded on
    /// the run and reported through [`ExecutionResult::error`].
    pub async fn execute_run(
        &self,
        run_id: RunId,
        options: RunOptions,
    ) -> Result<ExecutionResult, FlowError> {
        let mut run = match self.store.claim_run(run_id, options.lease).await {
            Ok(run) => run,
            Err(StoreError::Conflict { run_id, status }) => {
                return Err(WorkflowError::AlreadyClaimed { run_id, status }.into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(run_id, workflow_id = run.workflow_id, "Starting run");

        let guard = RunGuard::new(&options);
        let mut traversal = Traversal {
            input: Document::new(),
            results: BTreeMap::new(),
        };
        let mut total_nodes = 0;
        let outcome = self
            .traverse(&run, &mut traversal, &mut total_nodes, &guard)
            .await;

        run.completed_at = Some(Utc::now());
        run.output = Some(Value::Object(
            traversal
                .results
                .iter()
                .map(|(id, value)| (id.to_string(), value.clone()))
                .collect(),
        ));
        match &outcome {
            Ok(()) => {
                run.status = RunStatus::Completed;
                tracing::info!(run_id, "Run completed");
            }
            Err(e) => {
                run.status = RunStatus::Failed;
                run.error = Some(e.to_string());
                tracing::warn!(run_id, error = %e, "Run failed");
            }
        }
        self.store.update_run(&run).await?;

        Ok(ExecutionResult {
            run_id,
            status: run.status,
            completed_nodes: traversal.results.len(),
            outputs: traversal.results,
            total_nodes,
            error: outcome.err(),
        })
    }

    async fn traverse(
        &self,
        run: &Run,
        traversal: &mut Traversal,
        total_nodes: &mut usize,
        guard: &RunGuard,
    ) -> Result<(), FlowError> {
        traversal.input = Value::parse_document(&run.input)
            .map_err(|e| WorkflowError::InputParse(e.to_string()))?;

        let workflow = match self.store.load_workflow(run.workflow_id).await {
            Ok(workflow) => workflow,
            Err(StoreError::NotFound { .. }) => {
                return Err(WorkflowError::NotFound(run.workflow_id.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        };
        *total_nodes = workflow.nodes.len();

        let plan = ExecutionPlan::build(&workflow)?;
        let mut pending = plan.pending_inputs();

        // Depth-first: the first ready successor runs before later siblings.
        let mut stack: Vec<NodeId> = plan.sources().iter().rev().copied().collect();
        while let Some(node_id) = stack.pop() {
            guard.check()?;

            let node = plan
                .node(node_id)
                .ok_or(WorkflowError::NodeNotFound(node_id))?;
            self.execute_node(run, node, &plan, traversal, guard).await?;

            let mut ready = Vec::new();
            for conn in plan.outgoing(node_id) {
                if let Some(remaining) = pending.get_mut(&conn.target_node_id) {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        ready.push(conn.target_node_id);
                    }
                }
            }
            stack.extend(ready.into_iter().rev());
        }

        Ok(())
    }

    async fn execute_node(
        &self,
        run: &Run,
        node: &NodeSpec,
        plan: &ExecutionPlan<'_>,
        traversal: &mut Traversal,
        guard: &RunGuard,
    ) -> Result<(), FlowError> {
        let inputs = aggregate_inputs(node.id, plan, &traversal.input, &traversal.results);
        let mut step = self
            .store
            .create_step_run(StepRun::start(run.id, node.id, Value::Object(inputs.clone())))
            .await?;

        tracing::debug!(
            run_id = run.id,
            node_id = node.id,
            node_type = %node.node_type,
            "Executing node"
        );

        match self.invoke(run, node, inputs, guard).await {
            Ok(output) => {
                step.complete(output.clone());
                self.store.update_step_run(&step).await?;
                tracing::debug!(run_id = run.id, node_id = node.id, "Node completed");
                traversal.results.insert(node.id, output);
                Ok(())
            }
            Err(e) => {
                tracing::error!(run_id = run.id, node_id = node.id, error = %e, "Node failed");
                step.fail(e.to_string());
                self.store.update_step_run(&step).await?;
                Err(e)
            }
        }
    }

    async fn invoke(
        &self,
        run: &Run,
        node: &NodeSpec,
        inputs: Document,
        guard: &RunGuard,
    ) -> Result<Value, FlowError> {
        let config = Value::parse_document(&node.config).map_err(|e| {
            WorkflowError::ConfigParse {
                node_id: node.id,
                reason: e.to_string(),
            }
        })?;

        let reference = match self.store.node_type(&node.node_type).await? {
            Some(entry) => entry.executor,
            None => node.node_type.clone(),
        };
        let executor = self.registry.resolve(&reference).await?;

        let ctx = ExecutorContext {
            run_id: run.id,
            node_id: node.id,
            inputs,
            config,
            cancellation: guard.cancellation.child_token(),
        };
        let token = ctx.cancellation.clone();

        let result = tokio::select! {
            biased;
            reason = guard.stopped() => Err(reason),
            result = executor.execute(ctx) => result.map_err(|source| WorkflowError::NodeFailed {
                node_id: node.id,
                source,
            }),
        };
        if result.is_err() {
            token.cancel();
        }
        Ok(result?)
    }
}

/// Collect a node's input from the recorded outputs of its predecessors.
///
/// Start nodes receive the run input as is. Otherwise outputs are grouped by
/// target handle, each handle carrying a list in connection order even when
/// a single connection feeds it.
fn aggregate_inputs(
    node_id: NodeId,
    plan: &ExecutionPlan<'_>,
    run_input: &Document,
    results: &BTreeMap<NodeId, Value>,
) -> Document {
    let incoming = plan.incoming(node_id);
    if incoming.is_empty() {
        return run_input.clone();
    }

    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for conn in incoming {
        if let Some(output) = results.get(&conn.source_node_id) {
            grouped
                .entry(conn.target_handle.clone())
                .or_default()
                .push(output.clone());
        }
    }

    grouped
        .into_iter()
        .map(|(handle, values)| (handle, Value::Array(values)))
        .collect()
}
