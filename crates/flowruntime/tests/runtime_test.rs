use async_trait::async_trait;
use flowcore::{
    Executor, ExecutorContext, MemoryStore, NodeError, NodeSpec, RunStatus, StepStatus, Value,
    Workflow,
};
use flowruntime::{ExecutorFactory, ExecutorMetadata, ExecutorRegistry, FlowRuntime, RunOptions};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Doubles the `n` field of its single input.
///
/// Start nodes see the run input as is, downstream nodes a list per handle.
struct DoubleExecutor;

#[async_trait]
impl Executor for DoubleExecutor {
    fn executor_type(&self) -> &str {
        "double"
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        let n = ctx
            .inputs
            .values()
            .next()
            .and_then(|v| match v {
                Value::Array(items) => items.first(),
                other => Some(other),
            })
            .and_then(|v| v.lookup_path("n"))
            .and_then(Value::as_number)
            .ok_or_else(|| NodeError::Execution("n is missing".to_string()))?;
        Ok(Value::object([("n", n * 2.0)]))
    }
}

struct DoubleFactory;

impl ExecutorFactory for DoubleFactory {
    fn create(&self) -> Arc<dyn Executor> {
        Arc::new(DoubleExecutor)
    }

    fn executor_type(&self) -> &str {
        "double"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Doubles a number".to_string(),
            category: "math".to_string(),
            ..ExecutorMetadata::default()
        }
    }
}

fn runtime() -> FlowRuntime {
    let mut registry = ExecutorRegistry::new();
    registry.register(Arc::new(DoubleFactory));
    FlowRuntime::new(Arc::new(MemoryStore::new()), Arc::new(registry))
}

fn chain() -> Workflow {
    let mut workflow = Workflow::new(1, "double twice");
    workflow.add_node(NodeSpec::new(1, "double"));
    workflow.add_node(NodeSpec::new(2, "double"));
    workflow.connect(1, 2);
    workflow
}

#[tokio::test]
async fn test_registry_metadata() {
    let runtime = runtime();
    let registry = runtime.registry();

    assert_eq!(registry.list_executor_types(), vec!["double".to_string()]);
    let metadata = registry.get_metadata("double").unwrap();
    assert_eq!(metadata.category, "math");
    assert!(registry.get_metadata("missing").is_none());
}

#[tokio::test]
async fn test_created_run_stays_pending_until_executed() {
    let runtime = runtime();
    let workflow = chain();
    assert!(workflow.find_node(2).is_some());
    runtime.register_workflow(workflow).await.unwrap();

    let run = runtime.create_run(1, r#"{"seed": {"n": 3}}"#).await.unwrap();
    let report = runtime.status(run.id).await.unwrap();
    assert_eq!(report.run.status, RunStatus::Pending);
    assert!(report.steps.is_empty());

    let lease = Uuid::new_v4();
    let result = runtime
        .engine()
        .execute_run(run.id, RunOptions::new().with_lease(lease))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.completed_nodes, 2);
    assert_eq!(result.total_nodes, 2);

    let report = runtime.status(run.id).await.unwrap();
    assert_eq!(report.run.status, RunStatus::Completed);
    assert_eq!(report.run.claimed_by, Some(lease));
    assert!(report.run.started_at.is_some());
    assert!(report.run.completed_at.is_some());
    assert_eq!(
        report.run.output,
        Some(Value::from(json!({"1": {"n": 6}, "2": {"n": 12}})))
    );
    assert_eq!(report.steps.len(), 2);
    assert!(report
        .steps
        .iter()
        .all(|step| step.status == StepStatus::Completed));
    assert_eq!(report.steps[1].input, Value::from(json!({"input": [{"n": 6}]})));
}

#[tokio::test]
async fn test_execute_creates_and_runs() {
    let runtime = runtime();
    runtime.register_workflow(chain()).await.unwrap();

    let result = runtime
        .execute(1, r#"{"seed": {"n": 1}}"#, RunOptions::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.outputs.get(&2), Some(&Value::from(json!({"n": 4}))));
}

#[tokio::test]
async fn test_unknown_workflow() {
    let runtime = runtime();
    assert!(runtime.create_run(9, "").await.is_err());
    assert!(runtime.status(9).await.is_err());
}
