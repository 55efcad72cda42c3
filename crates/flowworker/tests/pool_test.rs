use async_trait::async_trait;
use flowcore::{
    Executor, ExecutorContext, MemoryStore, NodeError, NodeSpec, Run, RunId, RunStatus, RunStore,
    Value, Workflow,
};
use flowqueue::{MemoryQueue, QueueBackend, TaskQueue};
use flowruntime::{ExecutorRegistry, WorkflowEngine};
use flowworker::{WorkerConfig, WorkerPool};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const QUEUE: &str = "test_tasks";

/// Sleeps for a minute unless cancelled
struct SlowExecutor;

#[async_trait]
impl Executor for SlowExecutor {
    fn executor_type(&self) -> &str {
        "slow"
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
            _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(Value::Null),
        }
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    backend: Arc<MemoryQueue>,
    queue: TaskQueue,
    engine: Arc<WorkflowEngine>,
}

impl Harness {
    fn new() -> Self {
        let mut registry = ExecutorRegistry::new();
        flownodes::register_all(&mut registry);
        registry.register_executor(Arc::new(SlowExecutor));

        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryQueue::new());
        let queue = TaskQueue::new(backend.clone());
        let engine = Arc::new(WorkflowEngine::new(store.clone(), Arc::new(registry)));
        Self {
            store,
            backend,
            queue,
            engine,
        }
    }

    fn config(&self) -> WorkerConfig {
        WorkerConfig {
            workers: 2,
            queue: QUEUE.to_string(),
            poll_interval: Duration::from_millis(20),
            execution_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_millis(200),
        }
    }

    fn spawn(&self, config: WorkerConfig) -> WorkerPool {
        WorkerPool::spawn(config, self.queue.clone(), self.engine.clone())
    }

    async fn submit(&self, workflow: Workflow, input: serde_json::Value) -> RunId {
        let workflow_id = workflow.id;
        self.store.insert_workflow(workflow).await.unwrap();
        let run = self
            .store
            .create_run(workflow_id, input.to_string())
            .await
            .unwrap();
        self.queue.enqueue_run(QUEUE, run.id).await.unwrap();
        run.id
    }

    /// Poll until the run leaves `status`
    async fn wait_while(&self, run_id: RunId, status: RunStatus) -> Run {
        for _ in 0..200 {
            let run = self.store.get_run(run_id).await.unwrap();
            if run.status != status {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} stayed {}", run_id, status);
    }

    async fn wait_terminal(&self, run_id: RunId) -> Run {
        for _ in 0..500 {
            let run = self.store.get_run(run_id).await.unwrap();
            if run.status.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} did not finish", run_id);
    }
}

fn active_users(id: u64) -> Workflow {
    let mut workflow = Workflow::new(id, "active users");
    workflow.add_node(
        NodeSpec::new(1, "filter")
            .with_config(json!({"field": "status", "operator": "equals", "value": "active"})),
    );
    workflow
}

fn slow_workflow(id: u64) -> Workflow {
    let mut workflow = Workflow::new(id, "slow");
    workflow.add_node(NodeSpec::new(1, "slow"));
    workflow
}

#[tokio::test]
async fn test_queued_run_completes() {
    let harness = Harness::new();
    let pool = harness.spawn(harness.config());

    let run_id = harness
        .submit(
            active_users(1),
            json!({"input": [
                {"name": "ada", "status": "active"},
                {"name": "bob", "status": "inactive"}
            ]}),
        )
        .await;

    let run = harness.wait_terminal(run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.output.unwrap().lookup_path("1"),
        Some(&Value::from(json!([{"name": "ada", "status": "active"}])))
    );

    pool.shutdown().await;
}

#[tokio::test]
async fn test_many_runs_across_workers() {
    let harness = Harness::new();
    let pool = harness.spawn(WorkerConfig {
        workers: 4,
        ..harness.config()
    });

    harness
        .store
        .insert_workflow(active_users(1))
        .await
        .unwrap();
    let mut runs = Vec::new();
    for i in 0..10 {
        let input = json!({"input": [{"name": i.to_string(), "status": "active"}]});
        let run = harness.store.create_run(1, input.to_string()).await.unwrap();
        harness.queue.enqueue_run(QUEUE, run.id).await.unwrap();
        runs.push(run.id);
    }

    for run_id in runs {
        let run = harness.wait_terminal(run_id).await;
        assert_eq!(run.status, RunStatus::Completed);
    }
    assert_eq!(harness.backend.len(QUEUE).await, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_timeout_marks_run_failed() {
    let harness = Harness::new();
    let pool = harness.spawn(WorkerConfig {
        execution_timeout: Duration::from_millis(100),
        ..harness.config()
    });

    let run_id = harness.submit(slow_workflow(1), json!({})).await;

    let run = harness.wait_terminal(run_id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("timed out"));

    pool.shutdown().await;
}

#[tokio::test]
async fn test_unknown_and_malformed_tasks_are_dropped() {
    let harness = Harness::new();
    let pool = harness.spawn(harness.config());

    harness
        .queue
        .enqueue(QUEUE, "send_email", &json!({"to": "nobody"}))
        .await
        .unwrap();
    harness
        .queue
        .enqueue(QUEUE, flowqueue::TASK_EXECUTE_WORKFLOW, &json!({"run": "x"}))
        .await
        .unwrap();
    let run_id = harness
        .submit(active_users(1), json!({"input": []}))
        .await;

    let run = harness.wait_terminal(run_id).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(harness.backend.len(QUEUE).await, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_queue_errors_do_not_stop_workers() {
    let harness = Harness::new();
    let pool = harness.spawn(harness.config());

    harness
        .backend
        .push(QUEUE, b"not an envelope".to_vec())
        .await
        .unwrap();
    let run_id = harness
        .submit(active_users(1), json!({"input": []}))
        .await;

    let run = harness.wait_terminal(run_id).await;
    assert_eq!(run.status, RunStatus::Completed);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_runs_after_grace() {
    let harness = Harness::new();
    let pool = harness.spawn(harness.config());

    let run_id = harness.submit(slow_workflow(1), json!({})).await;
    harness.wait_while(run_id, RunStatus::Pending).await;

    pool.shutdown().await;

    let run = harness.store.get_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("cancelled"));
}

#[tokio::test]
async fn test_shutdown_stops_taking_tasks() {
    let harness = Harness::new();
    let pool = harness.spawn(harness.config());
    pool.shutdown().await;

    let run_id = harness
        .submit(active_users(1), json!({"input": []}))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let run = harness.store.get_run(run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(harness.backend.len(QUEUE).await, 1);
}
