use crate::WorkerConfig;
use flowcore::RunId;
use flowqueue::{ExecuteWorkflowPayload, TaskEnvelope, TaskQueue, TASK_EXECUTE_WORKFLOW};
use flowruntime::{RunOptions, WorkflowEngine};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Fixed set of worker loops consuming one queue
pub struct WorkerPool {
    config: Arc<WorkerConfig>,
    /// Stops the loops from taking new tasks
    shutdown: CancellationToken,
    /// Cancels runs still in flight
    abort: CancellationToken,
    workers: JoinSet<()>,
}

struct Worker {
    id: usize,
    config: Arc<WorkerConfig>,
    queue: TaskQueue,
    engine: Arc<WorkflowEngine>,
    shutdown: CancellationToken,
    abort: CancellationToken,
}

impl WorkerPool {
    /// Start `config.workers` loops on the current runtime
    pub fn spawn(config: WorkerConfig, queue: TaskQueue, engine: Arc<WorkflowEngine>) -> Self {
        let config = Arc::new(config);
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        let mut workers = JoinSet::new();

        for id in 0..config.workers {
            let worker = Worker {
                id,
                config: config.clone(),
                queue: queue.clone(),
                engine: engine.clone(),
                shutdown: shutdown.clone(),
                abort: abort.clone(),
            };
            workers.spawn(worker.run());
        }

        tracing::info!(
            workers = config.workers,
            queue = %config.queue,
            "Worker pool started"
        );

        Self {
            config,
            shutdown,
            abort,
            workers,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Stop taking tasks and wind down.
    ///
    /// In-flight runs get the grace period to finish; after that they are
    /// cancelled, which marks them failed, and any loop still running is
    /// aborted.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down worker pool");
        self.shutdown.cancel();

        let grace = self.config.shutdown_grace;
        if self.drain(grace).await {
            tracing::info!("Worker pool stopped");
            return;
        }

        tracing::warn!(?grace, "Grace period elapsed, cancelling in-flight runs");
        self.abort.cancel();
        if !self.drain(grace).await {
            tracing::error!("Workers did not stop, aborting");
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }
        tracing::info!("Worker pool stopped");
    }

    /// Wait up to `limit` for every loop to exit
    async fn drain(&mut self, limit: std::time::Duration) -> bool {
        let workers = &mut self.workers;
        tokio::time::timeout(limit, async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Worker task failed: {}", e);
                }
            }
        })
        .await
        .is_ok()
    }
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = self.queue.dequeue(&self.config.queue, self.config.poll_interval) => next,
            };

            match next {
                Ok(Some(envelope)) => self.dispatch(envelope).await,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(worker_id = self.id, error = %e, "Failed to dequeue task");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
        }

        tracing::debug!(worker_id = self.id, "Worker stopped");
    }

    async fn dispatch(&self, envelope: TaskEnvelope) {
        match envelope.task_type.as_str() {
            TASK_EXECUTE_WORKFLOW => match envelope.decode_payload::<ExecuteWorkflowPayload>() {
                Ok(payload) => self.execute(payload.execution_id).await,
                Err(e) => {
                    tracing::warn!(worker_id = self.id, error = %e, "Dropping malformed task");
                }
            },
            other => {
                tracing::warn!(worker_id = self.id, task_type = other, "Dropping unknown task type");
            }
        }
    }

    async fn execute(&self, run_id: RunId) {
        // Each attempt claims the run under a fresh lease
        let options = RunOptions::new()
            .with_timeout(self.config.execution_timeout)
            .with_cancellation(self.abort.child_token());

        tracing::info!(worker_id = self.id, run_id, "Executing run");

        match self.engine.execute_run(run_id, options).await {
            Ok(result) if result.is_success() => {
                tracing::info!(
                    worker_id = self.id,
                    run_id,
                    completed = result.completed_nodes,
                    total = result.total_nodes,
                    "Run completed"
                );
            }
            Ok(result) if result.timed_out() => {
                tracing::warn!(
                    worker_id = self.id,
                    run_id,
                    timeout = ?self.config.execution_timeout,
                    "Run timed out"
                );
            }
            Ok(result) => {
                let error = result.error.map(|e| e.to_string()).unwrap_or_default();
                tracing::warn!(worker_id = self.id, run_id, error = %error, "Run failed");
            }
            Err(e) => {
                tracing::error!(worker_id = self.id, run_id, error = %e, "Could not execute run");
            }
        }
    }
}
