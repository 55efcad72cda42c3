//! Task hand-off between the submission side and the workers
//!
//! A queue is named and FIFO. Each entry is one serialized task envelope;
//! a dequeue removes at most one entry, so every envelope reaches exactly
//! one consumer.

mod envelope;
mod memory;

pub use envelope::{ExecuteWorkflowPayload, TaskEnvelope, TASK_EXECUTE_WORKFLOW};
pub use memory::MemoryQueue;

use async_trait::async_trait;
use flowcore::RunId;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Queue name used when none is configured
pub const DEFAULT_QUEUE: &str = "workflow_tasks";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to serialize task: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Failed to deserialize task: {0}")]
    Deserialization(#[source] serde_json::Error),
}

/// Transport holding the raw envelopes of named queues
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Append one entry to the tail of `queue`
    async fn push(&self, queue: &str, entry: Vec<u8>) -> Result<(), QueueError>;

    /// Remove the head of `queue`, waiting up to `timeout` for one to arrive
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<Vec<u8>>, QueueError>;
}

/// Typed client over a queue backend
#[derive(Clone)]
pub struct TaskQueue {
    backend: Arc<dyn QueueBackend>,
}

impl TaskQueue {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Serialize `payload` under `task_type` and append it to `queue`
    pub async fn enqueue<T: Serialize>(
        &self,
        queue: &str,
        task_type: &str,
        payload: &T,
    ) -> Result<(), QueueError> {
        let envelope = TaskEnvelope::new(task_type, payload)?;
        self.enqueue_envelope(queue, &envelope).await
    }

    pub async fn enqueue_envelope(
        &self,
        queue: &str,
        envelope: &TaskEnvelope,
    ) -> Result<(), QueueError> {
        let bytes = envelope.encode()?;
        self.backend.push(queue, bytes).await?;
        tracing::debug!(queue, task_type = %envelope.task_type, "Task enqueued");
        Ok(())
    }

    /// Trigger execution of a pending run
    pub async fn enqueue_run(&self, queue: &str, run_id: RunId) -> Result<(), QueueError> {
        self.enqueue(
            queue,
            TASK_EXECUTE_WORKFLOW,
            &ExecuteWorkflowPayload {
                execution_id: run_id,
            },
        )
        .await
    }

    /// Next envelope of `queue`, or `None` when nothing arrives within `timeout`
    pub async fn dequeue(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<TaskEnvelope>, QueueError> {
        match self.backend.pop(queue, timeout).await? {
            Some(bytes) => TaskEnvelope::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }
}
