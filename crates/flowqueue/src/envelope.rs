use crate::QueueError;
use flowcore::RunId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Task type that triggers execution of a run
pub const TASK_EXECUTE_WORKFLOW: &str = "execute_workflow";

/// One unit on the queue: a task type and its opaque payload.
///
/// The payload is kept as raw JSON so it is forwarded byte for byte and only
/// decoded by the handler of its task type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_type: String,
    pub payload: Box<RawValue>,
}

impl TaskEnvelope {
    pub fn new<T: Serialize>(task_type: impl Into<String>, payload: &T) -> Result<Self, QueueError> {
        let payload = serde_json::value::to_raw_value(payload).map_err(QueueError::Serialization)?;
        Ok(Self {
            task_type: task_type.into(),
            payload,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(QueueError::Serialization)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
        serde_json::from_slice(bytes).map_err(QueueError::Deserialization)
    }

    /// Decode the payload as the type its handler expects
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        serde_json::from_str(self.payload.get()).map_err(QueueError::Deserialization)
    }
}

/// Payload of an `execute_workflow` task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteWorkflowPayload {
    pub execution_id: RunId,
}
