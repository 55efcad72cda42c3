use crate::{NodeId, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type RunId = u64;
pub type StepRunId = u64;

/// Lifecycle of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single node execution within a run.
///
/// `Skipped` is reserved for conditional branches and never assigned by the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Input document as submitted; parsed when the run starts.
    pub input: String,
    /// Produced values keyed by node identifier
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Lease held by the worker executing this run
    pub claimed_by: Option<Uuid>,
}

impl Run {
    pub fn new(id: RunId, workflow_id: WorkflowId, input: impl Into<String>) -> Self {
        Self {
            id,
            workflow_id,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            input: input.into(),
            output: None,
            error: None,
            claimed_by: None,
        }
    }
}

/// One execution attempt of a node within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    pub id: StepRunId,
    pub run_id: RunId,
    pub node_id: NodeId,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Aggregated input delivered to the executor
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl StepRun {
    /// A step that is running as of now. The id is assigned by the store.
    pub fn start(run_id: RunId, node_id: NodeId, input: Value) -> Self {
        Self {
            id: 0,
            run_id,
            node_id,
            status: StepStatus::Running,
            started_at: Some(Utc::now()),
            completed_at: None,
            input,
            output: None,
            error: None,
        }
    }

    pub fn complete(&mut self, output: Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}
