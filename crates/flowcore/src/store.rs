//! Data-access boundary for workflows, runs and step-runs.
//!
//! The engine reads and writes persisted state only through [`RunStore`].
//! Each call is atomic on its own; nothing spans a whole traversal.

use crate::{
    NodeTypeEntry, Run, RunId, RunStatus, StepRun, StoreError, Workflow, WorkflowId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or replace a workflow with its nodes and connections
    async fn insert_workflow(&self, workflow: Workflow) -> Result<(), StoreError>;

    /// Load a workflow with its current nodes and connections
    async fn load_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError>;

    async fn register_node_type(&self, entry: NodeTypeEntry) -> Result<(), StoreError>;

    async fn node_type(&self, key: &str) -> Result<Option<NodeTypeEntry>, StoreError>;

    /// Create a pending run for a workflow
    async fn create_run(&self, workflow_id: WorkflowId, input: String) -> Result<Run, StoreError>;

    async fn get_run(&self, id: RunId) -> Result<Run, StoreError>;

    /// Atomically move a pending run to running under `lease`.
    ///
    /// Fails with [`StoreError::Conflict`] if the run is not pending.
    async fn claim_run(&self, id: RunId, lease: Uuid) -> Result<Run, StoreError>;

    /// Write back a claimed run. Rejected unless `run.claimed_by` still holds
    /// the lease.
    async fn update_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Persist a new step-run and return it with its assigned id
    async fn create_step_run(&self, step: StepRun) -> Result<StepRun, StoreError>;

    async fn update_step_run(&self, step: &StepRun) -> Result<(), StoreError>;

    /// Step-runs of a run in creation order
    async fn list_step_runs(&self, run_id: RunId) -> Result<Vec<StepRun>, StoreError>;
}

#[derive(Default)]
struct Tables {
    workflows: HashMap<WorkflowId, Workflow>,
    node_types: HashMap<String, NodeTypeEntry>,
    runs: HashMap<RunId, Run>,
    step_runs: Vec<StepRun>,
    next_run_id: RunId,
}

/// In-process store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn run_not_found(id: RunId) -> StoreError {
    StoreError::NotFound {
        entity: "run",
        id: id.to_string(),
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn load_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError> {
        let tables = self.tables.read().await;
        tables
            .workflows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "workflow",
                id: id.to_string(),
            })
    }

    async fn register_node_type(&self, entry: NodeTypeEntry) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.node_types.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn node_type(&self, key: &str) -> Result<Option<NodeTypeEntry>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.node_types.get(key).cloned())
    }

    async fn create_run(&self, workflow_id: WorkflowId, input: String) -> Result<Run, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.workflows.contains_key(&workflow_id) {
            return Err(StoreError::NotFound {
                entity: "workflow",
                id: workflow_id.to_string(),
            });
        }
        tables.next_run_id += 1;
        let run = Run::new(tables.next_run_id, workflow_id, input);
        tables.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: RunId) -> Result<Run, StoreError> {
        let tables = self.tables.read().await;
        tables.runs.get(&id).cloned().ok_or_else(|| run_not_found(id))
    }

    async fn claim_run(&self, id: RunId, lease: Uuid) -> Result<Run, StoreError> {
        let mut tables = self.tables.write().await;
        let run = tables.runs.get_mut(&id).ok_or_else(|| run_not_found(id))?;
        if run.status != RunStatus::Pending {
            return Err(StoreError::Conflict {
                run_id: id,
                status: run.status,
            });
        }
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        run.claimed_by = Some(lease);
        tracing::debug!(run_id = id, %lease, "Run claimed");
        Ok(run.clone())
    }

    async fn update_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables.runs.get_mut(&run.id).ok_or_else(|| run_not_found(run.id))?;
        if stored.claimed_by != run.claimed_by {
            tracing::warn!(run_id = run.id, "Rejected update from stale lease");
            return Err(StoreError::LeaseLost(run.id));
        }
        *stored = run.clone();
        Ok(())
    }

    async fn create_step_run(&self, mut step: StepRun) -> Result<StepRun, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.runs.contains_key(&step.run_id) {
            return Err(run_not_found(step.run_id));
        }
        step.id = tables.step_runs.len() as u64 + 1;
        tables.step_runs.push(step.clone());
        Ok(step)
    }

    async fn update_step_run(&self, step: &StepRun) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .step_runs
            .iter_mut()
            .find(|s| s.id == step.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "step run",
                id: step.id.to_string(),
            })?;
        *stored = step.clone();
        Ok(())
    }

    async fn list_step_runs(&self, run_id: RunId) -> Result<Vec<StepRun>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .step_runs
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }
}
