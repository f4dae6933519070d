//! Execution journal: persistence of execution and node-execution records.
//!
//! The engine works against this interface with two backings: a durable
//! store (weir-db) and the request-scoped in-memory journal used for
//! dry-run executions.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use weir_workflow::{Execution, NodeExecution};

use crate::error::EngineError;

/// Persistence contract consumed by the engine.
///
/// Status writes are single-record updates; a `running` write always
/// precedes the corresponding terminal write for the same record.
#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    /// Persist a freshly created (pending) execution.
    async fn create_execution(&self, execution: &Execution) -> Result<(), EngineError>;

    /// Transition an execution to `running`.
    async fn mark_execution_running(&self, id: &str) -> Result<(), EngineError>;

    /// Transition an execution to `completed` with its result.
    async fn complete_execution(&self, id: &str, result: &Value) -> Result<(), EngineError>;

    /// Transition an execution to `failed` with an error message.
    async fn fail_execution(&self, id: &str, error: &str) -> Result<(), EngineError>;

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>, EngineError>;

    /// Executions of one workflow, most recent first.
    async fn list_executions_for_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<Execution>, EngineError>;

    /// Persist a freshly created (running) node execution.
    async fn create_node_execution(&self, record: &NodeExecution) -> Result<(), EngineError>;

    async fn complete_node_execution(&self, id: &str, output: &Value) -> Result<(), EngineError>;

    async fn fail_node_execution(&self, id: &str, error: &str) -> Result<(), EngineError>;

    /// Node executions of one execution in creation order.
    async fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<NodeExecution>, EngineError>;
}

/// In-memory journal. Lives inside one request scope for dry-run
/// executions and backs the engine's tests.
#[derive(Default)]
pub struct MemoryJournal {
    executions: RwLock<HashMap<String, Execution>>,
    node_executions: RwLock<Vec<NodeExecution>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionJournal for MemoryJournal {
    async fn create_execution(&self, execution: &Execution) -> Result<(), EngineError> {
        self.executions
            .write()
            .await
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn mark_execution_running(&self, id: &str) -> Result<(), EngineError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| EngineError::Journal(format!("unknown execution: {id}")))?;
        execution.start();
        Ok(())
    }

    async fn complete_execution(&self, id: &str, result: &Value) -> Result<(), EngineError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| EngineError::Journal(format!("unknown execution: {id}")))?;
        execution.complete(result.clone());
        Ok(())
    }

    async fn fail_execution(&self, id: &str, error: &str) -> Result<(), EngineError> {
        let mut executions = self.executions.write().await;
        let execution = executions
            .get_mut(id)
            .ok_or_else(|| EngineError::Journal(format!("unknown execution: {id}")))?;
        execution.fail(error);
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>, EngineError> {
        Ok(self.executions.read().await.get(id).cloned())
    }

    async fn list_executions_for_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<Execution>, EngineError> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }

    async fn create_node_execution(&self, record: &NodeExecution) -> Result<(), EngineError> {
        self.node_executions.write().await.push(record.clone());
        Ok(())
    }

    async fn complete_node_execution(&self, id: &str, output: &Value) -> Result<(), EngineError> {
        let mut records = self.node_executions.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::Journal(format!("unknown node execution: {id}")))?;
        record.complete(output.clone());
        Ok(())
    }

    async fn fail_node_execution(&self, id: &str, error: &str) -> Result<(), EngineError> {
        let mut records = self.node_executions.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::Journal(format!("unknown node execution: {id}")))?;
        record.fail(error);
        Ok(())
    }

    async fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<NodeExecution>, EngineError> {
        Ok(self
            .node_executions
            .read()
            .await
            .iter()
            .filter(|r| r.execution_id == execution_id)
            .cloned()
            .collect())
    }
}
