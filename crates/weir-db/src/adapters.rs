//! Adapters exposing the repositories through the `weir-core` engine
//! interfaces: the durable journal, the workflow store, and the config
//! store.

use async_trait::async_trait;
use serde_json::Value;
use weir_core::{ConfigSet, ConfigStore, EngineError, ExecutionJournal, WorkflowStore};
use weir_workflow::{Execution, NodeExecution, Workflow};

use crate::repositories::{ConfigRepository, ExecutionRepository, WorkflowRepository};

/// Durable journal backed by PostgreSQL.
#[derive(Clone)]
pub struct PgJournal {
    executions: ExecutionRepository,
}

impl PgJournal {
    pub fn new(executions: ExecutionRepository) -> Self {
        Self { executions }
    }
}

#[async_trait]
impl ExecutionJournal for PgJournal {
    async fn create_execution(&self, execution: &Execution) -> Result<(), EngineError> {
        Ok(self.executions.create(execution).await?)
    }

    async fn mark_execution_running(&self, id: &str) -> Result<(), EngineError> {
        Ok(self.executions.mark_running(id).await?)
    }

    async fn complete_execution(&self, id: &str, result: &Value) -> Result<(), EngineError> {
        Ok(self.executions.complete(id, result).await?)
    }

    async fn fail_execution(&self, id: &str, error: &str) -> Result<(), EngineError> {
        Ok(self.executions.fail(id, error).await?)
    }

    async fn get_execution(&self, id: &str) -> Result<Option<Execution>, EngineError> {
        Ok(self.executions.find_by_id(id).await?)
    }

    async fn list_executions_for_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<Execution>, EngineError> {
        Ok(self.executions.find_by_workflow(workflow_id, 100).await?)
    }

    async fn create_node_execution(&self, record: &NodeExecution) -> Result<(), EngineError> {
        Ok(self.executions.create_node_execution(record).await?)
    }

    async fn complete_node_execution(&self, id: &str, output: &Value) -> Result<(), EngineError> {
        Ok(self.executions.complete_node_execution(id, output).await?)
    }

    async fn fail_node_execution(&self, id: &str, error: &str) -> Result<(), EngineError> {
        Ok(self.executions.fail_node_execution(id, error).await?)
    }

    async fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<NodeExecution>, EngineError> {
        Ok(self.executions.list_node_executions(execution_id).await?)
    }
}

/// Workflow store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgWorkflowStore {
    workflows: WorkflowRepository,
}

impl PgWorkflowStore {
    pub fn new(workflows: WorkflowRepository) -> Self {
        Self { workflows }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, EngineError> {
        Ok(self.workflows.find_by_id(id).await?)
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), EngineError> {
        Ok(self.workflows.save(workflow).await?)
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.workflows.delete(id).await?)
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
        Ok(self.workflows.find_all().await?)
    }
}

/// Config store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgConfigStore {
    configs: ConfigRepository,
}

impl PgConfigStore {
    pub fn new(configs: ConfigRepository) -> Self {
        Self { configs }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn get_config(&self, id: &str) -> Result<Option<ConfigSet>, EngineError> {
        Ok(self.configs.find_by_id(id).await?)
    }

    async fn save_config(&self, config: &ConfigSet) -> Result<(), EngineError> {
        Ok(self.configs.save(config).await?)
    }

    async fn delete_config(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.configs.delete(id).await?)
    }

    async fn list_configs(&self) -> Result<Vec<ConfigSet>, EngineError> {
        Ok(self.configs.find_all().await?)
    }
}
