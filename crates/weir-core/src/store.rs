//! Storage interfaces for workflows and config variable sets.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use weir_workflow::Workflow;

use crate::error::EngineError;

/// Workflow storage. The engine reads from it to resolve sub-workflows and
/// custom executors; the service layer also writes through it.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, EngineError>;

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), EngineError>;

    async fn delete_workflow(&self, id: &str) -> Result<bool, EngineError>;

    async fn list_workflows(&self) -> Result<Vec<Workflow>, EngineError>;
}

/// A named set of config variables. The chosen set is snapshotted onto the
/// execution before traversal and never re-read mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConfigSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>, variables: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            variables,
            created_at: Some(Utc::now()),
        }
    }
}

/// Storage for config variable sets.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, id: &str) -> Result<Option<ConfigSet>, EngineError>;

    async fn save_config(&self, config: &ConfigSet) -> Result<(), EngineError>;

    async fn delete_config(&self, id: &str) -> Result<bool, EngineError>;

    async fn list_configs(&self) -> Result<Vec<ConfigSet>, EngineError>;
}

/// In-memory workflow storage for tests and dry-run setups.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, EngineError> {
        Ok(self.workflows.read().await.get(id).cloned())
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), EngineError> {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn delete_workflow(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.workflows.write().await.remove(id).is_some())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, EngineError> {
        Ok(self.workflows.read().await.values().cloned().collect())
    }
}

/// In-memory config storage.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: RwLock<HashMap<String, ConfigSet>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self, id: &str) -> Result<Option<ConfigSet>, EngineError> {
        Ok(self.configs.read().await.get(id).cloned())
    }

    async fn save_config(&self, config: &ConfigSet) -> Result<(), EngineError> {
        self.configs
            .write()
            .await
            .insert(config.id.clone(), config.clone());
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.configs.write().await.remove(id).is_some())
    }

    async fn list_configs(&self) -> Result<Vec<ConfigSet>, EngineError> {
        Ok(self.configs.read().await.values().cloned().collect())
    }
}
