//! Workflow entity: the definition stored as one JSONB document plus the
//! columns the list endpoints filter on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use weir_workflow::Workflow;

use crate::error::DbError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowEntity {
    /// Workflow id; also the id inside `definition`.
    pub id: String,

    pub name: String,

    /// Full workflow document (nodes, edges, state, bounds).
    pub definition: Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl WorkflowEntity {
    pub fn from_workflow(workflow: &Workflow) -> Result<Self, DbError> {
        let now = Utc::now();
        Ok(Self {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            definition: serde_json::to_value(workflow)?,
            created_at: workflow.created_at.unwrap_or(now),
            updated_at: workflow.updated_at.unwrap_or(now),
        })
    }

    pub fn into_workflow(self) -> Result<Workflow, DbError> {
        let mut workflow: Workflow = serde_json::from_value(self.definition)?;
        workflow.created_at = Some(self.created_at);
        workflow.updated_at = Some(self.updated_at);
        Ok(workflow)
    }
}

/// Custom executor record: a workflow published under an executor type.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomExecutorEntity {
    /// Executor type string; primary key.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,

    pub source_workflow_id: String,

    pub config_schema: Option<Value>,

    pub created_at: DateTime<Utc>,
}

impl From<CustomExecutorEntity> for weir_core::CustomExecutorDef {
    fn from(entity: CustomExecutorEntity) -> Self {
        Self {
            kind: entity.kind,
            source_workflow_id: entity.source_workflow_id,
            config_schema: entity.config_schema,
        }
    }
}
