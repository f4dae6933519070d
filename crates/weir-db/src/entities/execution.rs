//! Execution and node-execution entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use weir_workflow::{Execution, ExecutionStatus, NodeExecution};

use crate::error::DbError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionEntity {
    pub id: String,

    pub workflow_id: String,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub parameters: Value,

    /// Config variable snapshot taken before traversal.
    pub config: Value,

    pub config_id: Option<String>,

    pub result: Option<Value>,

    pub error: Option<String>,
}

impl ExecutionEntity {
    pub fn from_execution(execution: &Execution) -> Self {
        Self {
            id: execution.id.clone(),
            workflow_id: execution.workflow_id.clone(),
            status: execution.status.as_str().to_string(),
            created_at: execution.created_at,
            completed_at: execution.completed_at,
            parameters: execution.parameters.clone(),
            config: Value::Object(execution.config.clone()),
            config_id: execution.config_id.clone(),
            result: execution.result.clone(),
            error: execution.error.clone(),
        }
    }

    pub fn into_execution(self) -> Result<Execution, DbError> {
        let status = ExecutionStatus::parse(&self.status)
            .ok_or_else(|| DbError::InvalidData(format!("unknown status: {}", self.status)))?;
        let config: Map<String, Value> = match self.config {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DbError::InvalidData(format!(
                    "config must be an object, got {other}"
                )))
            }
        };
        Ok(Execution {
            id: self.id,
            workflow_id: self.workflow_id,
            status,
            created_at: self.created_at,
            completed_at: self.completed_at,
            parameters: self.parameters,
            config,
            config_id: self.config_id,
            result: self.result,
            error: self.error,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionEntity {
    pub id: String,

    pub execution_id: String,

    pub node_id: String,

    pub status: String,

    pub output: Option<Value>,

    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeExecutionEntity {
    pub fn from_node_execution(record: &NodeExecution) -> Self {
        Self {
            id: record.id.clone(),
            execution_id: record.execution_id.clone(),
            node_id: record.node_id.clone(),
            status: record.status.as_str().to_string(),
            output: record.output.clone(),
            error: record.error.clone(),
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }

    pub fn into_node_execution(self) -> Result<NodeExecution, DbError> {
        let status = ExecutionStatus::parse(&self.status)
            .ok_or_else(|| DbError::InvalidData(format!("unknown status: {}", self.status)))?;
        Ok(NodeExecution {
            id: self.id,
            execution_id: self.execution_id,
            node_id: self.node_id,
            status,
            output: self.output,
            error: self.error,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}
