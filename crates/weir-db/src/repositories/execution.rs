//! Execution repository: lifecycle writes for execution and node-execution
//! records. Status transitions are single-row updates so readers never see
//! a partially-updated record.

use serde_json::Value;
use sqlx::PgPool;
use weir_workflow::{Execution, NodeExecution};

use crate::entities::{ExecutionEntity, NodeExecutionEntity};
use crate::error::DbError;

const EXECUTION_COLUMNS: &str = "id, workflow_id, status, created_at, completed_at, parameters, \
                                 config, config_id, result, error";

const NODE_EXECUTION_COLUMNS: &str =
    "id, execution_id, node_id, status, output, error, created_at, completed_at";

#[derive(Clone)]
pub struct ExecutionRepository {
    pool: PgPool,
}

impl ExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, execution: &Execution) -> Result<(), DbError> {
        let entity = ExecutionEntity::from_execution(execution);
        sqlx::query(
            r#"
            INSERT INTO execution (id, workflow_id, status, created_at, parameters, config, config_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.workflow_id)
        .bind(&entity.status)
        .bind(entity.created_at)
        .bind(&entity.parameters)
        .bind(&entity.config)
        .bind(&entity.config_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Execution>, DbError> {
        let entity = sqlx::query_as::<_, ExecutionEntity>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM execution WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        entity.map(ExecutionEntity::into_execution).transpose()
    }

    pub async fn find_by_workflow(
        &self,
        workflow_id: &str,
        limit: i64,
    ) -> Result<Vec<Execution>, DbError> {
        let entities = sqlx::query_as::<_, ExecutionEntity>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM execution
             WHERE workflow_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(workflow_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        entities
            .into_iter()
            .map(ExecutionEntity::into_execution)
            .collect()
    }

    pub async fn mark_running(&self, id: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE execution SET status = 'running' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn complete(&self, id: &str, result_value: &Value) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE execution SET status = 'completed', result = $2, completed_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(result_value)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn fail(&self, id: &str, error: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE execution SET status = 'failed', error = $2, completed_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Node executions
    // =========================================================================

    pub async fn create_node_execution(&self, record: &NodeExecution) -> Result<(), DbError> {
        let entity = NodeExecutionEntity::from_node_execution(record);
        sqlx::query(
            r#"
            INSERT INTO node_execution (id, execution_id, node_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.execution_id)
        .bind(&entity.node_id)
        .bind(&entity.status)
        .bind(entity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete_node_execution(&self, id: &str, output: &Value) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE node_execution SET status = 'completed', output = $2, completed_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(output)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn fail_node_execution(&self, id: &str, error: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE node_execution SET status = 'failed', error = $2, completed_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Node executions of one execution in creation order.
    pub async fn list_node_executions(
        &self,
        execution_id: &str,
    ) -> Result<Vec<NodeExecution>, DbError> {
        let entities = sqlx::query_as::<_, NodeExecutionEntity>(&format!(
            "SELECT {NODE_EXECUTION_COLUMNS} FROM node_execution
             WHERE execution_id = $1 ORDER BY seq"
        ))
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;
        entities
            .into_iter()
            .map(NodeExecutionEntity::into_node_execution)
            .collect()
    }
}
