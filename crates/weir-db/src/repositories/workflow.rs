//! Workflow repository.

use sqlx::PgPool;
use weir_workflow::Workflow;

use crate::entities::{CustomExecutorEntity, WorkflowEntity};
use crate::error::DbError;

const WORKFLOW_COLUMNS: &str = "id, name, definition, created_at, updated_at";

/// CRUD operations for stored workflows and custom executor records.
#[derive(Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Workflow>, DbError> {
        let entity = sqlx::query_as::<_, WorkflowEntity>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflow WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        entity.map(WorkflowEntity::into_workflow).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Workflow>, DbError> {
        let entities = sqlx::query_as::<_, WorkflowEntity>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflow ORDER BY updated_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        entities
            .into_iter()
            .map(WorkflowEntity::into_workflow)
            .collect()
    }

    /// Insert or replace a workflow definition.
    pub async fn save(&self, workflow: &Workflow) -> Result<(), DbError> {
        let entity = WorkflowEntity::from_workflow(workflow)?;
        sqlx::query(
            r#"
            INSERT INTO workflow (id, name, definition, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                definition = EXCLUDED.definition,
                updated_at = NOW()
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.name)
        .bind(&entity.definition)
        .bind(entity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM workflow WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Custom executors
    // =========================================================================

    pub async fn list_custom_executors(&self) -> Result<Vec<CustomExecutorEntity>, DbError> {
        let entities = sqlx::query_as::<_, CustomExecutorEntity>(
            r#"SELECT type, source_workflow_id, config_schema, created_at
               FROM custom_executor ORDER BY type"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entities)
    }

    pub async fn save_custom_executor(
        &self,
        kind: &str,
        source_workflow_id: &str,
        config_schema: Option<&serde_json::Value>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO custom_executor (type, source_workflow_id, config_schema)
            VALUES ($1, $2, $3)
            ON CONFLICT (type) DO UPDATE SET
                source_workflow_id = EXCLUDED.source_workflow_id,
                config_schema = EXCLUDED.config_schema
            "#,
        )
        .bind(kind)
        .bind(source_workflow_id)
        .bind(config_schema)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_custom_executor(&self, kind: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM custom_executor WHERE type = $1")
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
