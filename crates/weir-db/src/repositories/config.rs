//! Config repository.

use sqlx::PgPool;
use weir_core::ConfigSet;

use crate::entities::ConfigEntity;
use crate::error::DbError;

const CONFIG_COLUMNS: &str = "id, name, variables, created_at";

#[derive(Clone)]
pub struct ConfigRepository {
    pool: PgPool,
}

impl ConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ConfigSet>, DbError> {
        let entity = sqlx::query_as::<_, ConfigEntity>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM config WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        entity.map(ConfigEntity::into_config).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<ConfigSet>, DbError> {
        let entities = sqlx::query_as::<_, ConfigEntity>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM config ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        entities.into_iter().map(ConfigEntity::into_config).collect()
    }

    pub async fn save(&self, config: &ConfigSet) -> Result<(), DbError> {
        let entity = ConfigEntity::from_config(config);
        sqlx::query(
            r#"
            INSERT INTO config (id, name, variables, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                variables = EXCLUDED.variables
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.name)
        .bind(&entity.variables)
        .bind(entity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM config WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
