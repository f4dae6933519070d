//! Repositories: sqlx-backed CRUD over the weir tables.

pub mod config;
pub mod execution;
pub mod workflow;

pub use config::ConfigRepository;
pub use execution::ExecutionRepository;
pub use workflow::WorkflowRepository;

use sqlx::PgPool;

use crate::error::DbError;

/// Bundle of all repositories over one connection pool.
#[derive(Clone)]
pub struct DbContext {
    pool: PgPool,
    pub workflows: WorkflowRepository,
    pub executions: ExecutionRepository,
    pub configs: ConfigRepository,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self {
            workflows: WorkflowRepository::new(pool.clone()),
            executions: ExecutionRepository::new(pool.clone()),
            configs: ConfigRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
