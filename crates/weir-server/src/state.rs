//! Shared application state.

use std::sync::Arc;

use weir_core::{Engine, MemoryConfigStore, MemoryJournal, MemoryWorkflowStore};
use weir_db::{DbConfig, DbContext, PgConfigStore, PgJournal, PgWorkflowStore};

/// State handed to every handler: the engine bundles the stores, the
/// journal, and the executor registry.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

impl AppState {
    /// Fully in-memory state: workflows, configs, and the journal all live
    /// in process. Used when no database is configured, and by tests.
    pub fn in_memory() -> Self {
        let engine = Engine::new(
            Arc::new(MemoryWorkflowStore::new()),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(MemoryJournal::new()),
        );
        Self { engine }
    }

    /// PostgreSQL-backed state: runs migrations and loads stored custom
    /// executor definitions into the registry.
    pub async fn postgres(config: DbConfig) -> anyhow::Result<Self> {
        let pool = config.connect().await?;
        let db = DbContext::new(pool);
        db.migrate().await?;

        let engine = Engine::new(
            Arc::new(PgWorkflowStore::new(db.workflows.clone())),
            Arc::new(PgConfigStore::new(db.configs.clone())),
            Arc::new(PgJournal::new(db.executions.clone())),
        );

        for entity in db.workflows.list_custom_executors().await? {
            engine.registry().register_custom(entity.into());
        }

        Ok(Self { engine })
    }
}
