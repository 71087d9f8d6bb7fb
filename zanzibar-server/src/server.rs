use std::sync::Arc;

use anyhow::Result;
use zanzibar_core::repository::{InMemoryRepository, PostgresRepository, Repository};
use zanzibar_core::{AuthorizationEngine, DatabaseConfig, EngineConfig};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ZanzibarServer {
    pub engine: Arc<AuthorizationEngine>,
}

impl ZanzibarServer {
    pub fn new(repository: Arc<dyn Repository>, config: EngineConfig) -> Result<Self> {
        let engine = AuthorizationEngine::new(repository, config)?;
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    /// Server backed by a process-local store; state is lost on exit.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(InMemoryRepository::new()), config)
    }

    /// Server backed by PostgreSQL, optionally applying the bundled migrations first.
    pub async fn with_postgres(
        database: &DatabaseConfig,
        config: EngineConfig,
        migrate: bool,
    ) -> Result<Self> {
        let repository = PostgresRepository::connect(database).await?;
        if migrate {
            repository.migrate().await?;
        }
        Self::new(Arc::new(repository), config)
    }
}
