use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::browser_session::BrowserSessionRepository;
use crate::database::memory_repository::InMemoryRepository;
use crate::database::postgres_repository::PostgresRepository;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

/// Repository handle kept in Rocket managed state.
pub type SharedRepository = Arc<dyn BrowserSessionRepository>;

async fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_config.url)
        .await
}

pub fn stage_db(db_config: DatabaseConfig) -> AdHoc {
    AdHoc::try_on_ignite("Browser session storage", |rocket| async move {
        match db_config.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; records are lost on shutdown");
                let repo: SharedRepository = Arc::new(InMemoryRepository::new());
                Ok(rocket.manage(repo))
            }
            StorageBackend::Postgres => match init_pool(&db_config).await {
                Ok(pool) => {
                    tracing::info!("Database pool initialized successfully");
                    let repo: SharedRepository = Arc::new(PostgresRepository { pool });
                    Ok(rocket.manage(repo))
                }
                Err(e) => {
                    tracing::error!("Failed to initialize database pool: {}", e);
                    Err(rocket)
                }
            },
        }
    })
}
