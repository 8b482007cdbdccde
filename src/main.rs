use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use crmserver::core::config::{AppConfig, StorageBackend};
use crmserver::core::shared::state::AppState;
use crmserver::core::shared::utils::{create_conn, run_migrations};
use crmserver::core::storage::{CrmStore, MemoryStore, PgStore};
use crmserver::main_module::run_axum_server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return Err(std::io::Error::other(e));
        }
    };

    let store: Arc<dyn CrmStore> = match &config.database.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres { url } => {
            let pool = create_conn(url, config.database.max_connections).map_err(|e| {
                error!("Failed to create database pool: {e}");
                std::io::Error::other(e)
            })?;
            let migration_pool = pool.clone();
            tokio::task::spawn_blocking(move || run_migrations(&migration_pool))
                .await
                .map_err(std::io::Error::other)?
                .map_err(|e| {
                    error!("Failed to run migrations: {e}");
                    std::io::Error::other(e)
                })?;
            info!("Connected to PostgreSQL");
            Arc::new(PgStore::new(pool))
        }
    };

    if !config.auth.required {
        info!("AUTH_REQUIRED is off; API routes are open");
    }

    let state = Arc::new(AppState::from_config(store, config));
    info!("Starting crmserver {}", env!("CARGO_PKG_VERSION"));
    run_axum_server(state).await
}
