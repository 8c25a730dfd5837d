//! Warden API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use warden_application::{AttemptRepository, BanService, Clock, SystemClock};
use warden_core::AppError;
use warden_infrastructure::{InMemoryAttemptRepository, PostgresAttemptRepository};

use crate::api_config::{ApiConfig, AttemptStoreConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let repository: Arc<dyn AttemptRepository> = match &config.attempt_store {
        AttemptStoreConfig::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            Arc::new(PostgresAttemptRepository::new(pool))
        }
        AttemptStoreConfig::Memory => {
            warn!("using in-memory attempt store; bans are lost on restart and not shared");
            Arc::new(InMemoryAttemptRepository::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ban_service = BanService::new(repository, clock.clone(), config.ban.clone());

    let app_state = AppState {
        ban_service,
        clock,
        admin_api_token: Arc::from(config.admin_api_token.as_str()),
    };

    let app = api_router::build_router(app_state, config.cors_allowed_origin.as_deref())?;

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "warden-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
