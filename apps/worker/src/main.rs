//! Warden retention worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_application::{BanService, BanServiceConfig, SystemClock};
use warden_core::{AppError, AppResult};
use warden_infrastructure::PostgresAttemptRepository;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    purge_interval_seconds: u64,
    ban: BanServiceConfig,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let ban_service = BanService::new(
        Arc::new(PostgresAttemptRepository::new(pool)),
        Arc::new(SystemClock),
        config.ban.clone(),
    );

    info!(
        purge_interval_seconds = config.purge_interval_seconds,
        retention_days = config
            .ban
            .attempt_retention
            .map(|retention| retention.num_days())
            .unwrap_or_default(),
        "warden-worker started"
    );

    loop {
        match ban_service.purge_expired_attempts().await {
            Ok(purged) => info!(purged, "retention purge completed"),
            Err(error) => warn!(error = %error, "retention purge failed"),
        }

        tokio::time::sleep(Duration::from_secs(config.purge_interval_seconds)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let purge_interval_seconds = match lookup("RETENTION_PURGE_INTERVAL_SECONDS") {
            Some(value) => value.trim().parse::<u64>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid RETENTION_PURGE_INTERVAL_SECONDS value '{value}': {error}"
                ))
            })?,
            None => 3600,
        };

        if purge_interval_seconds == 0 {
            return Err(AppError::Validation(
                "RETENTION_PURGE_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let ban = BanServiceConfig::from_lookup(&lookup)?;
        if ban.attempt_retention.is_none() {
            return Err(AppError::Validation(
                "ATTEMPT_RETENTION_DAYS is required for the retention worker".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            purge_interval_seconds,
            ban,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration;

    use super::WorkerConfig;

    fn load(settings: &[(&str, &str)]) -> Result<WorkerConfig, warden_core::AppError> {
        let settings: HashMap<String, String> = settings
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| settings.get(name).cloned())
    }

    #[test]
    fn defaults_to_hourly_purge() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("ATTEMPT_RETENTION_DAYS", "14"),
        ]);
        let Ok(config) = config else {
            panic!("worker config should load");
        };

        assert_eq!(config.purge_interval_seconds, 3600);
        assert_eq!(config.ban.attempt_retention, Some(Duration::days(14)));
    }

    #[test]
    fn retention_is_required() {
        let result = load(&[("DATABASE_URL", "postgres://localhost/warden")]);
        assert!(result.is_err());
    }

    #[test]
    fn retention_shorter_than_longest_window_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("ATTEMPT_RETENTION_DAYS", "3"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/warden"),
            ("ATTEMPT_RETENTION_DAYS", "14"),
            ("RETENTION_PURGE_INTERVAL_SECONDS", "0"),
        ]);
        assert!(result.is_err());
    }
}
