use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use warden_application::BanServiceConfig;
use warden_core::AppError;

/// Minimum length accepted for `ADMIN_API_TOKEN`.
const ADMIN_TOKEN_MIN_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStoreConfig {
    Memory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub attempt_store: AttemptStoreConfig,
    pub api_host: String,
    pub api_port: u16,
    pub admin_api_token: String,
    pub cors_allowed_origin: Option<String>,
    pub ban: BanServiceConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup<F>(migrate_only: bool, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let attempt_store = match lookup("ATTEMPT_STORE")
            .unwrap_or_else(|| "postgres".to_owned())
            .as_str()
        {
            "postgres" => AttemptStoreConfig::Postgres {
                database_url: required_non_empty(&lookup, "DATABASE_URL")?,
            },
            "memory" => AttemptStoreConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "ATTEMPT_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && attempt_store == AttemptStoreConfig::Memory {
            return Err(AppError::Validation(
                "migrate requires ATTEMPT_STORE=postgres".to_owned(),
            ));
        }

        let admin_api_token = required_non_empty(&lookup, "ADMIN_API_TOKEN")?;
        if admin_api_token.len() < ADMIN_TOKEN_MIN_LENGTH {
            return Err(AppError::Validation(format!(
                "ADMIN_API_TOKEN must be at least {ADMIN_TOKEN_MIN_LENGTH} characters"
            )));
        }

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = lookup("API_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let cors_allowed_origin =
            lookup("CORS_ALLOWED_ORIGIN").filter(|value| !value.trim().is_empty());

        let ban = BanServiceConfig::from_lookup(&lookup)?;

        Ok(Self {
            migrate_only,
            attempt_store,
            api_host,
            api_port,
            admin_api_token,
            cors_allowed_origin,
            ban,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty<F>(lookup: &F, name: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use warden_domain::BanLevel;

    use super::{ApiConfig, AttemptStoreConfig};

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    fn load(settings: &[(&str, &str)]) -> Result<ApiConfig, warden_core::AppError> {
        let settings: HashMap<String, String> = settings
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        ApiConfig::from_lookup(false, |name| settings.get(name).cloned())
    }

    #[test]
    fn postgres_store_requires_database_url() {
        let result = load(&[("ADMIN_API_TOKEN", TOKEN)]);
        assert!(result.is_err());
    }

    #[test]
    fn memory_store_needs_only_admin_token() {
        let config = load(&[("ATTEMPT_STORE", "memory"), ("ADMIN_API_TOKEN", TOKEN)]);
        let Ok(config) = config else {
            panic!("memory config should load");
        };

        assert_eq!(config.attempt_store, AttemptStoreConfig::Memory);
        assert_eq!(config.api_port, 3001);
        assert_eq!(config.cors_allowed_origin, None);
        assert!(config.socket_address().is_ok());
    }

    #[test]
    fn short_admin_token_is_rejected() {
        let result = load(&[("ATTEMPT_STORE", "memory"), ("ADMIN_API_TOKEN", "short")]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_store_is_rejected() {
        let result = load(&[("ATTEMPT_STORE", "redis"), ("ADMIN_API_TOKEN", TOKEN)]);
        assert!(result.is_err());
    }

    #[test]
    fn ban_policy_overrides_are_applied() {
        let config = load(&[
            ("ATTEMPT_STORE", "memory"),
            ("ADMIN_API_TOKEN", TOKEN),
            ("BAN_LEVEL4_ATTEMPTS", "100"),
        ]);
        let Ok(config) = config else {
            panic!("config should load");
        };

        assert_eq!(config.ban.policy.threshold(BanLevel::Four).min_attempts, 100);
    }
}
