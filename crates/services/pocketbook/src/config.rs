//! PocketBook configuration.

use std::env;
use std::str::FromStr;

use common::{DatabaseConfig, ServiceConfig};

pub const SERVICE_NAME: &str = "pocketbook";

/// PocketBook configuration.
#[derive(Debug, Clone)]
pub struct PocketBookConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
}

impl PocketBookConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = DatabaseConfig::default();

        Self {
            service: ServiceConfig {
                service_name: SERVICE_NAME.to_string(),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("POCKETBOOK_DATABASE_URL")
                    .or_else(|_| env::var("DATABASE_URL"))
                    .unwrap_or(defaults.url),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(defaults.max_connections),
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(defaults.min_connections),
                sql_logging: parse_var("DATABASE_SQL_LOGGING").unwrap_or(defaults.sql_logging),
            },
        }
    }
}

impl Default for PocketBookConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                service_name: SERVICE_NAME.to_string(),
                ..ServiceConfig::default()
            },
            database: DatabaseConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
