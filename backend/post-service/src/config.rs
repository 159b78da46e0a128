/// Configuration management for Post Service
///
/// Loads configuration from environment variables. Call `dotenvy::dotenv()`
/// first to pick up a local `.env` file.
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::cascade::CascadeScope;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Document store configuration
    pub database: DatabaseConfig,
    /// Feed query limits
    pub feed: FeedConfig,
    /// Post deletion behaviour
    pub delete: DeleteConfig,
    /// Log output settings
    pub log: LogConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub port: u16,
}

/// Which `EntityStore` implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!("unknown store backend '{}'", other)),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// Connection string, required for the mongo backend
    pub url: String,
    /// Database name
    pub name: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Min connections in pool
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Days before today admitted by the public feed
    pub public_window_days: u32,
    /// Largest page size a caller may request
    pub max_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteConfig {
    pub cascade_scope: CascadeScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

// Default values
fn default_port() -> u16 {
    8082
}

fn default_database_name() -> String {
    "Post".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_public_window_days() -> u32 {
    3
}

fn default_max_limit() -> u64 {
    100
}

/// Read `key`, falling back to `default` when unset. A set but unparsable
/// value is an error.
fn env_or<T>(key: &str, default: impl FnOnce() -> T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        Err(_) => Ok(default()),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("POST_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("POST_SERVICE_PORT", default_port)?,
        };

        let backend: StoreBackend = env_or("STORE_BACKEND", || StoreBackend::Mongo)?;
        let url = match (backend, std::env::var("DATABASE_URL")) {
            (_, Ok(url)) => url,
            (StoreBackend::Memory, Err(_)) => String::new(),
            (StoreBackend::Mongo, Err(_)) => {
                bail!("DATABASE_URL environment variable not set")
            }
        };

        let database = DatabaseConfig {
            backend,
            url,
            name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| default_database_name()),
            max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", default_min_connections)?,
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", default_connect_timeout_secs)?,
        };
        if database.min_connections > database.max_connections {
            bail!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                database.min_connections,
                database.max_connections
            );
        }

        let feed = FeedConfig {
            public_window_days: env_or("FEED_PUBLIC_WINDOW_DAYS", default_public_window_days)?,
            max_limit: env_or("FEED_MAX_LIMIT", default_max_limit)?,
        };
        if feed.max_limit == 0 {
            bail!("FEED_MAX_LIMIT must be greater than zero");
        }

        let delete = DeleteConfig {
            cascade_scope: env_or("DELETE_CASCADE_SCOPE", CascadeScope::default)?,
        };

        let log = LogConfig {
            json: std::env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        Ok(Config {
            app,
            database,
            feed,
            delete,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 12] = [
        "APP_ENV",
        "POST_SERVICE_HOST",
        "POST_SERVICE_PORT",
        "STORE_BACKEND",
        "DATABASE_URL",
        "DATABASE_NAME",
        "DB_MAX_CONNECTIONS",
        "DB_MIN_CONNECTIONS",
        "DB_CONNECT_TIMEOUT_SECS",
        "FEED_PUBLIC_WINDOW_DAYS",
        "FEED_MAX_LIMIT",
        "DELETE_CASCADE_SCOPE",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
        std::env::remove_var("LOG_FORMAT");
    }

    #[test]
    #[serial]
    fn test_default_values() {
        clear_env();
        std::env::set_var("DATABASE_URL", "mongodb://localhost:27017");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.host, "0.0.0.0");
        assert_eq!(config.app.port, 8082);
        assert_eq!(config.database.backend, StoreBackend::Mongo);
        assert_eq!(config.database.name, "Post");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.database.connect_timeout_secs, 30);
        assert_eq!(config.feed.public_window_days, 3);
        assert_eq!(config.feed.max_limit, 100);
        assert_eq!(config.delete.cascade_scope, CascadeScope::Split);
        assert!(!config.log.json);

        clear_env();
    }

    #[test]
    #[serial]
    fn mongo_backend_requires_database_url() {
        clear_env();
        assert!(Config::from_env().is_err());

        std::env::set_var("STORE_BACKEND", "memory");
        let config = Config::from_env().unwrap();
        assert_eq!(config.database.backend, StoreBackend::Memory);

        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        clear_env();
        std::env::set_var("STORE_BACKEND", "memory");

        std::env::set_var("POST_SERVICE_PORT", "eighty");
        assert!(Config::from_env().is_err());
        std::env::remove_var("POST_SERVICE_PORT");

        std::env::set_var("DELETE_CASCADE_SCOPE", "partial");
        assert!(Config::from_env().is_err());

        std::env::set_var("DELETE_CASCADE_SCOPE", "atomic");
        assert_eq!(
            Config::from_env().unwrap().delete.cascade_scope,
            CascadeScope::Atomic
        );

        clear_env();
    }
}
