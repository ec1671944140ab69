//! Environment configuration for storefront services
//!
//! Every variable uses the `STOREFRONT_` prefix. The conventional unprefixed
//! names (`DATABASE_URL`, `REDIS_URL`, `PORT`) are accepted as fallbacks so the
//! service runs unchanged on hosting platforms that inject them.
//!
//! Override order: defaults < .env < process environment.
//!
//! ```no_run
//! use storefront_core::config::{load_dotenv, ConfigLoader, ServiceConfig};
//!
//! load_dotenv();
//! let service = ServiceConfig::from_env().unwrap();
//! service.validate().unwrap();
//! ```

use crate::error::StorefrontError;
use std::time::Duration;
use url::Url;

/// Load-and-validate contract shared by configuration sections
pub trait ConfigLoader: Sized {
    /// Build the section from `STOREFRONT_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` when a required variable is missing or a
    /// value cannot be parsed.
    fn from_env() -> Result<Self, StorefrontError>;

    /// Check value ranges and formats
    fn validate(&self) -> Result<(), StorefrontError>;
}

/// PostgreSQL settings for the behavior store
///
/// - `STOREFRONT_DATABASE_URL` / `DATABASE_URL` (required by `from_env`)
/// - `STOREFRONT_DATABASE_MAX_CONNECTIONS` (default: 20)
/// - `STOREFRONT_DATABASE_MIN_CONNECTIONS` (default: 2)
/// - `STOREFRONT_DATABASE_CONNECT_TIMEOUT` seconds (default: 30)
/// - `STOREFRONT_DATABASE_IDLE_TIMEOUT` seconds (default: 600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/storefront".to_string(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl DatabaseConfig {
    /// Like `from_env`, but a missing URL yields `None` instead of an error
    ///
    /// Services use this to start with the store disabled.
    pub fn from_env_optional() -> Result<Option<Self>, StorefrontError> {
        if env_var_any(&["STOREFRONT_DATABASE_URL", "DATABASE_URL"]).is_none() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, StorefrontError> {
        let url = env_var_any(&["STOREFRONT_DATABASE_URL", "DATABASE_URL"]).ok_or_else(|| {
            StorefrontError::ConfigurationError {
                message: "DATABASE_URL or STOREFRONT_DATABASE_URL must be set".to_string(),
                key: Some("STOREFRONT_DATABASE_URL".to_string()),
            }
        })?;

        let defaults = DatabaseConfig::default();
        let max_connections =
            parse_env_var("STOREFRONT_DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        let min_connections =
            parse_env_var("STOREFRONT_DATABASE_MIN_CONNECTIONS", defaults.min_connections)?;
        let connect_timeout_secs = parse_env_var("STOREFRONT_DATABASE_CONNECT_TIMEOUT", 30u64)?;
        let idle_timeout_secs = parse_env_var("STOREFRONT_DATABASE_IDLE_TIMEOUT", 600u64)?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), StorefrontError> {
        Url::parse(&self.url).map_err(|e| StorefrontError::ConfigurationError {
            message: format!("Invalid DATABASE_URL: {}", e),
            key: Some("STOREFRONT_DATABASE_URL".to_string()),
        })?;

        if self.max_connections == 0 {
            return Err(StorefrontError::ConfigurationError {
                message: "max_connections must be greater than 0".to_string(),
                key: Some("STOREFRONT_DATABASE_MAX_CONNECTIONS".to_string()),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(StorefrontError::ConfigurationError {
                message: format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                key: Some("STOREFRONT_DATABASE_MIN_CONNECTIONS".to_string()),
            });
        }

        if self.connect_timeout.is_zero() {
            return Err(StorefrontError::ConfigurationError {
                message: "connect_timeout must be greater than 0 seconds".to_string(),
                key: Some("STOREFRONT_DATABASE_CONNECT_TIMEOUT".to_string()),
            });
        }

        Ok(())
    }
}

/// Redis settings for the recommendation cache
///
/// - `STOREFRONT_REDIS_URL` / `REDIS_URL`
/// - `STOREFRONT_REDIS_KEY_PREFIX` (default: "recs")
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Namespace prepended to every cache key
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            key_prefix: "recs".to_string(),
        }
    }
}

impl RedisConfig {
    pub fn from_env_optional() -> Result<Option<Self>, StorefrontError> {
        if env_var_any(&["STOREFRONT_REDIS_URL", "REDIS_URL"]).is_none() {
            return Ok(None);
        }
        Self::from_env().map(Some)
    }
}

impl ConfigLoader for RedisConfig {
    fn from_env() -> Result<Self, StorefrontError> {
        let url = env_var_any(&["STOREFRONT_REDIS_URL", "REDIS_URL"]).ok_or_else(|| {
            StorefrontError::ConfigurationError {
                message: "REDIS_URL or STOREFRONT_REDIS_URL must be set".to_string(),
                key: Some("STOREFRONT_REDIS_URL".to_string()),
            }
        })?;

        let key_prefix = std::env::var("STOREFRONT_REDIS_KEY_PREFIX")
            .unwrap_or_else(|_| RedisConfig::default().key_prefix);

        Ok(Self { url, key_prefix })
    }

    fn validate(&self) -> Result<(), StorefrontError> {
        Url::parse(&self.url).map_err(|e| StorefrontError::ConfigurationError {
            message: format!("Invalid REDIS_URL: {}", e),
            key: Some("STOREFRONT_REDIS_URL".to_string()),
        })?;

        if self.key_prefix.is_empty() {
            return Err(StorefrontError::ConfigurationError {
                message: "key_prefix must not be empty".to_string(),
                key: Some("STOREFRONT_REDIS_KEY_PREFIX".to_string()),
            });
        }

        Ok(())
    }
}

/// HTTP service settings
///
/// - `STOREFRONT_SERVICE_HOST` / `HOST` (default: "0.0.0.0")
/// - `STOREFRONT_SERVICE_PORT` / `PORT` (default: 8090)
/// - `STOREFRONT_SERVICE_WORKERS` (default: CPU count)
/// - `STOREFRONT_SERVICE_LOG_LEVEL` / `RUST_LOG` (default: "info")
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            workers: num_cpus::get(),
            log_level: "info".to_string(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, StorefrontError> {
        let defaults = ServiceConfig::default();

        let host = env_var_any(&["STOREFRONT_SERVICE_HOST", "HOST"]).unwrap_or(defaults.host);

        let port = if std::env::var("STOREFRONT_SERVICE_PORT").is_ok() {
            parse_env_var("STOREFRONT_SERVICE_PORT", defaults.port)?
        } else {
            parse_env_var("PORT", defaults.port)?
        };

        let workers = parse_env_var("STOREFRONT_SERVICE_WORKERS", defaults.workers)?;

        let log_level =
            env_var_any(&["STOREFRONT_SERVICE_LOG_LEVEL", "RUST_LOG"]).unwrap_or(defaults.log_level);

        Ok(Self {
            host,
            port,
            workers,
            log_level,
        })
    }

    fn validate(&self) -> Result<(), StorefrontError> {
        if self.port == 0 {
            return Err(StorefrontError::ConfigurationError {
                message: "port must be greater than 0".to_string(),
                key: Some("STOREFRONT_SERVICE_PORT".to_string()),
            });
        }

        if self.workers == 0 {
            return Err(StorefrontError::ConfigurationError {
                message: "workers must be greater than 0".to_string(),
                key: Some("STOREFRONT_SERVICE_WORKERS".to_string()),
            });
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(StorefrontError::ConfigurationError {
                message: format!(
                    "Invalid log_level '{}'. Must be one of: {}",
                    self.log_level,
                    valid_log_levels.join(", ")
                ),
                key: Some("STOREFRONT_SERVICE_LOG_LEVEL".to_string()),
            });
        }

        Ok(())
    }
}

/// First non-empty value among `keys`
fn env_var_any(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_var<T>(key: &str, default: T) -> Result<T, StorefrontError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| StorefrontError::ConfigurationError {
                message: format!("Failed to parse {}: {}", key, e),
                key: Some(key.to_string()),
            }),
        Err(_) => Ok(default),
    }
}

/// Load `.env` if present; a missing file is not an error
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
