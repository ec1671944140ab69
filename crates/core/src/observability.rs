//! Structured logging setup and span helpers
//!
//! Services call [`init_logging`] once at startup. Output is JSON in
//! production and human-readable otherwise; the level comes from `RUST_LOG`
//! when set, else from [`LogConfig::level`].

use thiserror::Error;
use tracing::{span, Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `json` in production (`RUST_ENV=production`), `pretty` elsewhere
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") => LogFormat::Pretty,
            _ => {
                let is_production = std::env::var("RUST_ENV")
                    .map(|e| e == "production")
                    .unwrap_or(false);
                if is_production {
                    LogFormat::Json
                } else {
                    LogFormat::Pretty
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub service_name: String,
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn new(service_name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            level: level.into(),
            format: LogFormat::from_env(),
        }
    }
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Fails when the level is not a valid filter directive or when a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), ObservabilityError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|_| ObservabilityError::InvalidFilter(config.level.clone()))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true),
            )
            .try_init(),
    }
    .map_err(|e| ObservabilityError::SubscriberInit(e.to_string()))?;

    tracing::info!(service_name = %config.service_name, "Logging initialized");
    Ok(())
}

/// Span around a SQL query against `table`
pub fn db_query_span(operation: &str, table: &str) -> Span {
    span!(
        Level::DEBUG,
        "db.query",
        db.system = "postgresql",
        db.operation = %operation,
        db.table = %table,
    )
}

/// Span around a Redis command
pub fn redis_op_span(operation: &str, key: &str) -> Span {
    span!(
        Level::DEBUG,
        "redis.command",
        db.system = "redis",
        db.operation = %operation,
        db.key = %key,
    )
}
