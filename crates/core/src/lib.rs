//! # Storefront Core
//!
//! Shared infrastructure for storefront backend services.
//!
//! - `error`: common error type
//! - `config`: environment configuration loading and validation
//! - `database`: PostgreSQL connection pool
//! - `metrics`: Prometheus metrics collection and exposition
//! - `observability`: structured logging and span helpers

pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod observability;

pub use config::{load_dotenv, ConfigLoader, DatabaseConfig, RedisConfig, ServiceConfig};
pub use database::{DatabasePool, PoolStats};
pub use error::StorefrontError;
pub use metrics::{
    metrics_handler, record_cache_hit, record_cache_miss, record_recommendation,
    record_recommendation_fallback, MetricsMiddleware, MetricsRegistry, METRICS_REGISTRY,
};
pub use observability::{
    db_query_span, init_logging, redis_op_span, LogConfig, LogFormat, ObservabilityError,
};
