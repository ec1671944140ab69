//! Recommendation engine error taxonomy
//!
//! Errors never reach callers of `generate_recommendations`; the engine
//! converts every variant into the fallback response. The variant decides
//! the `reason` label recorded on the fallback metric.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("{strategy} recommendations require {field}")]
    MissingField {
        field: &'static str,
        strategy: String,
    },

    #[error("Unsupported recommendation type: {0}")]
    UnsupportedType(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Behavior store error: {0}")]
    Store(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Behavior store is not configured")]
    StoreDisabled,

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl RecommendationError {
    /// Metric label for the fallback this error triggers
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            RecommendationError::MissingField { .. } => "missing_field",
            RecommendationError::UnsupportedType(_) => "unsupported_type",
            RecommendationError::ProductNotFound(_) => "product_not_found",
            RecommendationError::Store(_) => "store_error",
            RecommendationError::Catalog(_) => "catalog_error",
            RecommendationError::Cache(_) => "cache_error",
            RecommendationError::Serialization(_) => "serialization_error",
            RecommendationError::StoreDisabled => "store_disabled",
            RecommendationError::Timeout { .. } => "timeout",
        }
    }
}

impl From<sqlx::Error> for RecommendationError {
    fn from(err: sqlx::Error) -> Self {
        RecommendationError::Store(err.to_string())
    }
}

impl From<redis::RedisError> for RecommendationError {
    fn from(err: redis::RedisError) -> Self {
        RecommendationError::Cache(err.to_string())
    }
}

impl From<reqwest::Error> for RecommendationError {
    fn from(err: reqwest::Error) -> Self {
        RecommendationError::Catalog(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecommendationError>;
