//! Error types shared across storefront services

use thiserror::Error;

/// Top-level error for storefront infrastructure concerns
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        /// Environment variable or config key that caused the failure
        key: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = StorefrontError::ConfigurationError {
            message: "port must be greater than 0".to_string(),
            key: Some("STOREFRONT_SERVICE_PORT".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: port must be greater than 0"
        );
    }
}
