//! Configuration validation.
//!
//! Semantic checks on top of serde's syntactic ones. Returns all errors,
//! not just the first, so an operator can fix a config in one pass.

use regex::Regex;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration. Pure function: config in, errors out.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".to_string(),
            message: format!("not a valid socket address: {:?}", config.listener.bind_address),
        });
    }

    if config.upstream.address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "upstream.address".to_string(),
            message: format!("not a valid socket address: {:?}", config.upstream.address),
        });
    }

    if config.scanner.max_depth == 0 {
        errors.push(ValidationError {
            field: "scanner.max_depth".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if config.scanner.max_body_bytes == 0 {
        errors.push(ValidationError {
            field: "scanner.max_body_bytes".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    for pattern in &config.scanner.extra_value_patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError {
                field: "scanner.extra_value_patterns".to_string(),
                message: format!("invalid regex {pattern:?}: {e}"),
            });
        }
    }

    if config.admin.enabled && config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
        errors.push(ValidationError {
            field: "admin.api_key".to_string(),
            message: "placeholder key must be changed when admin is enabled".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address".to_string(),
            message: format!(
                "not a valid socket address: {:?}",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
