//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (poll interval > 0, parseable addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.handler.bind_address.is_empty() {
        errors.push(ValidationError::new("handler.bind_address", "must not be empty"));
    } else if config.handler.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "handler.bind_address",
            format!("'{}' is not a socket address", config.handler.bind_address),
        ));
    }

    if config.app.name.is_empty() {
        errors.push(ValidationError::new("app.name", "must not be empty"));
    }

    if config.watch.poll_interval_secs == 0 {
        errors.push(ValidationError::new("watch.poll_interval_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
