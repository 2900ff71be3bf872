//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (the loader handles presence and parsing)
//! - Validate value ranges (ports non-zero, at least one attempt, pool non-empty)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
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

impl std::error::Error for ValidationError {}

/// Validate a fully-populated configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::new("listener.port", "must be non-zero"));
    }
    if config.target.port == 0 {
        errors.push(ValidationError::new("target.port", "must be non-zero"));
    }
    if !matches!(config.target.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "target.scheme",
            format!("unsupported scheme {:?}", config.target.scheme),
        ));
    } else if let Err(e) = config.target.base_url() {
        errors.push(ValidationError::new("target.host", e.to_string()));
    }
    if config.auth.max_retries == 0 {
        errors.push(ValidationError::new(
            "auth.max_retries",
            "at least one authentication attempt is required",
        ));
    }
    if config.buffers.pool_size == 0 {
        errors.push(ValidationError::new(
            "buffers.pool_size",
            "pool must hold at least one buffer",
        ));
    }
    if config.timeouts.response_ms == 0 {
        errors.push(ValidationError::new("timeouts.response_ms", "must be non-zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
