//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, capacities > 0, addresses parse)
//! - Check backend definitions (unique ids, parseable base URLs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::new("listener.max_concurrent_requests", "must be > 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.backend_call_secs == 0 {
        errors.push(ValidationError::new("timeouts.backend_call_secs", "must be > 0"));
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be > 0"));
    }

    if config.ip_guard.max_violations_before_block == 0 {
        errors.push(ValidationError::new("ip_guard.max_violations_before_block", "must be > 0"));
    }
    if config.ip_guard.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("ip_guard.sweep_interval_secs", "must be > 0"));
    }
    for entry in &config.ip_guard.whitelist {
        if config.ip_guard.blacklist.contains(entry) {
            errors.push(ValidationError::new(
                "ip_guard",
                format!("'{}' is both whitelisted and blacklisted", entry),
            ));
        }
    }

    for origin in &config.csrf.allowed_origins {
        if Url::parse(origin).is_err() {
            errors.push(ValidationError::new(
                "csrf.allowed_origins",
                format!("'{}' is not a valid origin", origin),
            ));
        }
    }

    if config.audit.capacity == 0 {
        errors.push(ValidationError::new("audit.capacity", "must be > 0"));
    }
    if config.audit.anomaly_window_minutes <= 0 {
        errors.push(ValidationError::new("audit.anomaly_window_minutes", "must be > 0"));
    }

    if config.limits.max_prompt_length == 0 {
        errors.push(ValidationError::new("limits.max_prompt_length", "must be > 0"));
    }
    if config.limits.max_backends_per_request == 0 {
        errors.push(ValidationError::new("limits.max_backends_per_request", "must be > 0"));
    }
    if config.limits.max_payload_length < config.limits.max_prompt_length {
        errors.push(ValidationError::new(
            "limits.max_payload_length",
            "must be >= limits.max_prompt_length",
        ));
    }

    let mut seen = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if backend.id.trim().is_empty() {
            errors.push(ValidationError::new(&field, "id must not be empty"));
        } else if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate id '{}'", backend.id)));
        }
        if Url::parse(&backend.base_url).is_err() {
            errors.push(ValidationError::new(
                &field,
                format!("base_url '{}' is not a valid URL", backend.base_url),
            ));
        }
        if backend.default_model.trim().is_empty() {
            errors.push(ValidationError::new(&field, "default_model must not be empty"));
        }
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
