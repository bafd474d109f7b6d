//! Configuration validation

use crate::{AppConfig, ConfigError, Result};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration, reporting every problem
/// in a single error
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Logging
    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    // Provider
    if let Err(e) = validate_url(&config.provider.base_url) {
        errors.push(ValidationError::new("provider.base_url", e));
    }

    if config.provider.api_key_header.trim().is_empty() {
        errors.push(ValidationError::new(
            "provider.api_key_header",
            "header name is required",
        ));
    }

    if config.provider.api_key.trim().is_empty() && !config.environment.is_local() {
        errors.push(ValidationError::new(
            "provider.api_key",
            "API key is required outside the local environment",
        ));
    }

    require_positive(
        &mut errors,
        "provider.request_timeout_ms",
        config.provider.request_timeout_ms,
    );

    // Quote negotiation
    require_positive(&mut errors, "quote.timeout_ms", config.quote.timeout_ms);
    require_positive(&mut errors, "quote.debounce_ms", config.quote.debounce_ms);
    require_positive(
        &mut errors,
        "quote.bounds_ttl_secs",
        config.quote.bounds_ttl_secs,
    );

    if config.quote.debounce_ms >= config.quote.timeout_ms {
        errors.push(ValidationError::new(
            "quote.debounce_ms",
            format!(
                "must be below quote.timeout_ms ({} >= {})",
                config.quote.debounce_ms, config.quote.timeout_ms
            ),
        ));
    }

    // Status tracking
    require_positive(
        &mut errors,
        "tracking.poll_interval_secs",
        config.tracking.poll_interval_secs,
    );
    require_positive(
        &mut errors,
        "tracking.transient_failure_threshold",
        u64::from(config.tracking.transient_failure_threshold),
    );

    // Storage
    if let Some(path) = &config.storage.rate_lock_db {
        if path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.rate_lock_db",
                "path cannot be empty; omit it to keep the lock in memory",
            ));
        }
    }

    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

fn require_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than 0"));
    }
}

/// Validate a URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err("URL must start with http:// or https://".to_string());
    }

    Ok(())
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
