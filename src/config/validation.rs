//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and address formats
//! - Detect half-specified TLS material
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GrappleConfig → Result<(), Vec<ValidationError>>
//! - Target URLs are only checked for presence here; scheme checks happen
//!   when the orchestrator parses them

use std::fmt;

use url::Url;

use crate::config::schema::GrappleConfig;
use crate::net::target::split_host_port;

/// A single semantic problem in a configuration.
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

pub fn validate_config(config: &GrappleConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.proxy.targets.is_empty() {
        errors.push(ValidationError::new("proxy.targets", "at least one target is required"));
    }

    if config.proxy.backend_url.is_empty() {
        errors.push(ValidationError::new("proxy.backend_url", "a default backend is required"));
    } else {
        match Url::parse(&config.proxy.backend_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "proxy.backend_url",
                format!("unsupported scheme {:?}", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("proxy.backend_url", e.to_string())),
        }
    }

    if config.proxy.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.shutdown_timeout_secs", "must be greater than zero"));
    }

    if split_host_port(&config.control.bind_address).is_none() {
        errors.push(ValidationError::new(
            "control.bind_address",
            format!("{:?} is not a host:port address", config.control.bind_address),
        ));
    }

    if !config.control.endpoint.starts_with('/') {
        errors.push(ValidationError::new("control.endpoint", "must start with '/'"));
    }

    match (&config.tls.cert_path, &config.tls.key_path) {
        (Some(_), None) => errors.push(ValidationError::new("tls.key_path", "cert_path is set but key_path is not")),
        (None, Some(_)) => errors.push(ValidationError::new("tls.cert_path", "key_path is set but cert_path is not")),
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
