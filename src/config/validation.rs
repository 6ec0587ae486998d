//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Backend addresses must be plain `host[:port]` authorities, without duplicates
//! - Intervals, timeouts and fan-out must be non-zero
//! - Listener, admin and metrics addresses must parse
//!
//! Returns every error found, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid backend address `{0}` (expected host:port)")]
    InvalidBackend(String),

    #[error("backend `{0}` listed more than once")]
    DuplicateBackend(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid {field} `{value}`")]
    InvalidSocketAddr { field: &'static str, value: String },

    #[error("health check path `{0}` must start with '/'")]
    InvalidProbePath(String),
}

/// Check that `addr` is a bare `host[:port]` authority.
pub fn validate_backend_address(addr: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidBackend(addr.to_string());

    if addr.is_empty() || addr.contains(|c: char| c.is_whitespace() || c == '/' || c == '@') {
        return Err(invalid());
    }
    let url = Url::parse(&format!("http://{}", addr)).map_err(|_| invalid())?;
    if url.host_str().is_none() || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid());
    }
    Ok(())
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for addr in &config.backends {
        if let Err(e) = validate_backend_address(addr) {
            errors.push(e);
        } else if !seen.insert(addr.as_str()) {
            errors.push(ValidationError::DuplicateBackend(addr.clone()));
        }
    }

    let hc = &config.health_check;
    for (name, value) in [
        ("health_check.interval_secs", hc.interval_secs),
        ("health_check.recovery_interval_secs", hc.recovery_interval_secs),
        ("health_check.timeout_secs", hc.timeout_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }
    if hc.concurrency == 0 {
        errors.push(ValidationError::Zero("health_check.concurrency"));
    }
    if !hc.path.starts_with('/') {
        errors.push(ValidationError::InvalidProbePath(hc.path.clone()));
    }

    let mut check_socket = |field: &'static str, value: &str| {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidSocketAddr {
                field,
                value: value.to_string(),
            });
        }
    };
    check_socket("listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_socket("admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_socket("observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
