//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Detect HTTP and gRPC claiming the same port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;
use crate::net::{normalize_port, DEFAULT_PORT};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `http.port`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
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

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let http_port = check_port(&config.http.port, DEFAULT_PORT, "http.port", &mut errors);
    let grpc_port = check_port(&config.grpc.port, ":50051", "grpc.port", &mut errors);

    if config.http.enabled && config.grpc.enabled {
        if let (Some(http), Some(grpc)) = (http_port, grpc_port) {
            if http == grpc && http != 0 {
                errors.push(ValidationError::new(
                    "grpc.port",
                    format!("port {} is already used by http", grpc),
                ));
            }
        }
    }

    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "http.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.shutdown.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "shutdown.timeout_ms",
            "must be greater than 0",
        ));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", obs.log_level),
        ));
    }
    if !LOG_FORMATS.contains(&obs.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected \"pretty\" or \"json\", got {:?}", obs.log_format),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Parse the port number out of a port spec, recording an error if it is not one.
fn check_port(
    spec: &str,
    fallback: &str,
    field: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<u16> {
    let normalized = normalize_port(spec, fallback);
    let port = normalized
        .rsplit_once(':')
        .map(|(_, port)| port)
        .unwrap_or(normalized.as_str());

    match port.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            errors.push(ValidationError::new(
                field,
                format!("invalid port {:?}", spec),
            ));
            None
        }
    }
}
