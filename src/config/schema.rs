//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a lifecycle-managed service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings.
    pub http: HttpConfig,

    /// gRPC server settings.
    pub grpc: GrpcConfig,

    /// Teardown settings.
    pub shutdown: ShutdownConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Register the HTTP runner at all.
    pub enabled: bool,

    /// Port spec: `"8080"`, `":8080"` or `"host:8080"`.
    pub port: String,

    /// Per-request timeout applied as middleware.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: ":8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// gRPC server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GrpcConfig {
    pub enabled: bool,

    /// Port spec, same forms as [`HttpConfig::port`].
    pub port: String,

    /// Serve the gRPC reflection service.
    pub reflection: bool,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: ":50051".to_string(),
            reflection: true,
        }
    }
}

/// Teardown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Bound on each server's graceful stop, in milliseconds.
    pub timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level; `RUST_LOG` takes precedence when set.
    pub log_level: String,

    /// `"pretty"` or `"json"`.
    pub log_format: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
