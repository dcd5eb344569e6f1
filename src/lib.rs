//! Service lifecycle orchestration library.
//!
//! Brings lifecycle components and network servers (HTTP, gRPC) up in
//! registration order, holds them until cancelled, and tears them down in
//! reverse with bounded-time forced termination.

// Core subsystems
pub mod error;
pub mod lifecycle;

// Servers
pub mod grpc;
pub mod health;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::ServiceConfig;
pub use error::{BoxError, Errors, LifecycleError, RunError, ServerError};
pub use grpc::GrpcServerRunner;
pub use health::{HealthCheck, HealthChecks, HealthRegistry, HealthReporter};
pub use http::HttpServerRunner;
pub use lifecycle::{lifecycle_fn, Lifecycle, LifecycleFn, LifecycleHooks, Orchestrator, Phase, Runner};
