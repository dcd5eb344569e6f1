//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator::add_health_check / add_health_reporter
//!     → registry.rs (named liveness and readiness checks)
//!
//! GET /healthz, /livez, /readyz (http/routes.rs)
//!     → snapshot the checks for that endpoint
//!     → run them concurrently
//!     → HealthResponse, 503 if any check failed
//! ```
//!
//! # Design Decisions
//! - Checks are keyed by name; registering a name again replaces the check
//! - Readiness also requires the orchestrator to be running
//! - Checks run on request, nothing is cached between requests

pub mod registry;

pub use registry::{
    health_ok, HealthCheck, HealthChecks, HealthRegistry, HealthReporter, HealthResult,
    HealthResponse,
};
