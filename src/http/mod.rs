//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! HttpServerRunner::start
//!     → spawn task: bind listener (net::listener) → axum::serve
//!     → bind/serve failure → serve-error slot
//!
//! HttpServerRunner::stop
//!     → trigger axum graceful shutdown
//!     → race: drained | shutdown timeout | ctx cancelled
//!     → drain serve-error slot, join with shutdown outcome
//! ```
//!
//! # Design Decisions
//! - Start never waits for the bind; bind errors surface at stop
//! - Stop is bounded (5s by default) even if a request never finishes
//! - Base routes (ping, health, readiness) come from routes.rs; health
//!   endpoints aggregate the checks in a `HealthRegistry`

pub mod routes;
pub mod server;

pub use routes::{base_router, health_router};
pub use server::HttpServerRunner;
