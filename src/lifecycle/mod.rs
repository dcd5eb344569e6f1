//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration (orchestrator.rs):
//!     add_lifecycle / add_runner / add_shutdown → Registry (RwLock)
//!
//! Run (orchestrator.rs):
//!     snapshot Registry
//!     → startup.rs: start lifecycle fns in order, roll back on failure
//!     → start runners in order (runner.rs), fail fast
//!     → wait for ctx cancellation
//!     → stop runners in reverse → stop lifecycle fns in reverse → shutdown hooks
//!
//! Signal-driven (shutdown.rs, signals.rs):
//!     start() → server.start → SIGTERM/SIGINT → shutdown()
//! ```
//!
//! # Design Decisions
//! - Startup is strictly sequential in registration order
//! - Teardown is the mirror image and always exhaustive; errors are joined
//! - Teardown runs under a fresh token, so it cannot itself be cancelled
//! - Every stop is bounded by the runner's own shutdown timeout
//! - A runner start failure does not roll back anything already started

pub mod hooks;
pub mod orchestrator;
pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use hooks::{lifecycle_fn, Lifecycle, LifecycleFn, LifecycleHooks, ShutdownFn};
pub use orchestrator::{Orchestrator, Phase};
pub use runner::Runner;
pub use shutdown::{shutdown, SHUTDOWN_TIMEOUT};
pub use signals::{cancel_on_signal, serve, serve_until, wait_for_shutdown_signal};
pub use startup::start;
