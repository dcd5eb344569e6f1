//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle, runners, config loading produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are recorded unconditionally; without an installed recorder
//!   they are no-ops

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
