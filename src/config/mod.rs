//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overlay)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → runner constructors (HTTP, gRPC) and observability init
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults so an empty file (or no file) is valid
//! - Environment variables override file values
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, load_or_default, ConfigError};
pub use schema::{GrpcConfig, HttpConfig, ObservabilityConfig, ServiceConfig, ShutdownConfig};
pub use validation::{validate_config, ValidationError};
