//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured port (":8080", "8080", "0.0.0.0:8080", "")
//!     → address.rs (normalize_port, resolve_bind_address)
//!     → listener.rs (bind TcpListener, map failures to ServerError::Bind)
//!     → Hand off to HTTP / gRPC runner
//!     → force_close.rs (accepted streams fail on forced stop)
//! ```
//!
//! # Design Decisions
//! - Ports are kept as strings until bind time so config can carry ":port"
//! - A bare ":port" binds on all interfaces
//! - Bind failures always name the address that failed

pub mod address;
pub mod force_close;
pub mod listener;

pub use address::{normalize_port, resolve_bind_address, DEFAULT_PORT};
pub use force_close::{ForceCloseListener, ForceClosable};
pub use listener::bind;
