//! gRPC server subsystem.
//!
//! # Data Flow
//! ```text
//! GrpcServerRunner::start
//!     → bind listener now (bind error returned to caller)
//!     → spawn task: tonic Server::serve_with_incoming_shutdown
//!     → serve failure → serve-error slot
//!
//! GrpcServerRunner::stop
//!     → request graceful stop
//!     → race: graceful done | shutdown timeout | ctx cancelled
//!     → timeout/cancel → forced stop (serve task aborted)
//!     → drain serve-error slot
//! ```
//!
//! # Design Decisions
//! - Unlike HTTP, binding is synchronous so port conflicts fail startup
//! - Reflection is opt-in and built from encoded descriptor sets

pub mod server;

pub use server::GrpcServerRunner;
