//! Error taxonomy for lifecycle orchestration.
//!
//! # Categories
//! - Fatal startup: a lifecycle start function or runner start failed
//! - Rollback: undoing an already-started lifecycle component failed
//! - Teardown: a runner stop, lifecycle stop or shutdown hook failed
//! - Asynchronous serve: a server's serve loop failed after start returned
//!
//! Rollback and teardown failures never short-circuit; they are collected
//! into an [`Errors`] aggregate alongside whatever triggered them.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by user-supplied lifecycle callbacks and runners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while orchestrating a lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A lifecycle start function failed; aborts the run.
    #[error("lifecycle start [{index}]: {source}")]
    Start {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// Undoing an already-started lifecycle component failed.
    #[error("lifecycle rollback [{index}]: {source}")]
    Rollback {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A runner failed to start; aborts the run.
    #[error("runner start ({runner}): {source}")]
    RunnerStart {
        runner: String,
        #[source]
        source: BoxError,
    },

    /// A runner failed to stop during teardown.
    #[error("runner stop ({runner}): {source}")]
    RunnerStop {
        runner: String,
        #[source]
        source: BoxError,
    },

    /// A lifecycle stop function failed during teardown.
    #[error("lifecycle stop [{index}]: {source}")]
    Stop {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// A shutdown hook failed.
    #[error("shutdown hook [{index}]: {source}")]
    ShutdownHook {
        index: usize,
        #[source]
        source: BoxError,
    },

    /// The orchestrator already ran (or is running); it is single-use.
    #[error("orchestrator has already been run")]
    AlreadyRun,

    /// Only one HTTP server may be registered per orchestrator.
    #[error("http server already configured")]
    HttpAlreadyConfigured,

    /// A health check was registered without a name.
    #[error("health check name required")]
    HealthCheckNameRequired,
}

impl LifecycleError {
    /// Whether this error aborted startup (as opposed to teardown/rollback).
    pub fn is_fatal_startup(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::RunnerStart { .. })
    }
}

/// Errors produced by the HTTP and gRPC server runners.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve loop failed after start returned.
    #[error("serve loop failed: {0}")]
    Serve(#[source] BoxError),

    /// Graceful shutdown did not complete in time; the server was forced down.
    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimedOut(Duration),

    /// The stop context was cancelled before graceful shutdown completed.
    #[error("graceful shutdown interrupted by cancellation")]
    ShutdownCancelled,

    /// Start was called while the server is already running.
    #[error("server already started")]
    AlreadyStarted,

    /// The reflection service could not be built.
    #[error("grpc reflection: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
}

/// An ordered, non-empty aggregate of errors.
///
/// Every member is kept; `Display` joins them with newlines.
#[derive(Debug)]
pub struct Errors<E> {
    errors: Vec<E>,
}

/// The error returned by [`Orchestrator::run`](crate::lifecycle::Orchestrator::run).
pub type RunError = Errors<LifecycleError>;

impl<E> Errors<E> {
    /// Wrap a single error.
    pub fn single(error: E) -> Self {
        Self { errors: vec![error] }
    }

    /// Collapse a list of errors into a result; empty means success.
    pub fn from_vec(errors: Vec<E>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; an aggregate holds at least one error.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errors.iter()
    }

    /// The first error recorded, usually the one that triggered the rest.
    pub fn first(&self) -> &E {
        &self.errors[0]
    }

    pub fn into_vec(self) -> Vec<E> {
        self.errors
    }
}

impl<E> From<E> for Errors<E> {
    fn from(error: E) -> Self {
        Self::single(error)
    }
}

impl<E> IntoIterator for Errors<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a Errors<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl<E: fmt::Display> fmt::Display for Errors<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl<E: std::error::Error + 'static> std::error::Error for Errors<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
