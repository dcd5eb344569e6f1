//! The `Runner` capability and the machinery shared by server runners.
//!
//! # Responsibilities
//! - Define the start/stop contract for components owning a serve loop
//! - Provide the single-slot error channel a serve task reports through
//! - Race graceful shutdown against a timeout and the stop context
//! - Force open connections closed when graceful shutdown loses the race

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, Errors, ServerError};

/// A component owning a background serve loop.
///
/// `start` may return before the component is fully serving; failures that
/// happen afterwards surface through `stop`. `stop` must be safe to call
/// when `start` was never called or failed, and must return within the
/// runner's own shutdown bound.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Name used in logs, metrics and errors.
    fn name(&self) -> &str;

    async fn start(&self, ctx: &CancellationToken) -> Result<(), BoxError>;

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError>;
}

/// Create a serve-error slot: the reporter goes to the serve task, the
/// slot stays with the runner.
pub fn serve_error_slot() -> (ServeErrorReporter, ServeErrorSlot) {
    let (tx, rx) = oneshot::channel();
    (ServeErrorReporter { tx }, ServeErrorSlot { rx })
}

/// Sending half of a serve-error slot. Reporting consumes it, so a serve
/// task can report at most once; dropping it closes the slot.
#[derive(Debug)]
pub struct ServeErrorReporter {
    tx: oneshot::Sender<ServerError>,
}

impl ServeErrorReporter {
    pub fn report(self, error: ServerError) {
        // The runner may already have given up on the task.
        let _ = self.tx.send(error);
    }
}

/// Receiving half of a serve-error slot.
#[derive(Debug)]
pub struct ServeErrorSlot {
    rx: oneshot::Receiver<ServerError>,
}

impl ServeErrorSlot {
    /// Take the reported error without waiting. Returns `None` when nothing
    /// was reported yet or the serve task exited cleanly.
    pub fn drain(&mut self) -> Option<ServerError> {
        self.rx.try_recv().ok()
    }
}

/// A spawned serve loop together with its graceful and forced shutdown
/// triggers and error slot.
///
/// `force` is meant for the connections the serve loop hands out (see
/// [`ForceClosable`](crate::net::ForceClosable)); aborting the serve task
/// alone leaves per-connection tasks running.
#[derive(Debug)]
pub(crate) struct ServeHandle {
    graceful: CancellationToken,
    force: CancellationToken,
    task: JoinHandle<()>,
    errors: ServeErrorSlot,
}

impl ServeHandle {
    /// Spawn `serve`, handing it the graceful-shutdown token, the
    /// force-close token and the error reporter.
    pub(crate) fn spawn<F, Fut>(serve: F) -> Self
    where
        F: FnOnce(CancellationToken, CancellationToken, ServeErrorReporter) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let graceful = CancellationToken::new();
        let force = CancellationToken::new();
        let (reporter, errors) = serve_error_slot();
        let task = tokio::spawn(serve(graceful.clone(), force.clone(), reporter));

        Self {
            graceful,
            force,
            task,
            errors,
        }
    }

    /// Request graceful shutdown and wait for whichever comes first: the
    /// serve task finishing, `timeout` elapsing, or `ctx` being cancelled.
    /// The latter two close every open connection and abort the serve task.
    /// Any error the serve loop reported is joined after the shutdown outcome.
    pub(crate) async fn stop(
        self,
        timeout: Duration,
        ctx: &CancellationToken,
    ) -> Result<(), Errors<ServerError>> {
        let ServeHandle {
            graceful,
            force,
            mut task,
            mut errors,
        } = self;

        graceful.cancel();

        let mut failures = Vec::new();
        tokio::select! {
            biased;

            joined = &mut task => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        failures.push(ServerError::Serve("serve task panicked".into()));
                    }
                }
            }
            _ = tokio::time::sleep(timeout) => {
                force.cancel();
                task.abort();
                failures.push(ServerError::ShutdownTimedOut(timeout));
            }
            _ = ctx.cancelled() => {
                force.cancel();
                task.abort();
                failures.push(ServerError::ShutdownCancelled);
            }
        }

        if let Some(err) = errors.drain() {
            failures.push(err);
        }

        Errors::from_vec(failures)
    }
}

/// Lock a runner's state, recovering from poisoning. Runner state is only
/// ever replaced wholesale, so a poisoned guard is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
