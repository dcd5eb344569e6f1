//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT/SIGQUIT (Ctrl-C elsewhere)
//! - Translate signals into token cancellation for the orchestrator
//! - Drive the signal-based serve loop for a single server
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failure to install handlers is reported, never panics

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LifecycleError;
use crate::lifecycle::hooks::LifecycleFn;
use crate::lifecycle::runner::Runner;
use crate::lifecycle::shutdown::shutdown;
use crate::lifecycle::startup::start;

/// Complete when the process receives SIGINT, SIGTERM or SIGQUIT.
///
/// Ctrl-C arrives as SIGINT, so it is not watched separately.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Complete when the process receives a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancel `token` on the first termination signal.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_shutdown_signal() => {
                match result {
                    Ok(()) => tracing::info!("Shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "Failed to install signal handlers, shutting down"),
                }
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Start the lifecycle functions and `server`, block until a termination
/// signal, then shut down.
pub async fn serve(
    server: &dyn Runner,
    starts: &[LifecycleFn],
    stops: &[LifecycleFn],
) -> Result<(), LifecycleError> {
    serve_until(server, starts, stops, async {
        if let Err(e) = wait_for_shutdown_signal().await {
            tracing::error!(error = %e, "Failed to install signal handlers, shutting down");
        }
    })
    .await
}

/// Start the lifecycle functions and `server`, block until `signal`
/// completes, then shut down.
///
/// A lifecycle start failure rolls back the functions already started. A
/// server start failure is returned without running any stop function.
pub async fn serve_until<F>(
    server: &dyn Runner,
    starts: &[LifecycleFn],
    stops: &[LifecycleFn],
    signal: F,
) -> Result<(), LifecycleError>
where
    F: Future<Output = ()>,
{
    let ctx = CancellationToken::new();

    start(&ctx, starts, stops).await?;

    tracing::info!(runner = server.name(), "Starting server");
    server
        .start(&ctx)
        .await
        .map_err(|source| LifecycleError::RunnerStart {
            runner: server.name().to_string(),
            source,
        })?;

    signal.await;
    tracing::info!(runner = server.name(), "Shutting down server");

    shutdown(Some(&ctx), Some(server), stops).await;
    Ok(())
}
