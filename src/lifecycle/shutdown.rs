//! Signal-driven shutdown.
//!
//! # Responsibilities
//! - Stop the server within a fixed bound, whatever the caller's context
//! - Stop remaining components in reverse registration order
//! - Log failures; shutdown never fails

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::lifecycle::hooks::LifecycleFn;
use crate::lifecycle::runner::Runner;

/// Upper bound on how long the server may take to stop.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stop `server` (bounded by [`SHUTDOWN_TIMEOUT`]) and then `stops` in
/// reverse order.
///
/// A missing or already-cancelled `ctx` is replaced with a fresh token so
/// the server still gets its full grace period.
pub async fn shutdown(
    ctx: Option<&CancellationToken>,
    server: Option<&dyn Runner>,
    stops: &[LifecycleFn],
) {
    let ctx = match ctx {
        Some(ctx) if !ctx.is_cancelled() => ctx.clone(),
        _ => CancellationToken::new(),
    };

    tracing::info!("Shutting down gracefully");

    if let Some(server) = server {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, server.stop(&ctx)).await {
            Ok(Ok(())) => tracing::info!(runner = server.name(), "Server stopped"),
            Ok(Err(e)) => tracing::error!(runner = server.name(), error = %e, "Server shutdown failed"),
            Err(_) => tracing::error!(
                runner = server.name(),
                timeout = ?SHUTDOWN_TIMEOUT,
                "Server shutdown timed out"
            ),
        }
    }

    let stop_ctx = CancellationToken::new();
    for (index, stop) in stops.iter().enumerate().rev() {
        if let Err(e) = stop(stop_ctx.clone()).await {
            tracing::error!(index, error = %e, "Error stopping component");
        }
    }

    tracing::info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::lifecycle::hooks::lifecycle_fn;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingServer {
        stopped_with_cancelled: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl Runner for RecordingServer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
            Ok(())
        }

        async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
            *self.stopped_with_cancelled.lock().unwrap() = Some(ctx.is_cancelled());
            Err("drain failed".into())
        }
    }

    fn recording_stops(log: &Arc<Mutex<Vec<usize>>>, n: usize) -> Vec<LifecycleFn> {
        (0..n)
            .map(|i| {
                let log = log.clone();
                lifecycle_fn(move |_| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(i);
                        if i == 1 {
                            Err::<(), BoxError>("boom".into())
                        } else {
                            Ok(())
                        }
                    }
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn stops_run_in_reverse_despite_errors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stops = recording_stops(&log, 3);

        shutdown(None, None, &stops).await;
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn cancelled_context_is_replaced() {
        let server = RecordingServer {
            stopped_with_cancelled: Mutex::new(None),
        };
        let ctx = CancellationToken::new();
        ctx.cancel();

        shutdown(Some(&ctx), Some(&server), &[]).await;
        assert_eq!(*server.stopped_with_cancelled.lock().unwrap(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_server_is_bounded() {
        struct Hung;

        #[async_trait]
        impl Runner for Hung {
            fn name(&self) -> &str {
                "hung"
            }
            async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
                Ok(())
            }
            async fn stop(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
                std::future::pending().await
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let stops = recording_stops(&log, 1);

        shutdown(None, Some(&Hung), &stops).await;
        assert_eq!(*log.lock().unwrap(), vec![0]);
    }
}
