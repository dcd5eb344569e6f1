//! HTTP server runner.
//!
//! # Responsibilities
//! - Wrap an axum `Router` as a lifecycle-managed [`Runner`]
//! - Wire up middleware (tracing, request timeout)
//! - Serve in the background and surface serve failures on stop
//! - Bound graceful shutdown so a stuck request cannot hang teardown
//! - Close open connections when the bound is hit

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HttpConfig;
use crate::error::{BoxError, Errors, ServerError};
use crate::lifecycle::runner::{lock, Runner, ServeHandle};
use crate::lifecycle::SHUTDOWN_TIMEOUT;
use crate::net;

/// Runs one axum server.
///
/// `launch` returns as soon as the serve task is spawned; binding happens
/// inside the task and a bind failure is reported by `shutdown`.
pub struct HttpServerRunner {
    name: String,
    addr: String,
    router: Router,
    shutdown_timeout: Duration,
    local_addr: Arc<Mutex<Option<SocketAddr>>>,
    serving: Mutex<Option<ServeHandle>>,
}

impl HttpServerRunner {
    /// Create a runner serving `router` on `addr` (`":8080"`, `"127.0.0.1:0"`).
    pub fn new(addr: impl Into<String>, router: Router) -> Self {
        Self {
            name: "http".to_string(),
            addr: addr.into(),
            router,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            local_addr: Arc::new(Mutex::new(None)),
            serving: Mutex::new(None),
        }
    }

    /// Create a runner from configuration, layering request tracing and the
    /// configured request timeout over `router`.
    #[allow(deprecated)]
    pub fn from_config(config: &HttpConfig, router: Router) -> Self {
        let router = router
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http());

        Self::new(net::normalize_port(&config.port, net::DEFAULT_PORT), router)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound on graceful shutdown before the serve task is abandoned.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The bound address, once the serve task has bound its listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Spawn the serve task.
    pub fn launch(&self) -> Result<(), ServerError> {
        let mut serving = lock(&self.serving);
        if serving.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        *lock(&self.local_addr) = None;

        let name = self.name.clone();
        let addr = self.addr.clone();
        let router = self.router.clone();
        let local_addr = self.local_addr.clone();

        *serving = Some(ServeHandle::spawn(move |graceful, force, reporter| async move {
            let listener = match net::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(runner = %name, error = %e, "HTTP server failed to bind");
                    reporter.report(e);
                    return;
                }
            };

            let bound = listener.local_addr().ok();
            *lock(&local_addr) = bound;
            tracing::info!(runner = %name, address = ?bound, "HTTP server starting");

            let listener = net::ForceCloseListener::new(listener, force);
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(graceful.cancelled_owned())
                .await;

            match result {
                Ok(()) => tracing::info!(runner = %name, "HTTP server stopped"),
                Err(e) => {
                    tracing::error!(runner = %name, error = %e, "HTTP server failed");
                    reporter.report(ServerError::Serve(Box::new(e)));
                }
            }
        }));

        Ok(())
    }

    /// Gracefully stop the server, bounded by the shutdown timeout and `ctx`.
    ///
    /// Stopping a server that never started is a no-op.
    pub async fn shutdown(&self, ctx: &CancellationToken) -> Result<(), Errors<ServerError>> {
        let serving = lock(&self.serving).take();
        let Some(serving) = serving else {
            tracing::debug!(runner = %self.name, "HTTP server not running, nothing to stop");
            return Ok(());
        };

        tracing::info!(
            runner = %self.name,
            timeout = ?self.shutdown_timeout,
            "Stopping HTTP server"
        );
        let result = serving.stop(self.shutdown_timeout, ctx).await;
        *lock(&self.local_addr) = None;
        result
    }
}

#[async_trait]
impl Runner for HttpServerRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.launch()?;
        Ok(())
    }

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.shutdown(ctx).await?;
        Ok(())
    }
}
