//! gRPC server runner.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;
use tonic::transport::Server;

use crate::config::GrpcConfig;
use crate::error::{BoxError, Errors, ServerError};
use crate::lifecycle::runner::{lock, Runner, ServeHandle};
use crate::lifecycle::SHUTDOWN_TIMEOUT;
use crate::net::{self, ForceClosable};

/// Runs one tonic server over a set of routes.
pub struct GrpcServerRunner {
    name: String,
    addr: String,
    routes: Routes,
    shutdown_timeout: Duration,
    local_addr: Mutex<Option<SocketAddr>>,
    serving: Mutex<Option<ServeHandle>>,
}

impl GrpcServerRunner {
    /// Create a runner serving `routes` on `addr` (`":50051"`, `"127.0.0.1:0"`).
    pub fn new(addr: impl Into<String>, routes: Routes) -> Self {
        Self {
            name: "grpc".to_string(),
            addr: addr.into(),
            routes,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            local_addr: Mutex::new(None),
            serving: Mutex::new(None),
        }
    }

    /// Create a runner from configuration, enabling reflection when asked.
    pub fn from_config(config: &GrpcConfig, routes: Routes) -> Result<Self, ServerError> {
        let runner = Self::new(net::normalize_port(&config.port, ":50051"), routes);
        if config.reflection {
            runner.with_reflection(&[])
        } else {
            Ok(runner)
        }
    }

    /// Serve the gRPC reflection service, describing the given encoded
    /// `FileDescriptorSet`s in addition to reflection itself.
    pub fn with_reflection(
        mut self,
        descriptor_sets: &[&'static [u8]],
    ) -> Result<Self, ServerError> {
        let mut builder = tonic_reflection::server::Builder::configure();
        for set in descriptor_sets {
            builder = builder.register_encoded_file_descriptor_set(*set);
        }
        let reflection = builder.build_v1()?;

        self.routes = self.routes.add_service(reflection);
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound on graceful stop before the server is forced down.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Bind the listener and spawn the serve task. Bind failures are
    /// returned here.
    pub async fn launch(&self) -> Result<(), ServerError> {
        if lock(&self.serving).is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let listener = net::bind(&self.addr).await?;
        let bound = listener.local_addr().ok();

        let mut serving = lock(&self.serving);
        if serving.is_some() {
            return Err(ServerError::AlreadyStarted);
        }

        let name = self.name.clone();
        let routes = self.routes.clone();

        *serving = Some(ServeHandle::spawn(move |graceful, force, reporter| async move {
            tracing::info!(runner = %name, address = ?bound, "gRPC server starting");

            let incoming = TcpListenerStream::new(listener)
                .map(move |conn| conn.map(|io| ForceClosable::new(io, force.clone())));

            let result = Server::builder()
                .add_routes(routes)
                .serve_with_incoming_shutdown(incoming, graceful.cancelled_owned())
                .await;

            match result {
                Ok(()) => tracing::info!(runner = %name, "gRPC server stopped"),
                Err(e) => {
                    tracing::error!(runner = %name, error = %e, "gRPC server failed");
                    reporter.report(ServerError::Serve(Box::new(e)));
                }
            }
        }));
        *lock(&self.local_addr) = bound;

        Ok(())
    }

    /// Stop the server: graceful first, forced once the shutdown timeout
    /// elapses or `ctx` is cancelled.
    ///
    /// Stopping a server that never started is a no-op.
    pub async fn shutdown(&self, ctx: &CancellationToken) -> Result<(), Errors<ServerError>> {
        let serving = lock(&self.serving).take();
        let Some(serving) = serving else {
            tracing::debug!(runner = %self.name, "gRPC server not running, nothing to stop");
            return Ok(());
        };

        tracing::info!(
            runner = %self.name,
            timeout = ?self.shutdown_timeout,
            "Stopping gRPC server"
        );
        let result = serving.stop(self.shutdown_timeout, ctx).await;
        *lock(&self.local_addr) = None;

        if let Err(errors) = &result {
            let forced = errors.iter().any(|e| {
                matches!(
                    e,
                    ServerError::ShutdownTimedOut(_) | ServerError::ShutdownCancelled
                )
            });
            if forced {
                tracing::warn!(runner = %self.name, "gRPC server forced to stop");
            }
        }
        result
    }
}

#[async_trait]
impl Runner for GrpcServerRunner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _ctx: &CancellationToken) -> Result<(), BoxError> {
        self.launch().await?;
        Ok(())
    }

    async fn stop(&self, ctx: &CancellationToken) -> Result<(), BoxError> {
        self.shutdown(ctx).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_binds_synchronously() {
        let runner = GrpcServerRunner::new("127.0.0.1:0", Routes::default());
        runner.launch().await.unwrap();

        let addr = runner.local_addr().expect("bound address");
        assert_ne!(addr.port(), 0);

        runner.shutdown(&CancellationToken::new()).await.unwrap();
        assert!(runner.local_addr().is_none());
    }

    #[tokio::test]
    async fn bind_failure_is_returned_from_start() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let runner = GrpcServerRunner::new(addr, Routes::default());
        let err = runner.launch().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));

        runner.shutdown(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_ok() {
        let runner = GrpcServerRunner::new("127.0.0.1:0", Routes::default());
        runner.shutdown(&CancellationToken::new()).await.unwrap();
    }

    #[test]
    fn reflection_builds_without_descriptors() {
        let config = GrpcConfig {
            port: "0".to_string(),
            reflection: true,
            ..GrpcConfig::default()
        };
        let runner = GrpcServerRunner::from_config(&config, Routes::default()).unwrap();
        assert_eq!(runner.addr(), ":0");
    }
}
