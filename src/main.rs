//! Service lifecycle runner (v1)
//!
//! Runs an HTTP server and an optional gRPC server under the lifecycle
//! orchestrator, cancelled by OS signals.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file + env ──▶ config ──▶ observability (logging, metrics)
//!                            │
//!                            ▼
//!                      ┌────────────────────────────────────────────┐
//!                      │               Orchestrator                  │
//!                      │                                             │
//!   startup  ────────▶ │  lifecycle starts ─▶ http runner ─▶ grpc   │
//!                      │         (rollback on failure)               │
//!                      │                                             │
//!   SIGINT/SIGTERM ──▶ │  cancellation token                         │
//!                      │                                             │
//!   teardown ◀──────── │  grpc ─▶ http runner ─▶ lifecycle stops     │
//!                      │                     ─▶ shutdown hooks      │
//!                      └────────────────────────────────────────────┘
//! ```
//!
//! # Subcommands
//!
//! - `run`: full orchestrator (default)
//! - `serve`: a single HTTP server driven directly by OS signals

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;

use service_lifecycle::config::{self, ServiceConfig};
use service_lifecycle::http::base_router;
use service_lifecycle::lifecycle::{self, cancel_on_signal, lifecycle_fn, LifecycleHooks, Orchestrator};
use service_lifecycle::observability;
use service_lifecycle::{BoxError, GrpcServerRunner, HttpServerRunner};

#[derive(Parser)]
#[command(name = "service-lifecycle")]
#[command(about = "Run HTTP and gRPC servers under an ordered lifecycle", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefix for environment overrides (`<PREFIX>_HTTP_PORT`, ...).
    #[arg(long, default_value = "SERVICE")]
    env_prefix: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run the full orchestrator until a shutdown signal
    Run,
    /// Serve a single HTTP server until a shutdown signal
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_or_default(cli.config.as_deref(), &cli.env_prefix) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("service-lifecycle: {}", e);
            return ExitCode::FAILURE;
        }
    };

    observability::init_logging(&config.observability);
    tracing::info!("service-lifecycle v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::Serve => serve(&config).await,
    };

    match result {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Service did not shut down cleanly");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &ServiceConfig) -> Result<(), BoxError> {
    let orchestrator = Orchestrator::new();

    orchestrator.add_lifecycle(Arc::new(
        LifecycleHooks::new()
            .on_start(|_| async {
                tracing::info!("Warming caches");
                Ok::<(), BoxError>(())
            })
            .on_stop(|_| async {
                tracing::info!("Flushing caches");
                Ok::<(), BoxError>(())
            }),
    ))?;

    orchestrator.add_health_check(
        "process",
        None,
        Some(lifecycle_fn(|_| async {
            tracing::debug!("Readiness check");
            Ok::<(), BoxError>(())
        })),
    )?;

    if config.http.enabled {
        let router = orchestrator.http_router();
        orchestrator.add_http_server(
            HttpServerRunner::from_config(&config.http, router)
                .with_shutdown_timeout(config.shutdown.timeout()),
        )?;
    }

    if config.grpc.enabled {
        orchestrator.add_grpc_server(
            GrpcServerRunner::from_config(&config.grpc, Routes::default())?
                .with_shutdown_timeout(config.shutdown.timeout()),
        )?;
    }

    orchestrator.add_shutdown(lifecycle_fn(|_| async {
        tracing::info!("Releasing process resources");
        Ok::<(), BoxError>(())
    }))?;

    tracing::info!(
        http = config.http.enabled,
        grpc = config.grpc.enabled,
        runners = orchestrator.runner_count(),
        "Configuration loaded"
    );

    let ctx = CancellationToken::new();
    let signals = cancel_on_signal(ctx.clone());

    let result = orchestrator.run(ctx.clone()).await;

    // Startup failures return before any signal; release the signal task.
    ctx.cancel();
    let _ = signals.await;

    result.map_err(Into::into)
}

async fn serve(config: &ServiceConfig) -> Result<(), BoxError> {
    let server = HttpServerRunner::from_config(&config.http, base_router(None))
        .with_shutdown_timeout(config.shutdown.timeout());

    lifecycle::serve(&server, &[], &[]).await?;
    Ok(())
}
