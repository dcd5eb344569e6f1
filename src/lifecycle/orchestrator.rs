//! The lifecycle orchestrator.
//!
//! # Responsibilities
//! - Accumulate lifecycle functions, runners and shutdown hooks
//! - Run startup, wait for cancellation, run teardown
//! - Publish the current lifecycle phase for readiness reporting
//! - Collect health checks for the HTTP health endpoints

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use axum::Router;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Errors, LifecycleError, RunError};
use crate::grpc::GrpcServerRunner;
use crate::health::{health_ok, HealthCheck, HealthRegistry, HealthReporter};
use crate::http::{health_router, HttpServerRunner};
use crate::lifecycle::hooks::{lifecycle_fn, Lifecycle, LifecycleFn, ShutdownFn};
use crate::lifecycle::runner::Runner;
use crate::lifecycle::startup::start_with_rollback;
use crate::observability::metrics;

/// Where an orchestrator is in its single lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting registrations.
    Configuring,
    /// Running lifecycle start functions and starting runners.
    Starting,
    /// Everything started; waiting for cancellation.
    Running,
    /// Tearing down after cancellation.
    Stopping,
    /// Teardown finished.
    Stopped,
    /// Startup failed; nothing is serving.
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Configuring => "configuring",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything registered during configuration.
///
/// `starts[i]` and `stops[i]` always belong to the same component.
#[derive(Default, Clone)]
struct Registry {
    starts: Vec<LifecycleFn>,
    stops: Vec<LifecycleFn>,
    runners: Vec<Arc<dyn Runner>>,
    shutdown: Vec<ShutdownFn>,
    http_configured: bool,
}

/// Brings lifecycle components and servers up in order, holds them until
/// cancelled, and tears them down in reverse.
///
/// Registration may happen from several call sites; `run` snapshots the
/// registry once and never reads it again. An orchestrator runs once.
pub struct Orchestrator {
    registry: RwLock<Registry>,
    consumed: AtomicBool,
    phase: watch::Sender<Phase>,
    health: Arc<HealthRegistry>,
}

impl Orchestrator {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Configuring);
        Self {
            registry: RwLock::new(Registry::default()),
            consumed: AtomicBool::new(false),
            phase,
            health: Arc::new(HealthRegistry::new()),
        }
    }

    /// Register a runner. Runners start after every lifecycle component.
    pub fn add_runner(&self, runner: Arc<dyn Runner>) -> Result<(), LifecycleError> {
        tracing::debug!(runner = runner.name(), "Registering runner");
        self.configure(|registry| {
            registry.runners.push(runner);
            Ok(())
        })
    }

    /// Register the HTTP server. Only one is allowed.
    pub fn add_http_server(&self, server: HttpServerRunner) -> Result<(), LifecycleError> {
        self.configure(|registry| {
            if registry.http_configured {
                return Err(LifecycleError::HttpAlreadyConfigured);
            }
            registry.http_configured = true;
            registry.runners.push(Arc::new(server));
            Ok(())
        })
    }

    /// Register a gRPC server.
    pub fn add_grpc_server(&self, server: GrpcServerRunner) -> Result<(), LifecycleError> {
        self.add_runner(Arc::new(server))
    }

    /// Register a lifecycle component; its start and stop stay paired.
    pub fn add_lifecycle<L>(&self, component: Arc<L>) -> Result<(), LifecycleError>
    where
        L: Lifecycle + 'static,
    {
        let on_start = component.clone();
        let start = lifecycle_fn(move |ctx| {
            let component = on_start.clone();
            async move { component.start(ctx).await }
        });

        let stop = lifecycle_fn(move |ctx| {
            let component = component.clone();
            async move { component.stop(ctx).await }
        });

        self.add_lifecycle_fns(start, stop)
    }

    /// Register a start function and the stop function that undoes it.
    pub fn add_lifecycle_fns(
        &self,
        start: LifecycleFn,
        stop: LifecycleFn,
    ) -> Result<(), LifecycleError> {
        self.configure(|registry| {
            registry.starts.push(start);
            registry.stops.push(stop);
            Ok(())
        })
    }

    /// Register a best-effort cleanup hook, run once after teardown.
    pub fn add_shutdown(&self, hook: ShutdownFn) -> Result<(), LifecycleError> {
        self.configure(|registry| {
            registry.shutdown.push(hook);
            Ok(())
        })
    }

    /// Register a named pair of health checks. A missing check always
    /// passes.
    pub fn add_health_check(
        &self,
        name: &str,
        liveness: Option<HealthCheck>,
        readiness: Option<HealthCheck>,
    ) -> Result<(), LifecycleError> {
        self.configure(|_| {
            if name.is_empty() {
                return Err(LifecycleError::HealthCheckNameRequired);
            }
            self.health
                .register_liveness(name, liveness.unwrap_or_else(health_ok));
            self.health
                .register_readiness(name, readiness.unwrap_or_else(health_ok));
            Ok(())
        })
    }

    /// Register every check a component reports.
    pub fn add_health_reporter(&self, reporter: &dyn HealthReporter) -> Result<(), LifecycleError> {
        self.configure(|_| {
            self.health.register_checks(reporter.health_checks());
            Ok(())
        })
    }

    /// The checks served by [`Orchestrator::http_router`].
    pub fn health_registry(&self) -> Arc<HealthRegistry> {
        self.health.clone()
    }

    /// Base routes whose health endpoints report this orchestrator's phase and checks.
    pub fn http_router(&self) -> Router {
        health_router(Some(self.subscribe_phase()), self.health.clone())
    }

    pub fn runner_count(&self) -> usize {
        self.read_registry().runners.len()
    }

    pub fn lifecycle_count(&self) -> usize {
        self.read_registry().starts.len()
    }

    pub fn shutdown_hook_count(&self) -> usize {
        self.read_registry().shutdown.len()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Execute the full lifecycle.
    ///
    /// 1. Lifecycle start functions in order; on failure roll back the
    ///    started ones in reverse and return. Runners are never started.
    /// 2. Runners in order; on failure return at once. Nothing is rolled back.
    /// 3. Wait for `ctx` to be cancelled.
    /// 4. Stop runners in reverse, lifecycle stop functions in reverse, then
    ///    shutdown hooks in order. Every step runs; failures are joined.
    pub async fn run(&self, ctx: CancellationToken) -> Result<(), RunError> {
        // Marking consumed under the read guard orders it against every
        // `configure`, so a registration lands in the snapshot or fails.
        let snapshot = {
            let registry = self.read_registry();
            if self.consumed.swap(true, Ordering::SeqCst) {
                return Err(LifecycleError::AlreadyRun.into());
            }
            registry.clone()
        };
        tracing::info!(
            lifecycle = snapshot.starts.len(),
            runners = snapshot.runners.len(),
            shutdown_hooks = snapshot.shutdown.len(),
            "Starting lifecycle"
        );

        self.set_phase(Phase::Starting);
        let began = Instant::now();

        if let Err(errors) = start_with_rollback(&ctx, &snapshot.starts, &snapshot.stops).await {
            self.set_phase(Phase::Failed);
            return Err(errors);
        }

        for runner in &snapshot.runners {
            if let Err(source) = runner.start(&ctx).await {
                tracing::error!(
                    runner = runner.name(),
                    error = %source,
                    "Runner failed to start"
                );
                metrics::record_start_failure("runner");
                self.set_phase(Phase::Failed);
                return Err(LifecycleError::RunnerStart {
                    runner: runner.name().to_string(),
                    source,
                }
                .into());
            }
            tracing::info!(runner = runner.name(), "Runner started");
        }

        metrics::record_phase_duration("startup", began);
        self.set_phase(Phase::Running);
        tracing::info!("Lifecycle running");

        ctx.cancelled().await;

        tracing::info!("Cancellation received, tearing down");
        self.set_phase(Phase::Stopping);
        let result = teardown(&snapshot).await;
        self.set_phase(Phase::Stopped);

        result
    }

    fn configure<F>(&self, f: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&mut Registry) -> Result<(), LifecycleError>,
    {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if self.consumed.load(Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyRun);
        }
        f(&mut registry)
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: Phase) {
        tracing::debug!(phase = %phase, "Lifecycle phase changed");
        self.phase.send_replace(phase);
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop everything in the snapshot. Never short-circuits.
async fn teardown(snapshot: &Registry) -> Result<(), RunError> {
    let began = Instant::now();
    let ctx = CancellationToken::new();
    let mut errors = Vec::new();

    for runner in snapshot.runners.iter().rev() {
        match runner.stop(&ctx).await {
            Ok(()) => {
                tracing::info!(runner = runner.name(), "Runner stopped");
                metrics::record_runner_stop(runner.name(), "ok");
            }
            Err(source) => {
                tracing::error!(runner = runner.name(), error = %source, "Runner failed to stop");
                metrics::record_runner_stop(runner.name(), "error");
                metrics::record_teardown_error("runner_stop");
                errors.push(LifecycleError::RunnerStop {
                    runner: runner.name().to_string(),
                    source,
                });
            }
        }
    }

    for (index, stop) in snapshot.stops.iter().enumerate().rev() {
        if let Err(source) = stop(ctx.clone()).await {
            tracing::error!(index, error = %source, "Lifecycle component failed to stop");
            metrics::record_teardown_error("lifecycle_stop");
            errors.push(LifecycleError::Stop { index, source });
        }
    }

    for (index, hook) in snapshot.shutdown.iter().enumerate() {
        if let Err(source) = hook(ctx.clone()).await {
            tracing::error!(index, error = %source, "Shutdown hook failed");
            metrics::record_teardown_error("shutdown_hook");
            errors.push(LifecycleError::ShutdownHook { index, source });
        }
    }

    metrics::record_phase_duration("teardown", began);
    tracing::info!(errors = errors.len(), "Teardown complete");
    Errors::from_vec(errors)
}
