//! Lifecycle hooks for components that are not network servers.
//!
//! A cache warmer or a template loader still needs ordered startup and
//! shutdown; it participates through plain async callbacks.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// A shareable async start/stop callback.
pub type LifecycleFn =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A best-effort cleanup callback run once after teardown.
pub type ShutdownFn = LifecycleFn;

/// Box an async closure into a [`LifecycleFn`].
pub fn lifecycle_fn<F, Fut>(f: F) -> LifecycleFn
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// A component with ordered start/stop actions. Both default to success,
/// so a component only overrides the side it needs.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn start(&self, _ctx: CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }

    async fn stop(&self, _ctx: CancellationToken) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Adapts two optional callbacks to [`Lifecycle`].
///
/// A missing callback succeeds, which lets callers register a stop-only
/// or start-only component without a placeholder.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    on_start: Option<LifecycleFn>,
    on_stop: Option<LifecycleFn>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start = Some(lifecycle_fn(f));
        self
    }

    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop = Some(lifecycle_fn(f));
        self
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

#[async_trait]
impl Lifecycle for LifecycleHooks {
    async fn start(&self, ctx: CancellationToken) -> Result<(), BoxError> {
        match &self.on_start {
            Some(start) => start(ctx).await,
            None => Ok(()),
        }
    }

    async fn stop(&self, ctx: CancellationToken) -> Result<(), BoxError> {
        match &self.on_stop {
            Some(stop) => stop(ctx).await,
            None => Ok(()),
        }
    }
}
