//! Named liveness and readiness checks.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use futures_util::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::lifecycle::hooks::{lifecycle_fn, LifecycleFn};
use crate::observability::metrics;

/// A liveness or readiness check. `Ok` means healthy.
pub type HealthCheck = LifecycleFn;

/// A check that always passes.
pub fn health_ok() -> HealthCheck {
    lifecycle_fn(|_| async { Ok::<(), BoxError>(()) })
}

/// Checks a component contributes, by name.
#[derive(Default, Clone)]
pub struct HealthChecks {
    pub liveness: BTreeMap<String, HealthCheck>,
    pub readiness: BTreeMap<String, HealthCheck>,
}

impl HealthChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn liveness(mut self, name: impl Into<String>, check: HealthCheck) -> Self {
        self.liveness.insert(name.into(), check);
        self
    }

    pub fn readiness(mut self, name: impl Into<String>, check: HealthCheck) -> Self {
        self.readiness.insert(name.into(), check);
        self
    }
}

/// Implemented by components that expose their own health checks.
pub trait HealthReporter {
    fn health_checks(&self) -> HealthChecks;
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResult {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON body served by the health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok`, `degraded` (a check failed) or `unavailable` (not running).
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<HealthResult>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }

    fn from_results(results: Vec<HealthResult>) -> Self {
        let status = if results.iter().any(|r| r.error.is_some()) {
            "degraded"
        } else {
            "ok"
        };
        Self {
            status,
            phase: None,
            results,
        }
    }
}

/// Stores health checks and runs them on demand.
#[derive(Default)]
pub struct HealthRegistry {
    liveness: RwLock<BTreeMap<String, HealthCheck>>,
    readiness: RwLock<BTreeMap<String, HealthCheck>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a liveness check. An empty name is ignored.
    pub fn register_liveness(&self, name: &str, check: HealthCheck) {
        register(&self.liveness, name, check);
    }

    /// Add a readiness check. An empty name is ignored.
    pub fn register_readiness(&self, name: &str, check: HealthCheck) {
        register(&self.readiness, name, check);
    }

    /// Install every check a reporter exposes.
    pub fn register_checks(&self, checks: HealthChecks) {
        for (name, check) in checks.liveness {
            self.register_liveness(&name, check);
        }
        for (name, check) in checks.readiness {
            self.register_readiness(&name, check);
        }
    }

    pub fn liveness_count(&self) -> usize {
        self.liveness.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn readiness_count(&self) -> usize {
        self.readiness.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn check_liveness(&self) -> HealthResponse {
        run_checks("liveness", snapshot(&self.liveness)).await
    }

    pub async fn check_readiness(&self) -> HealthResponse {
        run_checks("readiness", snapshot(&self.readiness)).await
    }
}

fn register(checks: &RwLock<BTreeMap<String, HealthCheck>>, name: &str, check: HealthCheck) {
    if name.is_empty() {
        tracing::warn!("Ignoring health check without a name");
        return;
    }
    tracing::debug!(check = name, "Registering health check");
    checks
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), check);
}

fn snapshot(checks: &RwLock<BTreeMap<String, HealthCheck>>) -> Vec<(String, HealthCheck)> {
    checks
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|(name, check)| (name.clone(), check.clone()))
        .collect()
}

async fn run_checks(kind: &'static str, checks: Vec<(String, HealthCheck)>) -> HealthResponse {
    let ctx = CancellationToken::new();
    let results = join_all(checks.into_iter().map(|(name, check)| {
        let ctx = ctx.clone();
        async move {
            let error = match check(ctx).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(kind, check = %name, error = %e, "Health check failed");
                    metrics::record_health_check_failure(kind, &name);
                    Some(e.to_string())
                }
            };
            HealthResult { name, error }
        }
    }))
    .await;

    HealthResponse::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(message: &'static str) -> HealthCheck {
        lifecycle_fn(move |_| async move { Err::<(), BoxError>(message.into()) })
    }

    #[tokio::test]
    async fn empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let response = registry.check_liveness().await;
        assert!(response.is_healthy());
        assert!(response.results.is_empty());
        assert!(registry.check_readiness().await.is_healthy());
    }

    #[tokio::test]
    async fn failing_check_degrades_its_endpoint_only() {
        let registry = HealthRegistry::new();
        registry.register_liveness("db", health_ok());
        registry.register_readiness("db", failing("connection refused"));

        assert!(registry.check_liveness().await.is_healthy());

        let response = registry.check_readiness().await;
        assert_eq!(response.status, "degraded");
        assert_eq!(
            response.results,
            vec![HealthResult {
                name: "db".to_string(),
                error: Some("connection refused".to_string()),
            }]
        );
    }

    #[test]
    fn empty_name_is_ignored_and_names_replace() {
        let registry = HealthRegistry::new();
        registry.register_liveness("", health_ok());
        registry.register_liveness("cache", failing("down"));
        registry.register_liveness("cache", health_ok());
        assert_eq!(registry.liveness_count(), 1);
        assert_eq!(registry.readiness_count(), 0);
    }

    struct Component;

    impl HealthReporter for Component {
        fn health_checks(&self) -> HealthChecks {
            HealthChecks::new()
                .liveness("worker", health_ok())
                .readiness("worker", health_ok())
                .readiness("queue", failing("backlog"))
        }
    }

    #[tokio::test]
    async fn reporter_checks_are_installed() {
        let registry = HealthRegistry::new();
        registry.register_checks(Component.health_checks());

        assert_eq!(registry.liveness_count(), 1);
        assert_eq!(registry.readiness_count(), 2);

        let json = serde_json::to_value(registry.check_readiness().await).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["results"][0]["name"], "queue");
        assert_eq!(json["results"][0]["error"], "backlog");
        assert!(json["results"][1].get("error").is_none());
    }
}
