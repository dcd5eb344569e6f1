//! Startup orchestration.
//!
//! # Responsibilities
//! - Invoke lifecycle start functions in registration order
//! - On the first failure, roll back everything already started in reverse
//! - Join rollback failures with the triggering error
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - Rollback uses a fresh token; the caller's may already be cancelled
//! - Stop function `i` undoes start function `i`

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{Errors, LifecycleError, RunError};
use crate::lifecycle::hooks::LifecycleFn;
use crate::observability::metrics;

/// Start `starts` in order, rolling back on failure.
///
/// The returned aggregate starts with [`LifecycleError::Start`] followed by
/// one [`LifecycleError::Rollback`] per stop function that failed.
pub(crate) async fn start_with_rollback(
    ctx: &CancellationToken,
    starts: &[LifecycleFn],
    stops: &[LifecycleFn],
) -> Result<(), RunError> {
    let began = Instant::now();

    for (index, start) in starts.iter().enumerate() {
        tracing::debug!(index, "Starting lifecycle component");

        if let Err(source) = start(ctx.clone()).await {
            tracing::error!(index, error = %source, "Lifecycle component failed to start");
            metrics::record_start_failure("lifecycle");

            let mut errors = vec![LifecycleError::Start { index, source }];
            let started = index.min(stops.len());
            errors.extend(rollback(&stops[..started]).await);
            return Errors::from_vec(errors);
        }
    }

    metrics::record_phase_duration("lifecycle_start", began);
    Ok(())
}

/// Invoke `stops` tail-to-head with a fresh token, collecting failures.
async fn rollback(stops: &[LifecycleFn]) -> Vec<LifecycleError> {
    let ctx = CancellationToken::new();
    let mut errors = Vec::new();

    for (index, stop) in stops.iter().enumerate().rev() {
        match stop(ctx.clone()).await {
            Ok(()) => {
                tracing::debug!(index, "Rolled back lifecycle component");
                metrics::record_rollback("ok");
            }
            Err(source) => {
                tracing::error!(index, error = %source, "Lifecycle rollback failed");
                metrics::record_rollback("error");
                errors.push(LifecycleError::Rollback { index, source });
            }
        }
    }

    errors
}

/// Signal-driven startup: start `starts` in order, rolling back on failure.
///
/// Rollback failures are logged; only the triggering error is returned.
pub async fn start(
    ctx: &CancellationToken,
    starts: &[LifecycleFn],
    stops: &[LifecycleFn],
) -> Result<(), LifecycleError> {
    match start_with_rollback(ctx, starts, stops).await {
        Ok(()) => Ok(()),
        Err(errors) => {
            let mut errors = errors.into_iter();
            match errors.next() {
                Some(first) => Err(first),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::lifecycle::hooks::lifecycle_fn;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, label: &'static str, fail: bool) -> LifecycleFn {
        let log = log.clone();
        lifecycle_fn(move |_| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(label.to_string());
                if fail {
                    Err::<(), BoxError>(format!("{label} failed").into())
                } else {
                    Ok(())
                }
            }
        })
    }

    #[tokio::test]
    async fn all_starts_succeed() {
        let log: Log = Default::default();
        let starts = vec![recording(&log, "start0", false), recording(&log, "start1", false)];
        let stops = vec![recording(&log, "stop0", false), recording(&log, "stop1", false)];

        start_with_rollback(&CancellationToken::new(), &starts, &stops)
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["start0", "start1"]);
    }

    #[tokio::test]
    async fn failure_rolls_back_in_reverse() {
        let log: Log = Default::default();
        let starts = vec![
            recording(&log, "startA", false),
            recording(&log, "startB", false),
            recording(&log, "startC", true),
        ];
        let stops = vec![recording(&log, "stopA", false), recording(&log, "stopB", false)];

        let errs = start_with_rollback(&CancellationToken::new(), &starts, &stops)
            .await
            .unwrap_err();

        assert_eq!(errs.len(), 1);
        assert!(matches!(errs.first(), LifecycleError::Start { index: 2, .. }));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["startA", "startB", "startC", "stopB", "stopA"]
        );
    }

    #[tokio::test]
    async fn rollback_errors_are_joined() {
        let log: Log = Default::default();
        let starts = vec![recording(&log, "start0", false), recording(&log, "start1", true)];
        let stops = vec![recording(&log, "stop0", true), recording(&log, "stop1", false)];

        let errs = start_with_rollback(&CancellationToken::new(), &starts, &stops)
            .await
            .unwrap_err();

        let errs = errs.into_vec();
        assert_eq!(errs.len(), 2);
        assert!(matches!(errs[0], LifecycleError::Start { index: 1, .. }));
        assert!(matches!(errs[1], LifecycleError::Rollback { index: 0, .. }));
        // stop1 pairs with the failed start and must not run
        assert_eq!(*log.lock().unwrap(), vec!["start0", "start1", "stop0"]);
    }

    #[tokio::test]
    async fn rollback_gets_fresh_context() {
        let seen_cancelled = Arc::new(Mutex::new(None));
        let seen = seen_cancelled.clone();
        let stops = vec![lifecycle_fn(move |ctx: CancellationToken| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = Some(ctx.is_cancelled());
                Ok::<(), BoxError>(())
            }
        })];
        let log: Log = Default::default();
        let starts = vec![recording(&log, "ok", false), recording(&log, "bad", true)];

        let ctx = CancellationToken::new();
        ctx.cancel();
        let _ = start_with_rollback(&ctx, &starts, &stops).await;

        assert_eq!(*seen_cancelled.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn signal_start_returns_triggering_error() {
        let log: Log = Default::default();
        let starts = vec![recording(&log, "start0", false), recording(&log, "start1", true)];
        let stops = vec![recording(&log, "stop0", true)];

        let err = start(&CancellationToken::new(), &starts, &stops)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Start { index: 1, .. }));
        assert_eq!(*log.lock().unwrap(), vec!["start0", "start1", "stop0"]);
    }
}
