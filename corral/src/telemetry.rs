//! Tracing and telemetry instrumentation for corral.
//!
//! Helper functions for creating tracing spans and recording metrics during
//! run lifecycle events. All functions work both with and without the
//! `metrics` feature flag.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Create a tracing span covering the handling of one inbound request.
#[must_use]
pub fn run_handle_span(case_id: impl AsRef<str>) -> Span {
    info_span!(
        "corral.handle",
        case_id = %case_id.as_ref(),
    )
}

/// Create a tracing span for a resource claim attempt.
#[must_use]
pub fn acquire_span(run_id: impl AsRef<str>) -> Span {
    info_span!(
        "corral.acquire",
        run_id = %run_id.as_ref(),
    )
}

/// Create a tracing span for the executor invocation.
#[must_use]
pub fn execute_span(run_id: impl AsRef<str>, resource_id: impl AsRef<str>) -> Span {
    info_span!(
        "corral.execute",
        run_id = %run_id.as_ref(),
        resource_id = %resource_id.as_ref(),
    )
}

/// Instrument a future with an execute span.
pub fn instrument_execute<F>(
    run_id: impl AsRef<str>,
    resource_id: impl AsRef<str>,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let span = execute_span(run_id, resource_id);
    future.instrument(span)
}

/// Record that a run was admitted and its ledger row created.
pub fn record_run_admitted(case_id: impl AsRef<str>) {
    tracing::info!(case_id = %case_id.as_ref(), "run admitted");

    #[cfg(feature = "metrics")]
    crate::metrics::record_run_admitted();
}

/// Record that a request was skipped as a duplicate.
pub fn record_run_skipped(case_id: impl AsRef<str>, prior_status: impl AsRef<str>) {
    tracing::info!(
        case_id = %case_id.as_ref(),
        prior_status = %prior_status.as_ref(),
        "duplicate request skipped"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_run_skipped(prior_status.as_ref());
}

/// Record that the admission ceiling refused a request.
pub fn record_run_refused(case_id: impl AsRef<str>) {
    tracing::info!(case_id = %case_id.as_ref(), "request refused by admission ceiling");

    #[cfg(feature = "metrics")]
    crate::metrics::record_run_refused();
}

/// Record that a run reached a terminal status in the ledger.
pub fn record_run_completed(status: impl AsRef<str>) {
    tracing::info!(status = %status.as_ref(), "run completed");

    #[cfg(feature = "metrics")]
    crate::metrics::record_run_completed(status.as_ref());
}

/// Record that a resource was locked.
pub fn record_resource_locked(resource_id: impl AsRef<str>) {
    tracing::debug!(resource_id = %resource_id.as_ref(), "resource locked");

    #[cfg(feature = "metrics")]
    crate::metrics::record_resource_locked(resource_id.as_ref());
}

/// Record that a resource returned to the pool.
pub fn record_resource_released(resource_id: impl AsRef<str>) {
    tracing::debug!(resource_id = %resource_id.as_ref(), "resource released");

    #[cfg(feature = "metrics")]
    crate::metrics::record_resource_released(resource_id.as_ref());
}

/// Update the available-resource gauge.
pub fn set_pool_available(available: usize) {
    tracing::debug!(available, "pool availability updated");

    #[cfg(feature = "metrics")]
    crate::metrics::set_pool_available(available as f64);
}

/// Observe the duration of a run execution.
pub fn observe_run_duration(
    case_id: impl AsRef<str>,
    status: impl AsRef<str>,
    duration_secs: f64,
) {
    tracing::info!(
        case_id = %case_id.as_ref(),
        status = %status.as_ref(),
        duration_secs,
        "run duration observed"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_run_duration(status.as_ref(), duration_secs);
}

/// Record the start of run execution for duration tracking.
///
/// Returns an opaque handle that should be passed to [`record_run_end`].
pub fn record_run_start(run_id: impl AsRef<str>) -> RunTimingHandle {
    RunTimingHandle {
        run_id: run_id.as_ref().to_string(),
        start: std::time::Instant::now(),
    }
}

/// Record the end of run execution and update duration metrics.
pub fn record_run_end(
    handle: RunTimingHandle,
    case_id: impl AsRef<str>,
    status: impl AsRef<str>,
) {
    let duration_secs = handle.start.elapsed().as_secs_f64();
    observe_run_duration(case_id, status, duration_secs);
}

/// Handle for tracking run execution duration.
#[derive(Debug)]
pub struct RunTimingHandle {
    run_id: String,
    start: std::time::Instant,
}

impl RunTimingHandle {
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber_guard() -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry())
    }

    #[test]
    fn handle_span_name() {
        let _guard = subscriber_guard();
        let span = run_handle_span("case-1");
        assert_eq!(span.metadata().unwrap().name(), "corral.handle");
    }

    #[test]
    fn acquire_span_name() {
        let _guard = subscriber_guard();
        let span = acquire_span("run-1");
        assert_eq!(span.metadata().unwrap().name(), "corral.acquire");
    }

    #[test]
    fn execute_span_name() {
        let _guard = subscriber_guard();
        let span = execute_span("run-1", "cred-1");
        assert_eq!(span.metadata().unwrap().name(), "corral.execute");
    }

    #[test]
    fn timing_handle_tracks_elapsed() {
        let handle = record_run_start("run-1");
        assert_eq!(handle.run_id(), "run-1");
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(handle.elapsed().as_nanos() > 0);
        record_run_end(handle, "case-1", "succeeded");
    }
}
