//! Prometheus metrics instrumentation for corral.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `corral_runs_admitted_total` - Runs admitted and recorded as Running
//! - `corral_runs_skipped_total` - Duplicate requests skipped
//! - `corral_runs_refused_total` - Requests refused by the admission ceiling
//! - `corral_runs_completed_total` - Runs reaching a terminal status
//! - `corral_resource_locks_total` - Resource claims
//! - `corral_resource_releases_total` - Resource releases
//!
//! ## Gauges
//! - `corral_pool_available` - Resources currently available for claiming
//!
//! ## Histograms
//! - `corral_run_duration_seconds` - Execution duration per run
#![cfg(feature = "metrics")]

use prometheus::{exponential_buckets, CounterVec, Gauge, Opts, Registry};
use prometheus::HistogramVec;
use std::sync::LazyLock;

/// Global Prometheus registry for corral metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Counter for admitted runs.
pub static RUNS_ADMITTED_TOTAL: LazyLock<prometheus::Counter> = LazyLock::new(|| {
    prometheus::Counter::new(
        "corral_runs_admitted_total",
        "Runs admitted and recorded as Running",
    )
    .expect("corral_runs_admitted_total metric creation failed")
});

/// Counter for skipped duplicate requests.
///
/// Labels:
/// - `prior_status`: status of the run that blocked the attempt
pub static RUNS_SKIPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("corral_runs_skipped_total", "Duplicate requests skipped");
    CounterVec::new(opts, &["prior_status"])
        .expect("corral_runs_skipped_total metric creation failed")
});

/// Counter for ceiling-refused requests.
pub static RUNS_REFUSED_TOTAL: LazyLock<prometheus::Counter> = LazyLock::new(|| {
    prometheus::Counter::new(
        "corral_runs_refused_total",
        "Requests refused by the admission ceiling",
    )
    .expect("corral_runs_refused_total metric creation failed")
});

/// Counter for terminal run statuses.
///
/// Labels:
/// - `status`: the terminal status (succeeded, failed)
pub static RUNS_COMPLETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "corral_runs_completed_total",
        "Runs reaching a terminal status",
    );
    CounterVec::new(opts, &["status"])
        .expect("corral_runs_completed_total metric creation failed")
});

/// Counter for resource claims.
///
/// Labels:
/// - `resource_id`: the claimed resource
pub static RESOURCE_LOCKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("corral_resource_locks_total", "Resource claims");
    CounterVec::new(opts, &["resource_id"])
        .expect("corral_resource_locks_total metric creation failed")
});

/// Counter for resource releases.
///
/// Labels:
/// - `resource_id`: the released resource
pub static RESOURCE_RELEASES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("corral_resource_releases_total", "Resource releases");
    CounterVec::new(opts, &["resource_id"])
        .expect("corral_resource_releases_total metric creation failed")
});

/// Gauge for available pool capacity.
pub static POOL_AVAILABLE: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new(
        "corral_pool_available",
        "Resources currently available for claiming",
    )
    .expect("corral_pool_available metric creation failed")
});

/// Histogram for run execution duration in seconds.
///
/// Labels:
/// - `status`: the terminal status (succeeded, failed)
pub static RUN_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.001, 2.0, 15).expect("bucket creation failed");
    let opts = prometheus::HistogramOpts::new(
        "corral_run_duration_seconds",
        "Run execution duration in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["status"])
        .expect("corral_run_duration_seconds metric creation failed")
});

/// Initialize all metrics by registering them with the global registry.
///
/// This function is idempotent - calling it multiple times is safe.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(RUNS_ADMITTED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(RUNS_SKIPPED_TOTAL.clone()),
        Box::new(RUNS_REFUSED_TOTAL.clone()),
        Box::new(RUNS_COMPLETED_TOTAL.clone()),
        Box::new(RESOURCE_LOCKS_TOTAL.clone()),
        Box::new(RESOURCE_RELEASES_TOTAL.clone()),
        Box::new(POOL_AVAILABLE.clone()),
        Box::new(RUN_DURATION_SECONDS.clone()),
    ] {
        match registry.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Helper to record an admitted run.
pub fn record_run_admitted() {
    RUNS_ADMITTED_TOTAL.inc();
}

/// Helper to record a skipped duplicate.
pub fn record_run_skipped(prior_status: &str) {
    RUNS_SKIPPED_TOTAL.with_label_values(&[prior_status]).inc();
}

/// Helper to record a ceiling refusal.
pub fn record_run_refused() {
    RUNS_REFUSED_TOTAL.inc();
}

/// Helper to record a terminal run status.
pub fn record_run_completed(status: &str) {
    RUNS_COMPLETED_TOTAL.with_label_values(&[status]).inc();
}

/// Helper to record a resource claim.
pub fn record_resource_locked(resource_id: &str) {
    RESOURCE_LOCKS_TOTAL
        .with_label_values(&[resource_id])
        .inc();
}

/// Helper to record a resource release.
pub fn record_resource_released(resource_id: &str) {
    RESOURCE_RELEASES_TOTAL
        .with_label_values(&[resource_id])
        .inc();
}

/// Helper to update the availability gauge.
pub fn set_pool_available(available: f64) {
    POOL_AVAILABLE.set(available);
}

/// Helper to observe run duration.
pub fn observe_run_duration(status: &str, duration_secs: f64) {
    RUN_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
