//! Prometheus metrics registration and export.
//!
//! Metrics are process-global and optional: until [`init_metrics`] has been
//! called every `record_*` function is a no-op, so library users and tests
//! never need to set anything up.

use prometheus::{
    CounterVec, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all bugforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Fetch jobs finished, labeled by job kind and outcome (completed/dropped).
pub static FETCH_JOBS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Fetch jobs currently holding a concurrency permit.
pub static JOBS_IN_FLIGHT: OnceLock<IntGauge> = OnceLock::new();

/// Dataset lines appended, labeled by classifier label.
pub static LINES_EMITTED_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Dataset appends that failed with an IO error.
pub static WRITE_FAILURES_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Bugs whose severity label was not on the known scale.
pub static UNKNOWN_SEVERITY_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Calling it more than once keeps the first set of metrics.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let fetch_jobs_total = IntCounterVec::new(
        Opts::new("bugforge_fetch_jobs_total", "Fetch jobs finished"),
        &["kind", "outcome"],
    )?;

    let jobs_in_flight = IntGauge::new(
        "bugforge_jobs_in_flight",
        "Fetch jobs currently being processed",
    )?;

    let lines_emitted_total = CounterVec::new(
        Opts::new("bugforge_lines_emitted_total", "Dataset lines appended"),
        &["label"],
    )?;

    let write_failures_total = IntCounter::new(
        "bugforge_write_failures_total",
        "Dataset appends that failed",
    )?;

    let unknown_severity_total = IntCounter::new(
        "bugforge_unknown_severity_total",
        "Bugs with a severity outside the known scale",
    )?;

    registry.register(Box::new(fetch_jobs_total.clone()))?;
    registry.register(Box::new(jobs_in_flight.clone()))?;
    registry.register(Box::new(lines_emitted_total.clone()))?;
    registry.register(Box::new(write_failures_total.clone()))?;
    registry.register(Box::new(unknown_severity_total.clone()))?;

    // A concurrent initializer may have won the race; its metrics stay.
    let _ = REGISTRY.set(registry);
    let _ = FETCH_JOBS_TOTAL.set(fetch_jobs_total);
    let _ = JOBS_IN_FLIGHT.set(jobs_in_flight);
    let _ = LINES_EMITTED_TOTAL.set(lines_emitted_total);
    let _ = WRITE_FAILURES_TOTAL.set(write_failures_total);
    let _ = UNKNOWN_SEVERITY_TOTAL.set(unknown_severity_total);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|e| format!("# Invalid UTF-8 in metrics: {}\n", e))
}

pub fn record_fetch_job(kind: &str, outcome: &str) {
    if let Some(counter) = FETCH_JOBS_TOTAL.get() {
        counter.with_label_values(&[kind, outcome]).inc();
    }
}

pub fn job_started() {
    if let Some(gauge) = JOBS_IN_FLIGHT.get() {
        gauge.inc();
    }
}

pub fn job_finished() {
    if let Some(gauge) = JOBS_IN_FLIGHT.get() {
        gauge.dec();
    }
}

pub fn record_line_emitted(label: i32) {
    if let Some(counter) = LINES_EMITTED_TOTAL.get() {
        let label = label.to_string();
        counter.with_label_values(&[label.as_str()]).inc();
    }
}

pub fn record_write_failure() {
    if let Some(counter) = WRITE_FAILURES_TOTAL.get() {
        counter.inc();
    }
}

pub fn record_unknown_severity() {
    if let Some(counter) = UNKNOWN_SEVERITY_TOTAL.get() {
        counter.inc();
    }
}
