//! Prometheus metrics for authlink.
//!
//! - `authlink_operations_total{op, outcome}` - orchestrator calls by result
//! - `authlink_operation_duration_seconds{op}` - orchestrator latency
//! - `authlink_detached_write_failures_total` - background code writes that failed

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Orchestrator operations by name and outcome (`ok` or an error code).
pub static OPERATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Orchestrator latency by operation.
pub static OPERATION_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Detached auth-code writes that failed.
pub static DETACHED_WRITE_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(OPERATIONS, IntCounterVec::new(Opts::new("authlink_operations_total", "Orchestrator operations by outcome"), &["op", "outcome"]));
    register!(OPERATION_LATENCY, HistogramVec::new(
        HistogramOpts::new("authlink_operation_duration_seconds", "Orchestrator operation latency")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["op"]));
    register!(DETACHED_WRITE_FAILURES, IntCounter::new("authlink_detached_write_failures_total", "Detached auth-code writes that failed"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

/// Record one finished operation.
pub fn record_operation(op: &str, outcome: &str, duration_secs: f64) {
    if let Some(m) = OPERATIONS.get() {
        m.with_label_values(&[op, outcome]).inc();
    }
    if let Some(m) = OPERATION_LATENCY.get() {
        m.with_label_values(&[op]).observe(duration_secs);
    }
}

/// Record a failed detached code write.
pub fn record_detached_write_failure() {
    if let Some(m) = DETACHED_WRITE_FAILURES.get() {
        m.inc();
    }
}
