//! Prometheus Metrics Module
//!
//! Exposes feed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Pipeline**: ticks, samples generated, filtered out and emitted
//! - **Delivery**: samples lost to lagging subscribers, active subscribers
//! - **Failures**: transient vs exhausted failures, retries
//! - **Latency**: enrichment duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!("price_feed_ticks_total", "Timer ticks processed by the producer");
    describe_counter!(
        "price_feed_samples_generated_total",
        "Raw samples produced by the generator"
    );
    describe_counter!(
        "price_feed_samples_filtered_total",
        "Samples dropped by the pipeline filter"
    );
    describe_counter!(
        "price_feed_samples_emitted_total",
        "Samples handed to the broadcast hub"
    );
    describe_counter!(
        "price_feed_samples_lagged_total",
        "Samples skipped by subscribers that fell behind"
    );
    describe_counter!(
        "price_feed_retries_total",
        "Producer restarts scheduled by the retry policy"
    );
    describe_counter!(
        "price_feed_failures_total",
        "Producer failures by kind (transient or exhausted) and cause"
    );
    describe_counter!(
        "price_feed_executions_started_total",
        "Producer executions started by the broadcast hub"
    );
    describe_counter!(
        "price_feed_single_price_total",
        "Single-value requests by outcome"
    );

    describe_gauge!("price_feed_subscribers", "Subscribers attached to the hub");
    describe_gauge!(
        "price_feed_producer_running",
        "1 while a producer execution is active"
    );

    describe_histogram!(
        "price_feed_enrichment_seconds",
        "Time spent enriching one sample"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Failure classification for metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Absorbed by the retry policy.
    Transient,
    /// Retry budget exhausted.
    Exhausted,
}

impl FailureKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Outcome of a single-value request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleOutcome {
    /// A sample passed the filter.
    Value,
    /// The filter rejected the sample.
    Empty,
    /// Computation failed.
    Error,
}

impl SingleOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Record one producer tick.
pub fn record_tick() {
    counter!("price_feed_ticks_total").increment(1);
}

/// Record raw samples produced by the generator.
pub fn record_generated(count: u64) {
    counter!("price_feed_samples_generated_total").increment(count);
}

/// Record samples dropped by the filter.
pub fn record_filtered(count: u64) {
    counter!("price_feed_samples_filtered_total").increment(count);
}

/// Record a sample handed to the hub.
pub fn record_emitted() {
    counter!("price_feed_samples_emitted_total").increment(1);
}

/// Record samples a lagging subscriber skipped.
pub fn record_lagged(count: u64) {
    counter!("price_feed_samples_lagged_total").increment(count);
}

/// Record a scheduled retry.
pub fn record_retry() {
    counter!("price_feed_retries_total").increment(1);
}

/// Record a producer failure. `cause` is the error's short label.
pub fn record_failure(kind: FailureKind, cause: &'static str) {
    counter!("price_feed_failures_total", "kind" => kind.as_str(), "cause" => cause).increment(1);
}

/// Record a producer execution start.
pub fn record_execution_started() {
    counter!("price_feed_executions_started_total").increment(1);
}

/// Record a single-value request outcome.
pub fn record_single_price(outcome: SingleOutcome) {
    counter!("price_feed_single_price_total", "outcome" => outcome.as_str()).increment(1);
}

/// Update the attached subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("price_feed_subscribers").set(count as f64);
}

/// Update the producer running flag.
pub fn set_producer_running(running: bool) {
    gauge!("price_feed_producer_running").set(if running { 1.0 } else { 0.0 });
}

/// Record enrichment duration for one sample.
pub fn record_enrichment_duration(duration: Duration) {
    histogram!("price_feed_enrichment_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kind_as_str() {
        assert_eq!(FailureKind::Transient.as_str(), "transient");
        assert_eq!(FailureKind::Exhausted.as_str(), "exhausted");
    }

    #[test]
    fn single_outcome_as_str() {
        assert_eq!(SingleOutcome::Value.as_str(), "value");
        assert_eq!(SingleOutcome::Empty.as_str(), "empty");
        assert_eq!(SingleOutcome::Error.as_str(), "error");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_tick();
        record_generated(5);
        record_failure(FailureKind::Transient, "generation");
        set_subscribers(3);
        set_producer_running(true);
        record_enrichment_duration(Duration::from_millis(500));
    }
}
