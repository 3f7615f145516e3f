//! Prometheus metrics for pacer.
//!
//! Covers:
//! - Run lifecycle (started, finished by summary kind, current RunState)
//! - Per-item delivery outcomes and latency
//! - Queue length and control-surface event connections
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use pacer_core::RunState;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_int_counter,
    register_int_gauge, CounterVec, Encoder, GaugeVec, Histogram, IntCounter, IntGauge,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Total dispatch runs accepted by `start`.
pub static RUNS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("pacer_runs_started_total", "Total dispatch runs started").unwrap()
});

/// Total dispatch runs finished.
/// Labels: summary (completed/stopped/aborted)
pub static RUNS_FINISHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pacer_runs_finished_total",
        "Total dispatch runs finished, by terminal summary",
        &["summary"]
    )
    .unwrap()
});

/// Total items passed to the delivery port.
/// Labels: outcome (delivered/failed)
pub static ITEMS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "pacer_items_total",
        "Total items dispatched, by delivery outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Delivery call latency in milliseconds.
pub static DELIVERY_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "pacer_delivery_latency_ms",
        "Delivery call latency in milliseconds",
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Engine RunState (1 = current state, 0 otherwise).
/// Labels: state (idle/running/stopping/stopped)
pub static RUN_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pacer_run_state",
        "Engine run state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Items in the loaded queue.
pub static QUEUE_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("pacer_queue_length", "Items in the loaded message queue").unwrap()
});

/// Open event stream connections on the control surface.
pub static EVENT_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pacer_event_connections",
        "Open event stream connections"
    )
    .unwrap()
});

/// Metrics recorder facade.
pub struct Metrics;

impl Metrics {
    /// Record an accepted run.
    pub fn run_started() {
        RUNS_STARTED_TOTAL.inc();
    }

    /// Record a finished run by summary kind.
    pub fn run_finished(summary: &str) {
        RUNS_FINISHED_TOTAL.with_label_values(&[summary]).inc();
    }

    /// Record one dispatched item.
    pub fn item_dispatched(outcome: &str, latency_ms: f64) {
        ITEMS_TOTAL.with_label_values(&[outcome]).inc();
        DELIVERY_LATENCY_MS.observe(latency_ms);
    }

    /// Set the current RunState.
    /// Only the active state is set to 1, all others to 0.
    pub fn run_state_set(state: RunState) {
        for s in RunState::ALL {
            RUN_STATE.with_label_values(&[&s.to_string()]).set(0.0);
        }
        RUN_STATE.with_label_values(&[&state.to_string()]).set(1.0);
    }

    /// Set the loaded queue length.
    pub fn queue_length_set(len: usize) {
        QUEUE_LENGTH.set(i64::try_from(len).unwrap_or(i64::MAX));
    }

    /// Record an opened event stream connection.
    pub fn event_connection_opened() {
        EVENT_CONNECTIONS.inc();
    }

    /// Record a closed event stream connection.
    pub fn event_connection_closed() {
        EVENT_CONNECTIONS.dec();
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn gather() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_is_one_hot() {
        Metrics::run_state_set(RunState::Running);
        Metrics::run_state_set(RunState::Stopping);

        assert_eq!(RUN_STATE.with_label_values(&["stopping"]).get(), 1.0);
        assert_eq!(RUN_STATE.with_label_values(&["running"]).get(), 0.0);
        assert_eq!(RUN_STATE.with_label_values(&["idle"]).get(), 0.0);
    }

    #[test]
    fn test_item_counters() {
        let before = ITEMS_TOTAL.with_label_values(&["failed"]).get();
        Metrics::item_dispatched("failed", 12.0);
        assert_eq!(ITEMS_TOTAL.with_label_values(&["failed"]).get(), before + 1.0);
    }

    #[test]
    fn test_gather_exposes_metrics() {
        Metrics::run_started();
        Metrics::queue_length_set(7);

        let text = Metrics::gather().unwrap();
        assert!(text.contains("pacer_runs_started_total"));
        assert!(text.contains("pacer_queue_length"));
    }
}
