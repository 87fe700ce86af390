//! Metrics collection and Prometheus export.
//!
//! HTTP metrics come from `service_core::middleware::metrics`; the helpers
//! below record sales-specific counters and database timings.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are ignored.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Count a completed command (`create`, `update`, ...) by outcome.
pub fn record_operation(operation: &'static str, outcome: &'static str) {
    counter!("sales_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

pub fn record_idempotent_replay() {
    counter!("sales_idempotency_replays_total").increment(1);
}

pub fn record_event(event_type: &'static str, delivered: bool) {
    let status = if delivered { "queued" } else { "dropped" };
    counter!("sales_events_total", "event" => event_type, "status" => status).increment(1);
}

/// Measures one database operation; the duration is recorded on drop.
pub struct DbTimer {
    operation: &'static str,
    start: Instant,
}

impl DbTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for DbTimer {
    fn drop(&mut self) {
        histogram!("sales_db_query_duration_seconds", "operation" => self.operation)
            .record(self.start.elapsed().as_secs_f64());
    }
}
