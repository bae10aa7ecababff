//! Metrics definitions for the room coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label is bounded by an enum in this crate:
//! - `role`: 2 values (publish, subscribe)
//! - `event`: bounded by `SignalingEvent` / `ClientEventKind` / message kinds (~15 values)
//! - `kind`: bounded by `RoomNotification` kinds and `ErrorKind`
//!
//! Stream and room identifiers are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle for
/// rendering metrics.
///
/// Event processing is in-memory, so latency buckets start at 10µs.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("room_event_latency".to_string()),
            &[
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session Metrics (Gauges)
// ============================================================================

/// Set the number of live sessions for a role.
///
/// Metric: `room_sessions_active`
/// Labels: `role` (publish, subscribe)
pub fn set_sessions_active(role: &str, count: usize) {
    // usize to f64 conversion is safe for realistic session counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("room_sessions_active", "role" => role.to_string()).set(count as f64);
}

/// Set the room actor mailbox depth.
///
/// Metric: `room_actor_mailbox_depth`
/// Labels: none
pub fn set_actor_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("room_actor_mailbox_depth").set(depth as f64);
}

// ============================================================================
// Event Metrics (Counters)
// ============================================================================

/// Record an inbound signaling event.
///
/// Metric: `room_signaling_events_total`
/// Labels: `event`
pub fn record_signaling_event(event: &str) {
    counter!("room_signaling_events_total", "event" => event.to_string()).increment(1);
}

/// Record a peer-connection client event.
///
/// Metric: `room_client_events_total`
/// Labels: `event` (ready, failed)
pub fn record_client_event(event: &str) {
    counter!("room_client_events_total", "event" => event.to_string()).increment(1);
}

/// Record an event discarded because it no longer matched the registry.
///
/// Metric: `room_stale_events_total`
/// Labels: `event`
pub fn record_stale_event(event: &str) {
    counter!("room_stale_events_total", "event" => event.to_string()).increment(1);
}

/// Record a notification delivered to the sink.
///
/// Metric: `room_notifications_total`
/// Labels: `kind`
pub fn record_notification(kind: &str) {
    counter!("room_notifications_total", "kind" => kind.to_string()).increment(1);
}

/// Record an asynchronous error reported via `on_error`.
///
/// Metric: `room_errors_total`
/// Labels: `kind` (connection, session)
pub fn record_error(kind: &str) {
    counter!("room_errors_total", "kind" => kind.to_string()).increment(1);
}

// ============================================================================
// Latency Metrics (Histograms)
// ============================================================================

/// Record how long the actor spent handling one mailbox message.
///
/// Metric: `room_event_latency_seconds`
/// Labels: `event`
pub fn record_event_latency(event: &str, duration: Duration) {
    histogram!("room_event_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}
