//! Observability for the room coordinator.
//!
//! # Privacy by Default
//!
//! The actor loop uses `#[instrument(skip_all)]`; credentials never reach a
//! span or log field. Metric labels are bounded enums, never identifiers.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `room_sessions_active` | Gauge | `role` | Live sessions per role |
//! | `room_actor_mailbox_depth` | Gauge | none | Backpressure indicator |
//! | `room_signaling_events_total` | Counter | `event` | Inbound signaling events |
//! | `room_client_events_total` | Counter | `event` | Peer-connection client events |
//! | `room_stale_events_total` | Counter | `event` | Discarded late or unknown events |
//! | `room_notifications_total` | Counter | `kind` | Notifications delivered |
//! | `room_errors_total` | Counter | `kind` | Asynchronous errors reported |
//! | `room_event_latency_seconds` | Histogram | `event` | Per-message handling time |

pub mod metrics;

pub use self::metrics::init_metrics_recorder;
