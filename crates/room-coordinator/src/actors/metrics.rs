//! Room actor metrics and mailbox monitoring.
//!
//! The mailbox monitor is shared between every `RoomHandle` (which records an
//! enqueue after each successful send) and the actor (which records the
//! dequeue once a message is processed), so `current_depth` is the real
//! backlog.
//!
//! | Level    | Depth     |
//! |----------|-----------|
//! | Normal   | <= 100    |
//! | Warning  | 101-500   |
//! | Critical | > 500     |

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::observability::metrics as room_metrics;

use super::session::SessionRole;

/// Mailbox depth thresholds for the room actor.
pub const ROOM_MAILBOX_NORMAL: usize = 100;
pub const ROOM_MAILBOX_WARNING: usize = 500;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// At or below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Mailbox monitor for tracking queue depth and emitting metrics.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Coordinator identifier for log context.
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new shared mailbox monitor.
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        })
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        room_metrics::set_actor_mailbox_depth(new_depth);

        match Self::level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "room.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    threshold = ROOM_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == ROOM_MAILBOX_NORMAL + 1 => {
                // Log once when crossing into warning
                debug!(
                    target: "room.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        // Saturate: a message sent before the monitor existed must not wrap.
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        room_metrics::set_actor_mailbox_depth(previous.saturating_sub(1));
    }

    /// Undo an enqueue whose send failed because the actor is gone.
    pub fn record_drop(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        debug!(
            target: "room.mailbox",
            actor_id = %self.actor_id,
            "Message dropped, mailbox closed"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        Self::level_for_depth(self.current_depth())
    }

    fn level_for_depth(depth: usize) -> MailboxLevel {
        if depth > ROOM_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > ROOM_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Session and event counters for one room.
///
/// Shared between the actor (writer) and anyone holding the `Arc` (readers).
#[derive(Debug, Default)]
pub struct RoomMetrics {
    active_publish: AtomicUsize,
    active_subscribe: AtomicUsize,
    sessions_errored: AtomicU64,
    stale_events: AtomicU64,
    events_processed: AtomicU64,
}

/// Point-in-time copy of [`RoomMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomMetricsSnapshot {
    pub active_publish: usize,
    pub active_subscribe: usize,
    pub sessions_errored: u64,
    pub stale_events: u64,
    pub events_processed: u64,
}

impl RoomMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A session entered the registry.
    pub fn session_opened(&self, role: SessionRole) {
        let count = self.counter(role).fetch_add(1, Ordering::Relaxed) + 1;
        room_metrics::set_sessions_active(role.as_str(), count);
    }

    /// A session left the registry.
    pub fn session_removed(&self, role: SessionRole) {
        let previous = self
            .counter(role)
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(1))
            })
            .unwrap_or(0);
        room_metrics::set_sessions_active(role.as_str(), previous.saturating_sub(1));
    }

    pub fn session_errored(&self) {
        self.sessions_errored.fetch_add(1, Ordering::Relaxed);
    }

    /// An ack or client event no longer matched the registry.
    pub fn record_stale(&self, event: &str) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
        room_metrics::record_stale_event(event);
    }

    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> RoomMetricsSnapshot {
        RoomMetricsSnapshot {
            active_publish: self.active_publish.load(Ordering::Relaxed),
            active_subscribe: self.active_subscribe.load(Ordering::Relaxed),
            sessions_errored: self.sessions_errored.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
        }
    }

    fn counter(&self, role: SessionRole) -> &AtomicUsize {
        match role {
            SessionRole::Publish => &self.active_publish,
            SessionRole::Subscribe => &self.active_subscribe,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_monitor_enqueue_dequeue() {
        let monitor = MailboxMonitor::new("room-test");

        assert_eq!(monitor.current_depth(), 0);

        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 1);

        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 3); // Peak stays at 3
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_mailbox_dequeue_saturates_at_zero() {
        let monitor = MailboxMonitor::new("room-test");

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 0);
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_mailbox_drop_does_not_count_as_processed() {
        let monitor = MailboxMonitor::new("room-test");

        monitor.record_enqueue();
        monitor.record_drop();
        assert_eq!(monitor.current_depth(), 0);
        assert_eq!(monitor.messages_processed(), 0);
    }

    #[test]
    fn test_mailbox_monitor_levels() {
        let monitor = MailboxMonitor::new("room-test");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        for _ in 0..150 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        for _ in 0..400 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_room_metrics_session_counts() {
        let metrics = RoomMetrics::new();

        metrics.session_opened(SessionRole::Publish);
        metrics.session_opened(SessionRole::Subscribe);
        metrics.session_opened(SessionRole::Subscribe);
        metrics.session_removed(SessionRole::Subscribe);
        metrics.session_errored();
        metrics.record_stale("subscribe_ack");
        metrics.record_event_processed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_publish, 1);
        assert_eq!(snapshot.active_subscribe, 1);
        assert_eq!(snapshot.sessions_errored, 1);
        assert_eq!(snapshot.stale_events, 1);
        assert_eq!(snapshot.events_processed, 1);
    }

    #[test]
    fn test_session_removed_never_underflows() {
        let metrics = RoomMetrics::new();

        metrics.session_removed(SessionRole::Publish);
        assert_eq!(metrics.snapshot().active_publish, 0);
    }
}
