//! Notifications from the room to its consumer.
//!
//! The room actor calls the [`NotificationSink`] synchronously from its event
//! loop, one method per event kind, in the order events were processed.
//! [`ChannelSink`] adapts the sink onto an mpsc channel for consumers that
//! prefer a stream of [`RoomNotification`] values.

use common::types::{ClientHandle, RecordingId, StreamDescriptor, StreamId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::ErrorKind;

/// Consumer of room notifications.
///
/// Handles passed to `on_subscribed`/`on_ready` are non-owning and stay valid
/// until the matching `on_unsubscribed`, `on_error` or `on_room_closed`.
pub trait NotificationSink: Send + 'static {
    fn on_subscribed(&mut self, stream_id: &StreamId, client: ClientHandle);

    fn on_unsubscribed(&mut self, stream_id: &StreamId);

    fn on_published(&mut self, stream_id: &StreamId);

    fn on_recording_started(&mut self, stream_id: &StreamId, recording_id: &RecordingId);

    fn on_ready(&mut self, stream_id: &StreamId, client: ClientHandle);

    /// Asynchronous failure. `stream_id` is set when a single session failed.
    fn on_error(&mut self, kind: ErrorKind, stream_id: Option<&StreamId>, reason: &str);

    fn on_stream_list(&mut self, streams: &[StreamDescriptor]);

    fn on_stream_added(&mut self, _stream: &StreamDescriptor) {}

    fn on_stream_removed(&mut self, _stream_id: &StreamId) {}

    /// The room reached `Closed`; every handle is now invalid.
    fn on_room_closed(&mut self, _reason: &str) {}
}

/// Owned form of every notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomNotification {
    Subscribed {
        stream_id: StreamId,
        client: ClientHandle,
    },
    Unsubscribed {
        stream_id: StreamId,
    },
    Published {
        stream_id: StreamId,
    },
    RecordingStarted {
        stream_id: StreamId,
        recording_id: RecordingId,
    },
    Ready {
        stream_id: StreamId,
        client: ClientHandle,
    },
    Error {
        kind: ErrorKind,
        stream_id: Option<StreamId>,
        reason: String,
    },
    StreamList {
        streams: Vec<StreamDescriptor>,
    },
    StreamAdded {
        stream: StreamDescriptor,
    },
    StreamRemoved {
        stream_id: StreamId,
    },
    RoomClosed {
        reason: String,
    },
}

impl RoomNotification {
    /// Returns the notification kind for metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            RoomNotification::Subscribed { .. } => "subscribed",
            RoomNotification::Unsubscribed { .. } => "unsubscribed",
            RoomNotification::Published { .. } => "published",
            RoomNotification::RecordingStarted { .. } => "recording_started",
            RoomNotification::Ready { .. } => "ready",
            RoomNotification::Error { .. } => "error",
            RoomNotification::StreamList { .. } => "stream_list",
            RoomNotification::StreamAdded { .. } => "stream_added",
            RoomNotification::StreamRemoved { .. } => "stream_removed",
            RoomNotification::RoomClosed { .. } => "room_closed",
        }
    }

    /// Replay this notification onto a sink.
    pub fn deliver<S: NotificationSink + ?Sized>(&self, sink: &mut S) {
        match self {
            RoomNotification::Subscribed { stream_id, client } => {
                sink.on_subscribed(stream_id, *client);
            }
            RoomNotification::Unsubscribed { stream_id } => sink.on_unsubscribed(stream_id),
            RoomNotification::Published { stream_id } => sink.on_published(stream_id),
            RoomNotification::RecordingStarted {
                stream_id,
                recording_id,
            } => sink.on_recording_started(stream_id, recording_id),
            RoomNotification::Ready { stream_id, client } => sink.on_ready(stream_id, *client),
            RoomNotification::Error {
                kind,
                stream_id,
                reason,
            } => sink.on_error(*kind, stream_id.as_ref(), reason),
            RoomNotification::StreamList { streams } => sink.on_stream_list(streams),
            RoomNotification::StreamAdded { stream } => sink.on_stream_added(stream),
            RoomNotification::StreamRemoved { stream_id } => sink.on_stream_removed(stream_id),
            RoomNotification::RoomClosed { reason } => sink.on_room_closed(reason),
        }
    }
}

/// Sink that forwards every notification into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<RoomNotification>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<RoomNotification>) -> Self {
        Self { sender }
    }

    fn push(&self, notification: RoomNotification) {
        if let Err(e) = self.sender.send(notification) {
            debug!(
                target: "room.notifications",
                kind = e.0.kind(),
                "Notification receiver dropped"
            );
        }
    }
}

/// Create a [`ChannelSink`] and the receiver that observes it.
#[must_use]
pub fn notification_channel() -> (ChannelSink, mpsc::UnboundedReceiver<RoomNotification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink::new(tx), rx)
}

impl NotificationSink for ChannelSink {
    fn on_subscribed(&mut self, stream_id: &StreamId, client: ClientHandle) {
        self.push(RoomNotification::Subscribed {
            stream_id: stream_id.clone(),
            client,
        });
    }

    fn on_unsubscribed(&mut self, stream_id: &StreamId) {
        self.push(RoomNotification::Unsubscribed {
            stream_id: stream_id.clone(),
        });
    }

    fn on_published(&mut self, stream_id: &StreamId) {
        self.push(RoomNotification::Published {
            stream_id: stream_id.clone(),
        });
    }

    fn on_recording_started(&mut self, stream_id: &StreamId, recording_id: &RecordingId) {
        self.push(RoomNotification::RecordingStarted {
            stream_id: stream_id.clone(),
            recording_id: recording_id.clone(),
        });
    }

    fn on_ready(&mut self, stream_id: &StreamId, client: ClientHandle) {
        self.push(RoomNotification::Ready {
            stream_id: stream_id.clone(),
            client,
        });
    }

    fn on_error(&mut self, kind: ErrorKind, stream_id: Option<&StreamId>, reason: &str) {
        self.push(RoomNotification::Error {
            kind,
            stream_id: stream_id.cloned(),
            reason: reason.to_string(),
        });
    }

    fn on_stream_list(&mut self, streams: &[StreamDescriptor]) {
        self.push(RoomNotification::StreamList {
            streams: streams.to_vec(),
        });
    }

    fn on_stream_added(&mut self, stream: &StreamDescriptor) {
        self.push(RoomNotification::StreamAdded {
            stream: stream.clone(),
        });
    }

    fn on_stream_removed(&mut self, stream_id: &StreamId) {
        self.push(RoomNotification::StreamRemoved {
            stream_id: stream_id.clone(),
        });
    }

    fn on_room_closed(&mut self, reason: &str) {
        self.push(RoomNotification::RoomClosed {
            reason: reason.to_string(),
        });
    }
}
