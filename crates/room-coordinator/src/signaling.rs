//! Signaling channel boundary.
//!
//! The coordinator treats the signaling transport as a capability set: it
//! calls [`SignalingPort::send`] for outbound requests and receives inbound
//! [`SignalingEvent`]s through the room mailbox. Framing, handshakes and
//! reconnection belong to the transport.
//!
//! Inbound events may arrive late, duplicated or reordered relative to the
//! coordinator's own view; the room actor discards anything that no longer
//! matches its registry.

use common::secret::SecretString;
use common::types::{ClientHandle, RecordingId, RoomId, StreamDescriptor, StreamId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actors::RoomHandle;
use crate::errors::SignalingError;

/// Credentials used to open the signaling channel.
///
/// Held only in memory; `Debug` output is redacted.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Encoded room access token.
    pub token: SecretString,
}

impl Credentials {
    /// Wrap an encoded token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

/// Options attached to a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    /// Open a data channel alongside the media tracks.
    pub data_enabled: bool,
    /// Ask the server to record the published stream.
    pub record: bool,
}

/// Outbound request from the coordinator to the signaling transport.
#[derive(Debug, Clone)]
pub enum SignalingRequest {
    /// Open the channel for the room the credentials grant.
    Connect { credentials: Credentials },
    /// Publish the local stream.
    Publish {
        stream: StreamDescriptor,
        options: PublishOptions,
    },
    /// Subscribe to a remote stream.
    Subscribe { stream_id: StreamId },
    /// Stop consuming a remote stream.
    Unsubscribe { stream_id: StreamId },
    /// Leave the room.
    Disconnect,
}

impl SignalingRequest {
    /// Returns the request kind for logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SignalingRequest::Connect { .. } => "connect",
            SignalingRequest::Publish { .. } => "publish",
            SignalingRequest::Subscribe { .. } => "subscribe",
            SignalingRequest::Unsubscribe { .. } => "unsubscribe",
            SignalingRequest::Disconnect => "disconnect",
        }
    }
}

/// Inbound event delivered by the signaling transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Channel is up and the server assigned the room identity.
    Connected { room_id: RoomId },
    /// Channel could not be opened.
    ConnectFailed { reason: String },
    /// Server accepted the pending publish and assigned its stream id.
    PublishAck { stream_id: StreamId },
    /// Server accepted a subscribe; `client` is the peer-connection client
    /// created for it.
    SubscribeAck {
        stream_id: StreamId,
        client: ClientHandle,
    },
    /// Server confirmed an unsubscribe.
    UnsubscribeAck { stream_id: StreamId },
    /// Server started recording a stream.
    RecordingStarted {
        stream_id: StreamId,
        recording_id: RecordingId,
    },
    /// Streams currently published in the room.
    StreamList { streams: Vec<StreamDescriptor> },
    /// A remote stream was published into the room.
    StreamAdded { stream: StreamDescriptor },
    /// A remote stream left the room.
    StreamRemoved { stream_id: StreamId },
    /// Error scoped to a stream, or room-wide when `stream_id` is `None`.
    Error {
        stream_id: Option<StreamId>,
        reason: String,
    },
}

impl SignalingEvent {
    /// Returns the event kind for logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SignalingEvent::Connected { .. } => "connected",
            SignalingEvent::ConnectFailed { .. } => "connect_failed",
            SignalingEvent::PublishAck { .. } => "publish_ack",
            SignalingEvent::SubscribeAck { .. } => "subscribe_ack",
            SignalingEvent::UnsubscribeAck { .. } => "unsubscribe_ack",
            SignalingEvent::RecordingStarted { .. } => "recording_started",
            SignalingEvent::StreamList { .. } => "stream_list",
            SignalingEvent::StreamAdded { .. } => "stream_added",
            SignalingEvent::StreamRemoved { .. } => "stream_removed",
            SignalingEvent::Error { .. } => "error",
        }
    }
}

/// Outbound half of the signaling transport.
///
/// `send` must not block: implementations enqueue the request and return.
/// Whether the transport correlates acks with requests is its own concern.
pub trait SignalingPort: Send + 'static {
    /// Queue an outbound request.
    ///
    /// # Errors
    ///
    /// `SignalingError` if the request cannot be queued.
    fn send(&mut self, request: SignalingRequest) -> Result<(), SignalingError>;
}

/// Forwards requests into an mpsc channel drained by the transport task.
impl SignalingPort for mpsc::UnboundedSender<SignalingRequest> {
    fn send(&mut self, request: SignalingRequest) -> Result<(), SignalingError> {
        mpsc::UnboundedSender::send(self, request).map_err(|_| SignalingError::Closed)
    }
}

/// Pump inbound events from a transport into the room mailbox.
///
/// Arrival order is preserved. The task ends when the transport drops its
/// sender or the room actor goes away.
pub fn spawn_signaling_pump(
    mut events: mpsc::Receiver<SignalingEvent>,
    room: RoomHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut forwarded: u64 = 0;

        loop {
            tokio::select! {
                () = room.cancelled() => {
                    debug!(
                        target: "room.signaling",
                        "Room cancelled, stopping signaling pump"
                    );
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!(
                            target: "room.signaling",
                            "Signaling transport closed its event stream"
                        );
                        break;
                    };

                    if room.signaling_event(event).await.is_err() {
                        debug!(
                            target: "room.signaling",
                            "Room mailbox closed, stopping signaling pump"
                        );
                        break;
                    }
                    forwarded += 1;
                }
            }
        }

        info!(
            target: "room.signaling",
            coordinator_id = %room.coordinator_id(),
            events_forwarded = forwarded,
            "Signaling pump stopped"
        );
    })
}
