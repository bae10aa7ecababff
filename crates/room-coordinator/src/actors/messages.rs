//! Message types for the room actor.
//!
//! Caller operations, signaling events and peer-connection client events all
//! enter the actor through one `tokio::sync::mpsc` mailbox, which fixes their
//! processing order. Request-reply uses `tokio::sync::oneshot`.

use common::types::{ClientHandle, RoomId, StreamDescriptor, StreamId};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::errors::RoomError;
use crate::signaling::{Credentials, PublishOptions, SignalingEvent};

use super::session::SessionInfo;

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Open the signaling channel. Answered once the port reports
    /// `connected` or `connectFailed`. `None` uses the configured token.
    Connect {
        credentials: Option<Credentials>,
        respond_to: oneshot::Sender<Result<RoomId, RoomError>>,
    },

    /// Publish the local stream.
    Publish {
        stream: StreamDescriptor,
        options: PublishOptions,
        /// Answered with the client handle minted for the publish session.
        respond_to: oneshot::Sender<Result<ClientHandle, RoomError>>,
    },

    /// Subscribe to a remote stream.
    Subscribe {
        stream_id: StreamId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Stop consuming a remote stream.
    Unsubscribe {
        stream_id: StreamId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Inbound event from the signaling transport.
    Signaling(SignalingEvent),

    /// Lifecycle event from a peer-connection client.
    Client(ClientEvent),

    /// Get current room state.
    GetState {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },

    /// Leave the room.
    Close {
        reason: String,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },
}

impl RoomMessage {
    /// Returns the message kind for the latency metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            RoomMessage::Connect { .. } => "connect",
            RoomMessage::Publish { .. } => "publish",
            RoomMessage::Subscribe { .. } => "subscribe",
            RoomMessage::Unsubscribe { .. } => "unsubscribe",
            RoomMessage::Signaling(event) => event.kind(),
            RoomMessage::Client(event) => match event.kind {
                ClientEventKind::Ready => "client_ready",
                ClientEventKind::Failed { .. } => "client_failed",
            },
            RoomMessage::GetState { .. } => "get_state",
            RoomMessage::Close { .. } => "close",
        }
    }
}

/// Event reported by the peer-connection client of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    pub stream_id: StreamId,
    pub kind: ClientEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEventKind {
    /// Negotiation finished; media can flow.
    Ready,
    /// The client failed and cannot recover.
    Failed { reason: String },
}

impl ClientEventKind {
    /// Returns the event kind for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClientEventKind::Ready => "ready",
            ClientEventKind::Failed { .. } => "failed",
        }
    }
}

/// Room lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    /// Not yet connected. Also the state after a failed connect.
    Disconnected,
    /// Signaling channel up; publish/subscribe accepted.
    Connected,
    /// Terminal.
    Closed,
}

impl RoomState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoomState::Disconnected => "disconnected",
            RoomState::Connected => "connected",
            RoomState::Closed => "closed",
        }
    }
}

/// Point-in-time view of a room, returned by `RoomHandle::get_state`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    /// Coordinator instance identifier.
    pub coordinator_id: String,
    /// Server-assigned room identity, once connected.
    pub room_id: Option<RoomId>,
    pub state: RoomState,
    /// Stream id of the publish session, once acked.
    pub publish_stream_id: Option<StreamId>,
    /// Every session in the registry, publish first.
    pub sessions: Vec<SessionInfo>,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
    /// Room creation timestamp.
    pub created_at: i64,
}

impl RoomSnapshot {
    /// Session info for `stream_id`, if registered.
    #[must_use]
    pub fn session(&self, stream_id: &StreamId) -> Option<&SessionInfo> {
        self.sessions
            .iter()
            .find(|s| &s.stream_id == stream_id)
    }
}
