//! Peer sessions - one per publish or subscribe stream.
//!
//! A `PeerSession` is owned by value inside the `SessionRegistry` and is only
//! mutated by the room actor. State machine:
//!
//! ```text
//! Requested -> Negotiating -> Active -> Closed
//!     \             \           \
//!      +-------------+-----------+--> Errored
//! ```
//!
//! `Closed` and `Errored` are terminal.

use common::types::{ClientHandle, RecordingId, StreamId};
use serde::Serialize;
use std::fmt;

/// Whether a session carries the local stream or a remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Locally originated stream.
    Publish,
    /// Remote stream being consumed.
    Subscribe,
}

impl SessionRole {
    /// Returns the role as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Publish => "publish",
            SessionRole::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Request sent, waiting for the signaling ack.
    Requested,
    /// Ack received, peer connection negotiating.
    Negotiating,
    /// Client reported ready.
    Active,
    /// Torn down cleanly.
    Closed,
    /// Failed.
    Errored,
}

impl SessionState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(&self, next: SessionState) -> bool {
        match (self, next) {
            (SessionState::Requested, SessionState::Negotiating)
            | (SessionState::Negotiating, SessionState::Active) => true,
            (current, SessionState::Closed | SessionState::Errored) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Returns the state as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionState::Requested => "requested",
            SessionState::Negotiating => "negotiating",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        }
    }
}

/// One peer-connection client wrapping a single stream.
#[derive(Debug, Clone)]
pub struct PeerSession {
    /// Stream id. A publish session starts with the local stream's id and
    /// takes the server-assigned one on ack.
    stream_id: StreamId,
    role: SessionRole,
    state: SessionState,
    /// Peer-connection client handle, bound at publish time or at subscribe ack.
    client: Option<ClientHandle>,
    recording_id: Option<RecordingId>,
    /// An unsubscribe request is in flight.
    unsubscribe_pending: bool,
    /// Creation timestamp (unix seconds).
    requested_at: i64,
}

impl PeerSession {
    /// New publish session for the local stream `stream_id`.
    #[must_use]
    pub fn publish(stream_id: StreamId, client: ClientHandle) -> Self {
        Self::new(stream_id, SessionRole::Publish, Some(client))
    }

    /// New subscribe session for a remote stream.
    #[must_use]
    pub fn subscribe(stream_id: StreamId) -> Self {
        Self::new(stream_id, SessionRole::Subscribe, None)
    }

    fn new(stream_id: StreamId, role: SessionRole, client: Option<ClientHandle>) -> Self {
        Self {
            stream_id,
            role,
            state: SessionState::Requested,
            client,
            recording_id: None,
            unsubscribe_pending: false,
            requested_at: chrono::Utc::now().timestamp(),
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.role
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn client(&self) -> Option<ClientHandle> {
        self.client
    }

    #[must_use]
    pub fn is_unsubscribe_pending(&self) -> bool {
        self.unsubscribe_pending
    }

    /// Move to `next` if legal. Returns whether the transition happened.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }

    /// Rebind a publish session to its server-assigned stream id.
    pub(crate) fn bind_stream_id(&mut self, stream_id: StreamId) {
        self.stream_id = stream_id;
    }

    /// Bind the client handle delivered with a subscribe ack.
    pub(crate) fn bind_client(&mut self, client: ClientHandle) {
        self.client = Some(client);
    }

    pub(crate) fn set_recording_id(&mut self, recording_id: RecordingId) {
        self.recording_id = Some(recording_id);
    }

    pub(crate) fn mark_unsubscribe_pending(&mut self) {
        self.unsubscribe_pending = true;
    }

    /// Snapshot for `RoomSnapshot`.
    #[must_use]
    pub fn to_info(&self) -> SessionInfo {
        SessionInfo {
            stream_id: self.stream_id.clone(),
            role: self.role,
            state: self.state,
            client: self.client,
            recording_id: self.recording_id.clone(),
            unsubscribe_pending: self.unsubscribe_pending,
            requested_at: self.requested_at,
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub stream_id: StreamId,
    pub role: SessionRole,
    pub state: SessionState,
    pub client: Option<ClientHandle>,
    pub recording_id: Option<RecordingId>,
    pub unsubscribe_pending: bool,
    pub requested_at: i64,
}
