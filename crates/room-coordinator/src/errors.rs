//! Room coordinator error types.
//!
//! Caller-side errors (`RoomError`) are returned synchronously from
//! `RoomHandle` operations and never mutate room state. Asynchronous failures
//! reach the consumer only through `NotificationSink::on_error`, classified by
//! [`ErrorKind`]. `ConflictError` marks a broken registry invariant and is a
//! defect, not a runtime condition.

use common::types::StreamId;
use thiserror::Error;

use crate::actors::session::SessionRole;

/// Error returned from room operations.
///
/// Maps to stable numeric codes via [`RoomError::error_code`]:
/// - `InvalidState`: 1
/// - `AlreadyPublishing`, `DuplicateSubscription`: 2 (conflict)
/// - `UnknownStream`: 3 (not found)
/// - `Connection`, `Signaling`: 4 (transport)
/// - `Internal`: 5
#[derive(Debug, Error)]
pub enum RoomError {
    /// Operation attempted while the room is not in the required state.
    #[error("Invalid room state: {0}")]
    InvalidState(String),

    /// A non-closed publish session already exists.
    #[error("Already publishing")]
    AlreadyPublishing,

    /// A live subscribe session for this stream already exists.
    #[error("Already subscribed to stream {0}")]
    DuplicateSubscription(StreamId),

    /// No subscribe session exists for this stream.
    #[error("Unknown stream {0}")]
    UnknownStream(StreamId),

    /// The signaling channel reported a connection failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The signaling port refused an outbound request.
    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Room actor unavailable or an internal invariant broke.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Returns the numeric error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            RoomError::InvalidState(_) => 1,
            RoomError::AlreadyPublishing | RoomError::DuplicateSubscription(_) => 2,
            RoomError::UnknownStream(_) => 3,
            RoomError::Connection(_) | RoomError::Signaling(_) => 4,
            RoomError::Internal(_) => 5,
        }
    }

    /// Returns a consumer-safe message (no transport or internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RoomError::InvalidState(_) => "Room is not connected".to_string(),
            RoomError::AlreadyPublishing => "A stream is already being published".to_string(),
            RoomError::DuplicateSubscription(_) => "Already subscribed to this stream".to_string(),
            RoomError::UnknownStream(_) => "Not subscribed to this stream".to_string(),
            RoomError::Connection(_) | RoomError::Signaling(_) => {
                "Could not reach the room".to_string()
            }
            RoomError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// Failure reported by a `SignalingPort` when an outbound request cannot be
/// queued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// The channel is closed and accepts no more requests.
    #[error("signaling channel closed")]
    Closed,

    /// The transport rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Registry invariant violation.
///
/// The coordinator pre-checks every mutation, so this indicates a coordinator
/// logic defect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// A second publish session would be inserted.
    #[error("publish slot already occupied")]
    PublishSlotOccupied,

    /// A second session for the same stream id would be inserted.
    #[error("{role} session for stream {stream_id} already registered")]
    DuplicateStream {
        stream_id: StreamId,
        role: SessionRole,
    },
}

/// Classification of asynchronous errors delivered via `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The signaling channel failed to connect or dropped room-wide.
    Connection,
    /// A single publish or subscribe session failed.
    Session,
}

impl ErrorKind {
    /// Returns the kind as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Session => "session",
        }
    }
}
