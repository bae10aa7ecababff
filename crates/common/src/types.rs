//! Common data types for the room coordinator.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier the signaling server assigns to a room once connected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a media stream announced by signaling.
///
/// Stream ids are opaque server strings (often large decimal numbers), so
/// they are kept as text rather than parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the recording a server started for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub String);

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Non-owning reference to a peer-connection client.
///
/// Handed out through `subscribed`/`ready` notifications and valid until the
/// matching `unsubscribed`, `error` or room-closed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientHandle(pub Uuid);

impl ClientHandle {
    /// Create a new random client handle
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stream as announced by signaling.
///
/// Serialized the way stream lists arrive from the server:
///
/// ```json
/// { "id": "268365939846262340", "audio": true, "video": true, "data": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream identifier.
    #[serde(rename = "id")]
    pub stream_id: StreamId,
    /// Whether the stream carries audio.
    #[serde(rename = "audio", default, deserialize_with = "flag")]
    pub has_audio: bool,
    /// Whether the stream carries video.
    #[serde(rename = "video", default, deserialize_with = "flag")]
    pub has_video: bool,
    /// Whether the stream carries a data channel.
    #[serde(rename = "data", default, deserialize_with = "flag")]
    pub has_data: bool,
}

impl StreamDescriptor {
    /// Audio and video, no data channel.
    #[must_use]
    pub fn audio_video(stream_id: impl Into<StreamId>) -> Self {
        Self {
            stream_id: stream_id.into(),
            has_audio: true,
            has_video: true,
            has_data: false,
        }
    }
}

/// Media flags arrive either as booleans or as `0`/`1`.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}
