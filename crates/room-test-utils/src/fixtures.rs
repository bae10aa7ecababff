//! Pre-configured test data for room coordinator tests.

use common::types::{StreamDescriptor, StreamId};
use room_coordinator::config::Config;
use room_coordinator::signaling::{Credentials, PublishOptions};

/// Encoded token shaped like the ones the room server hands out.
pub const TEST_TOKEN: &str = "eyJ0b2tlbklkIjoiNTU5ZWU1MGUiLCJob3N0IjoibG9jYWxob3N0In0=";

/// Config with a fixed coordinator id and default everything else.
#[must_use]
pub fn test_config(coordinator_id: impl Into<String>) -> Config {
    Config {
        coordinator_id: coordinator_id.into(),
        ..Config::default()
    }
}

/// Credentials wrapping [`TEST_TOKEN`].
#[must_use]
pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_TOKEN)
}

/// Local stream with audio and video.
#[must_use]
pub fn local_stream() -> StreamDescriptor {
    StreamDescriptor::audio_video("local")
}

/// Remote stream descriptor with audio and video.
#[must_use]
pub fn remote_stream(id: &str) -> StreamDescriptor {
    StreamDescriptor::audio_video(id)
}

/// Publish options with a data channel.
#[must_use]
pub fn data_enabled() -> PublishOptions {
    PublishOptions {
        data_enabled: true,
        record: false,
    }
}

/// Shorthand for `StreamId::from`.
#[must_use]
pub fn sid(id: &str) -> StreamId {
    StreamId::from(id)
}
