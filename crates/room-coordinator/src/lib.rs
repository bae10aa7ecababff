//! Room Coordinator Library
//!
//! Session coordinator for a real-time media room: one signaling channel
//! multiplexed across one local publish session and any number of remote
//! subscribe sessions, each backed by its own peer-connection client.
//!
//! - Translates loosely-ordered signaling events into per-stream session
//!   lifecycle transitions
//! - Bridges client readiness and failure back into room notifications
//! - Enforces one publish session and unique subscriptions per stream
//!
//! # Architecture
//!
//! ```text
//! RoomHandle ──> RoomActor ──> SignalingPort
//!                   │
//!                   ├── SessionRegistry
//!                   │   ├── publish slot (0..1 PeerSession)
//!                   │   └── subscribers (StreamId -> PeerSession)
//!                   └──> NotificationSink
//! ```
//!
//! The signaling transport and the media engine live outside this crate. The
//! transport implements [`signaling::SignalingPort`] and feeds inbound events
//! through [`signaling::spawn_signaling_pump`] or
//! [`actors::RoomHandle::signaling_event`].
//!
//! # Modules
//!
//! - [`actors`] - Room actor, session registry and session state machine
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with stable error codes
//! - [`notifications`] - Consumer-facing notification sink
//! - [`observability`] - Prometheus metrics
//! - [`signaling`] - Signaling port boundary and event pump

pub mod actors;
pub mod config;
pub mod errors;
pub mod notifications;
pub mod observability;
pub mod signaling;
