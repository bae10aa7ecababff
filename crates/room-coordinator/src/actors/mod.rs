//! Actor model implementation for the room coordinator.
//!
//! ```text
//! SignalingPort (events) ──┐
//!                          ├──> mpsc mailbox ──> RoomActor ──> SignalingPort (requests)
//! ClientEventReporter ─────┤                        │
//! RoomHandle (operations) ─┘                        ├──> SessionRegistry (owned)
//!                                                   └──> NotificationSink
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single writer**: only the `RoomActor` task touches the registry and room state
//! - **One mailbox**: signaling events, client events and caller operations share one
//!   ordered queue
//! - **Sessions owned by value**: client handles given to the consumer are non-owning ids
//! - **CancellationToken**: cancelling closes the room before the task exits
//!
//! # Modules
//!
//! - [`room`] - `RoomActor`, `RoomHandle`, `ClientEventReporter`
//! - [`registry`] - `SessionRegistry`, the stream-id index of sessions
//! - [`session`] - `PeerSession` and its state machine
//! - [`messages`] - Mailbox message types and `RoomSnapshot`
//! - [`metrics`] - Mailbox monitoring and room counters

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;
pub mod session;

// Re-export primary types
pub use messages::*;
pub use self::metrics::{MailboxMonitor, RoomMetrics, RoomMetricsSnapshot};
pub use registry::SessionRegistry;
pub use room::{ClientEventReporter, RoomActor, RoomHandle};
pub use session::{PeerSession, SessionInfo, SessionRole, SessionState};
