//! # Room Test Utilities
//!
//! Shared test utilities for the room coordinator.
//!
//! - `mock_signaling` - Recording `SignalingPort` that can auto-answer connects
//! - `harness` - `TestRoom`, a room actor wired to the mock transport
//! - `fixtures` - Config, credentials and stream descriptors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     init_test_tracing();
//!     let mut room = TestRoom::accepting();
//!     room.connect().await;
//!
//!     room.handle.subscribe(sid("s1")).await.unwrap();
//!     assert_eq!(room.port.request_kinds(), vec!["connect", "subscribe"]);
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod mock_signaling;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
pub use mock_signaling::*;

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber filtered by `RUST_LOG` (default `room=debug`).
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
