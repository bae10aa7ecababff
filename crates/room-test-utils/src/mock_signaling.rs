//! Mock signaling transport.
//!
//! `MockSignalingPort` records every outbound request and can be configured
//! to:
//! - Answer `Connect` with `connected(room_id)` or `connectFailed(reason)`
//! - Refuse sends, as a closed transport would
//!
//! Answers are pushed into the inbound event channel returned by
//! [`MockSignalingPort::build`], which a test feeds to
//! `spawn_signaling_pump`.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockSignalingPort;
//!
//! let (port, events) = MockSignalingPort::builder()
//!     .accept_connect("room123")
//!     .build();
//!
//! // Hand `port` to RoomActor::spawn and `events` to spawn_signaling_pump...
//! assert_eq!(port.request_kinds(), vec!["connect"]);
//! ```

use common::types::RoomId;
use room_coordinator::errors::SignalingError;
use room_coordinator::signaling::{SignalingEvent, SignalingPort, SignalingRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Inbound event channel capacity for the mock transport.
pub const MOCK_EVENT_BUFFER: usize = 64;

/// How the mock answers a `Connect` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Leave the answer to the test.
    #[default]
    Manual,
    /// Answer with `connected(room_id)`.
    Accept(RoomId),
    /// Answer with `connectFailed(reason)`.
    Reject(String),
}

/// Recording signaling port. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSignalingPort {
    requests: Arc<Mutex<Vec<SignalingRequest>>>,
    fail_sends: Arc<AtomicBool>,
    connect: ConnectBehavior,
    events: mpsc::Sender<SignalingEvent>,
}

impl MockSignalingPort {
    /// Create a new MockSignalingPort builder.
    #[must_use]
    pub fn builder() -> MockSignalingPortBuilder {
        MockSignalingPortBuilder::default()
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<SignalingRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Kinds of every request sent so far, in order.
    #[must_use]
    pub fn request_kinds(&self) -> Vec<&'static str> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(SignalingRequest::kind)
            .collect()
    }

    /// Number of requests of `kind` sent so far.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }

    /// Make subsequent sends fail with `SignalingError::Closed`.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Sender for injecting inbound events, as the transport would.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<SignalingEvent> {
        self.events.clone()
    }

    fn answer_connect(&self) {
        let event = match &self.connect {
            ConnectBehavior::Manual => return,
            ConnectBehavior::Accept(room_id) => SignalingEvent::Connected {
                room_id: room_id.clone(),
            },
            ConnectBehavior::Reject(reason) => SignalingEvent::ConnectFailed {
                reason: reason.clone(),
            },
        };
        self.events
            .try_send(event)
            .expect("mock transport event buffer full or pump gone");
    }
}

impl SignalingPort for MockSignalingPort {
    fn send(&mut self, request: SignalingRequest) -> Result<(), SignalingError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SignalingError::Closed);
        }

        let is_connect = matches!(request, SignalingRequest::Connect { .. });
        self.requests.lock().unwrap().push(request);
        if is_connect {
            self.answer_connect();
        }
        Ok(())
    }
}

/// Builder for MockSignalingPort configuration.
#[derive(Debug, Default)]
pub struct MockSignalingPortBuilder {
    connect: ConnectBehavior,
    fail_sends: bool,
}

impl MockSignalingPortBuilder {
    /// Answer `Connect` with `connected(room_id)`.
    #[must_use]
    pub fn accept_connect(mut self, room_id: impl Into<String>) -> Self {
        self.connect = ConnectBehavior::Accept(RoomId::from(room_id.into()));
        self
    }

    /// Answer `Connect` with `connectFailed(reason)`.
    #[must_use]
    pub fn reject_connect(mut self, reason: impl Into<String>) -> Self {
        self.connect = ConnectBehavior::Reject(reason.into());
        self
    }

    /// Fail every send from the start.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Build the port and the receiver of its inbound events.
    #[must_use]
    pub fn build(self) -> (MockSignalingPort, mpsc::Receiver<SignalingEvent>) {
        let (events, rx) = mpsc::channel(MOCK_EVENT_BUFFER);
        let port = MockSignalingPort {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_sends: Arc::new(AtomicBool::new(self.fail_sends)),
            connect: self.connect,
            events,
        };
        (port, rx)
    }
}
