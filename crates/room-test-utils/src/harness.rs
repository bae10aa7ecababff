//! Test harness wiring a room actor to the mock transport.
//!
//! `TestRoom` spawns a `RoomActor` with a [`MockSignalingPort`] and a
//! `ChannelSink`, plus the signaling pump that forwards the mock's inbound
//! events (such as auto-answered connects) into the room mailbox.

use common::types::{ClientHandle, RoomId, StreamId};
use room_coordinator::actors::{RoomActor, RoomHandle, RoomSnapshot};
use room_coordinator::config::Config;
use room_coordinator::notifications::{notification_channel, RoomNotification};
use room_coordinator::signaling::{spawn_signaling_pump, SignalingEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::fixtures::{test_config, test_credentials};
use crate::mock_signaling::{MockSignalingPort, MockSignalingPortBuilder};

/// How long `next_notification` waits before failing the test.
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestRoom {
    pub handle: RoomHandle,
    pub port: MockSignalingPort,
    pub notifications: mpsc::UnboundedReceiver<RoomNotification>,
    pub cancel_token: CancellationToken,
    pub actor_task: JoinHandle<()>,
    pub pump_task: JoinHandle<()>,
}

impl TestRoom {
    /// Room whose transport accepts connects with `room123`.
    pub fn accepting() -> Self {
        Self::with_port(MockSignalingPort::builder().accept_connect("room123"))
    }

    /// Room built from a configured mock transport.
    pub fn with_port(builder: MockSignalingPortBuilder) -> Self {
        Self::with_config(&test_config("room-test"), builder)
    }

    pub fn with_config(config: &Config, builder: MockSignalingPortBuilder) -> Self {
        let (port, events) = builder.build();
        let (sink, notifications) = notification_channel();
        let cancel_token = CancellationToken::new();

        let (handle, actor_task) =
            RoomActor::spawn(config, port.clone(), sink, cancel_token.clone());
        let pump_task = spawn_signaling_pump(events, handle.clone());

        Self {
            handle,
            port,
            notifications,
            cancel_token,
            actor_task,
            pump_task,
        }
    }

    /// Connect and return the assigned room id. Needs an accepting transport.
    pub async fn connect(&self) -> RoomId {
        self.handle
            .connect(test_credentials())
            .await
            .expect("connect should succeed")
    }

    /// Deliver an inbound signaling event in mailbox order.
    pub async fn emit(&self, event: SignalingEvent) {
        self.handle
            .signaling_event(event)
            .await
            .expect("room actor should accept events");
    }

    /// Deliver `subscribeAck(stream_id, client)`.
    pub async fn ack_subscribe(&self, stream_id: &str, client: ClientHandle) {
        self.emit(SignalingEvent::SubscribeAck {
            stream_id: StreamId::from(stream_id),
            client,
        })
        .await;
    }

    /// Report client readiness for `stream_id`.
    pub async fn client_ready(&self, stream_id: &str) {
        self.handle
            .client_reporter(StreamId::from(stream_id))
            .ready()
            .await
            .expect("room actor should accept client events");
    }

    /// Round-trip the mailbox so every earlier message has been handled.
    pub async fn state(&self) -> RoomSnapshot {
        self.handle
            .get_state()
            .await
            .expect("room actor should answer get_state")
    }

    /// Next notification, failing the test after [`NOTIFICATION_TIMEOUT`].
    pub async fn next_notification(&mut self) -> RoomNotification {
        tokio::time::timeout(NOTIFICATION_TIMEOUT, self.notifications.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    /// Drain every notification already delivered.
    pub async fn drain_notifications(&mut self) -> Vec<RoomNotification> {
        // Flush the mailbox first so nothing is still in flight.
        let _ = self.state().await;
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }

    /// Cancel the room and wait for both tasks to finish.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        self.actor_task.await.expect("room actor task panicked");
        self.pump_task.await.expect("signaling pump task panicked");
    }
}
