//! `RoomActor` - the single writer for one room.
//!
//! The actor owns the `SessionRegistry`, the room state and both outbound
//! edges (the `SignalingPort` and the `NotificationSink`). Caller operations,
//! signaling events and client events are serialized through its mailbox and
//! handled strictly in arrival order.
//!
//! # Stale events
//!
//! Acks and client events are matched against the registry, never trusted on
//! their own. Anything that no longer matches (an ack for a session that was
//! already unsubscribed, a recording ack racing an unsubscribe, a ready for a
//! session that is not negotiating) is logged at debug and counted in
//! `room_stale_events_total`.
//!
//! # Unsubscribe
//!
//! A session still `Requested` is removed at once and `on_unsubscribed` fires
//! immediately. A `Negotiating`/`Active` session is only marked pending; the
//! matching `unsubscribeAck` removes it.

use common::types::{ClientHandle, RoomId, StreamDescriptor, StreamId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::errors::{ErrorKind, RoomError};
use crate::notifications::{NotificationSink, RoomNotification};
use crate::observability::metrics as room_metrics;
use crate::signaling::{
    Credentials, PublishOptions, SignalingEvent, SignalingPort, SignalingRequest,
};

use super::messages::{ClientEvent, ClientEventKind, RoomMessage, RoomSnapshot, RoomState};
use super::metrics::{MailboxMonitor, RoomMetrics, RoomMetricsSnapshot};
use super::registry::SessionRegistry;
use super::session::{PeerSession, SessionRole, SessionState};

/// Handle to a `RoomActor`.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    coordinator_id: String,
    default_options: PublishOptions,
    mailbox: Arc<MailboxMonitor>,
    metrics: Arc<RoomMetrics>,
}

impl RoomHandle {
    /// Get the coordinator ID.
    #[must_use]
    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    /// Open the signaling channel and wait for the room identity.
    ///
    /// Returns immediately with the current identity when already connected.
    /// A second call while a connect is in flight waits for the same outcome.
    ///
    /// # Errors
    ///
    /// - `RoomError::Connection` if the port reports `connectFailed`
    /// - `RoomError::InvalidState` if the room is closed
    /// - `RoomError::Signaling` if the connect request cannot be queued
    pub async fn connect(&self, credentials: Credentials) -> Result<RoomId, RoomError> {
        self.request_connect(Some(credentials)).await
    }

    /// Connect with the access token from `Config`.
    ///
    /// # Errors
    ///
    /// As [`RoomHandle::connect`], plus `RoomError::InvalidState` when no
    /// token was configured.
    pub async fn connect_configured(&self) -> Result<RoomId, RoomError> {
        self.request_connect(None).await
    }

    async fn request_connect(&self, credentials: Option<Credentials>) -> Result<RoomId, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Connect {
            credentials,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Publish the local stream.
    ///
    /// Returns the client handle the coordinator minted for the publish
    /// session. Completion is reported through `on_published`.
    ///
    /// # Errors
    ///
    /// - `RoomError::InvalidState` unless connected
    /// - `RoomError::AlreadyPublishing` if a publish session exists
    /// - `RoomError::Signaling` if the request cannot be queued
    pub async fn publish(
        &self,
        stream: StreamDescriptor,
        options: PublishOptions,
    ) -> Result<ClientHandle, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Publish {
            stream,
            options,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Publish with the configured recording and data-channel defaults.
    ///
    /// # Errors
    ///
    /// As [`RoomHandle::publish`].
    pub async fn publish_with_defaults(
        &self,
        stream: StreamDescriptor,
    ) -> Result<ClientHandle, RoomError> {
        self.publish(stream, self.default_options).await
    }

    /// Subscribe to a remote stream.
    ///
    /// # Errors
    ///
    /// - `RoomError::InvalidState` unless connected
    /// - `RoomError::DuplicateSubscription` if a session for the stream exists
    /// - `RoomError::Signaling` if the request cannot be queued
    pub async fn subscribe(&self, stream_id: StreamId) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Subscribe {
            stream_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Stop consuming a remote stream.
    ///
    /// # Errors
    ///
    /// - `RoomError::UnknownStream` if no subscribe session exists
    /// - `RoomError::Signaling` if the request cannot be queued
    pub async fn unsubscribe(&self, stream_id: StreamId) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Unsubscribe {
            stream_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Deliver an inbound signaling event.
    ///
    /// # Errors
    ///
    /// `RoomError::Internal` if the actor is gone.
    pub async fn signaling_event(&self, event: SignalingEvent) -> Result<(), RoomError> {
        self.send(RoomMessage::Signaling(event)).await
    }

    /// Reporter a peer-connection client uses for the session of `stream_id`.
    #[must_use]
    pub fn client_reporter(&self, stream_id: StreamId) -> ClientEventReporter {
        ClientEventReporter {
            stream_id,
            room: self.clone(),
        }
    }

    /// Get current room state.
    ///
    /// # Errors
    ///
    /// `RoomError::Internal` if the actor is gone.
    pub async fn get_state(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::GetState { respond_to: tx }).await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Leave the room. Idempotent once closed.
    ///
    /// # Errors
    ///
    /// `RoomError::Internal` if the actor is gone.
    pub async fn close(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Close {
            reason: reason.into(),
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Session and event counters.
    #[must_use]
    pub fn metrics(&self) -> RoomMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Current mailbox depth.
    #[must_use]
    pub fn mailbox_depth(&self) -> usize {
        self.mailbox.current_depth()
    }

    /// Cancel the room actor. The room closes before the task exits.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Resolves once the actor is cancelled.
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await;
    }

    async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(message).await {
            self.mailbox.record_drop();
            return Err(RoomError::Internal(format!("channel send failed: {e}")));
        }
        Ok(())
    }
}

/// Reports lifecycle events of one session's peer-connection client.
#[derive(Clone)]
pub struct ClientEventReporter {
    stream_id: StreamId,
    room: RoomHandle,
}

impl ClientEventReporter {
    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Negotiation finished.
    ///
    /// # Errors
    ///
    /// `RoomError::Internal` if the room actor is gone.
    pub async fn ready(&self) -> Result<(), RoomError> {
        self.report(ClientEventKind::Ready).await
    }

    /// The client failed.
    ///
    /// # Errors
    ///
    /// `RoomError::Internal` if the room actor is gone.
    pub async fn failed(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        self.report(ClientEventKind::Failed {
            reason: reason.into(),
        })
        .await
    }

    async fn report(&self, kind: ClientEventKind) -> Result<(), RoomError> {
        self.room
            .send(RoomMessage::Client(ClientEvent {
                stream_id: self.stream_id.clone(),
                kind,
            }))
            .await
    }
}

/// The room actor.
pub struct RoomActor<P: SignalingPort, S: NotificationSink> {
    coordinator_id: String,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    port: P,
    sink: S,
    registry: SessionRegistry,
    state: RoomState,
    /// Server-assigned identity, set once on `connected`.
    room_id: Option<RoomId>,
    /// Callers waiting on an in-flight connect.
    connect_waiters: Vec<oneshot::Sender<Result<RoomId, RoomError>>>,
    /// Token from `Config`, used by `connect_configured`.
    configured_credentials: Option<Credentials>,
    created_at: i64,
    metrics: Arc<RoomMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl<P: SignalingPort, S: NotificationSink> RoomActor<P, S> {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    ///
    /// # Arguments
    ///
    /// * `config` - Coordinator identity, mailbox capacity and publish defaults
    /// * `port` - Outbound half of the signaling transport
    /// * `sink` - Consumer of room notifications
    /// * `cancel_token` - Cancelling it closes the room and stops the actor
    pub fn spawn(
        config: &Config,
        port: P,
        sink: S,
        cancel_token: CancellationToken,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.mailbox_capacity.max(1));
        let mailbox = MailboxMonitor::new(config.coordinator_id.clone());
        let metrics = RoomMetrics::new();

        let actor = Self {
            coordinator_id: config.coordinator_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            port,
            sink,
            registry: SessionRegistry::new(),
            state: RoomState::Disconnected,
            room_id: None,
            connect_waiters: Vec::new(),
            configured_credentials: config.credentials(),
            created_at: chrono::Utc::now().timestamp(),
            metrics: Arc::clone(&metrics),
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            cancel_token,
            coordinator_id: config.coordinator_id.clone(),
            default_options: config.default_publish_options(),
            mailbox,
            metrics,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "room.actor", fields(coordinator_id = %self.coordinator_id))]
    async fn run(mut self) {
        info!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.actor",
                        coordinator_id = %self.coordinator_id,
                        "RoomActor received cancellation signal"
                    );
                    self.close_room("cancelled");
                    break;
                }

                msg = self.receiver.recv() => {
                    if let Some(message) = msg {
                        let kind = message.kind();
                        let started = Instant::now();
                        self.handle_message(message);
                        self.mailbox.record_dequeue();
                        self.metrics.record_event_processed();
                        room_metrics::record_event_latency(kind, started.elapsed());
                        self.check_invariants();
                    } else {
                        info!(
                            target: "room.actor",
                            coordinator_id = %self.coordinator_id,
                            "RoomActor channel closed, exiting"
                        );
                        self.close_room("all handles dropped");
                        break;
                    }
                }
            }
        }

        info!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Connect {
                credentials,
                respond_to,
            } => self.handle_connect(credentials, respond_to),

            RoomMessage::Publish {
                stream,
                options,
                respond_to,
            } => {
                let result = self.handle_publish(stream, options);
                let _ = respond_to.send(result);
            }

            RoomMessage::Subscribe {
                stream_id,
                respond_to,
            } => {
                let result = self.handle_subscribe(stream_id);
                let _ = respond_to.send(result);
            }

            RoomMessage::Unsubscribe {
                stream_id,
                respond_to,
            } => {
                let result = self.handle_unsubscribe(stream_id);
                let _ = respond_to.send(result);
            }

            RoomMessage::Signaling(event) => self.handle_signaling(event),

            RoomMessage::Client(event) => self.handle_client(event),

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }

            RoomMessage::Close { reason, respond_to } => {
                self.close_room(&reason);
                let _ = respond_to.send(Ok(()));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Caller operations
    // ------------------------------------------------------------------------

    fn handle_connect(
        &mut self,
        credentials: Option<Credentials>,
        respond_to: oneshot::Sender<Result<RoomId, RoomError>>,
    ) {
        match self.state {
            RoomState::Connected => {
                debug!(
                    target: "room.actor",
                    coordinator_id = %self.coordinator_id,
                    "Already connected, connect is a no-op"
                );
                let result = self.room_id.clone().ok_or_else(|| {
                    RoomError::Internal("connected room has no identity".to_string())
                });
                let _ = respond_to.send(result);
            }
            RoomState::Closed => {
                let _ = respond_to.send(Err(RoomError::InvalidState("room is closed".to_string())));
            }
            RoomState::Disconnected => {
                if !self.connect_waiters.is_empty() {
                    debug!(
                        target: "room.actor",
                        coordinator_id = %self.coordinator_id,
                        waiters = self.connect_waiters.len(),
                        "Connect already in flight, joining"
                    );
                    self.connect_waiters.push(respond_to);
                    return;
                }

                let Some(credentials) = credentials.or_else(|| self.configured_credentials.clone())
                else {
                    let _ = respond_to.send(Err(RoomError::InvalidState(
                        "no credentials configured".to_string(),
                    )));
                    return;
                };

                match self.port.send(SignalingRequest::Connect { credentials }) {
                    Ok(()) => {
                        info!(
                            target: "room.actor",
                            coordinator_id = %self.coordinator_id,
                            "Connect requested"
                        );
                        self.connect_waiters.push(respond_to);
                    }
                    Err(e) => {
                        warn!(
                            target: "room.signaling",
                            coordinator_id = %self.coordinator_id,
                            error = %e,
                            "Failed to send connect request"
                        );
                        let _ = respond_to.send(Err(e.into()));
                    }
                }
            }
        }
    }

    fn handle_publish(
        &mut self,
        stream: StreamDescriptor,
        options: PublishOptions,
    ) -> Result<ClientHandle, RoomError> {
        self.require_connected()?;
        if self.registry.publish_session().is_some() {
            return Err(RoomError::AlreadyPublishing);
        }

        let client = ClientHandle::new();
        let stream_id = stream.stream_id.clone();
        self.insert_session(PeerSession::publish(stream_id.clone(), client))?;

        if let Err(e) = self.port.send(SignalingRequest::Publish { stream, options }) {
            warn!(
                target: "room.signaling",
                coordinator_id = %self.coordinator_id,
                error = %e,
                "Failed to send publish request, rolling back"
            );
            if self.registry.take_publish().is_some() {
                self.metrics.session_removed(SessionRole::Publish);
            }
            return Err(e.into());
        }

        info!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            stream_id = %stream_id,
            client = %client,
            data_enabled = options.data_enabled,
            record = options.record,
            "Publish requested"
        );
        Ok(client)
    }

    fn handle_subscribe(&mut self, stream_id: StreamId) -> Result<(), RoomError> {
        self.require_connected()?;
        if self.registry.subscriber(&stream_id).is_some() {
            return Err(RoomError::DuplicateSubscription(stream_id));
        }

        self.insert_session(PeerSession::subscribe(stream_id.clone()))?;

        if let Err(e) = self.port.send(SignalingRequest::Subscribe {
            stream_id: stream_id.clone(),
        }) {
            warn!(
                target: "room.signaling",
                coordinator_id = %self.coordinator_id,
                stream_id = %stream_id,
                error = %e,
                "Failed to send subscribe request, rolling back"
            );
            if self.registry.remove(&stream_id).is_some() {
                self.metrics.session_removed(SessionRole::Subscribe);
            }
            return Err(e.into());
        }

        debug!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            stream_id = %stream_id,
            "Subscribe requested"
        );
        Ok(())
    }

    fn handle_unsubscribe(&mut self, stream_id: StreamId) -> Result<(), RoomError> {
        let Some(session) = self.registry.subscriber(&stream_id) else {
            return Err(RoomError::UnknownStream(stream_id));
        };

        if session.is_unsubscribe_pending() {
            debug!(
                target: "room.actor",
                coordinator_id = %self.coordinator_id,
                stream_id = %stream_id,
                "Unsubscribe already pending"
            );
            return Ok(());
        }
        let awaiting_ack = session.state() == SessionState::Requested;

        self.port.send(SignalingRequest::Unsubscribe {
            stream_id: stream_id.clone(),
        })?;

        if awaiting_ack {
            // No ack yet: cancel outright, a late subscribeAck is stale.
            self.close_subscriber(&stream_id);
        } else if let Some(session) = self.registry.subscriber_mut(&stream_id) {
            session.mark_unsubscribe_pending();
            debug!(
                target: "room.actor",
                coordinator_id = %self.coordinator_id,
                stream_id = %stream_id,
                "Unsubscribe requested, waiting for ack"
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------------

    fn handle_signaling(&mut self, event: SignalingEvent) {
        room_metrics::record_signaling_event(event.kind());

        if self.state == RoomState::Closed {
            self.discard_stale(event.kind(), None, "room closed");
            return;
        }

        match event {
            SignalingEvent::Connected { room_id } => self.on_connected(room_id),

            SignalingEvent::ConnectFailed { reason } => self.on_connect_failed(reason),

            SignalingEvent::PublishAck { stream_id } => {
                let acked = match self.registry.publish_session_mut() {
                    Some(session) if session.state() == SessionState::Requested => {
                        session.bind_stream_id(stream_id.clone());
                        session.transition(SessionState::Negotiating)
                    }
                    _ => false,
                };
                if acked {
                    info!(
                        target: "room.actor",
                        coordinator_id = %self.coordinator_id,
                        stream_id = %stream_id,
                        "Publish acknowledged"
                    );
                    self.notify(RoomNotification::Published { stream_id });
                } else {
                    self.discard_stale("publish_ack", Some(&stream_id), "no pending publish");
                }
            }

            SignalingEvent::SubscribeAck { stream_id, client } => {
                let acked = match self.registry.subscriber_mut(&stream_id) {
                    Some(session) if session.state() == SessionState::Requested => {
                        session.bind_client(client);
                        session.transition(SessionState::Negotiating)
                    }
                    _ => false,
                };
                if acked {
                    self.notify(RoomNotification::Subscribed { stream_id, client });
                } else {
                    self.discard_stale("subscribe_ack", Some(&stream_id), "no pending subscribe");
                }
            }

            SignalingEvent::UnsubscribeAck { stream_id } => {
                let pending = self
                    .registry
                    .subscriber(&stream_id)
                    .is_some_and(PeerSession::is_unsubscribe_pending);
                if pending {
                    self.close_subscriber(&stream_id);
                } else {
                    self.discard_stale(
                        "unsubscribe_ack",
                        Some(&stream_id),
                        "no pending unsubscribe",
                    );
                }
            }

            SignalingEvent::RecordingStarted {
                stream_id,
                recording_id,
            } => {
                if let Some(session) = self.registry.get_mut(&stream_id) {
                    session.set_recording_id(recording_id.clone());
                    self.notify(RoomNotification::RecordingStarted {
                        stream_id,
                        recording_id,
                    });
                } else {
                    // Recording acks may race an unsubscribe.
                    self.discard_stale("recording_started", Some(&stream_id), "unknown stream");
                }
            }

            SignalingEvent::StreamList { streams } => {
                debug!(
                    target: "room.signaling",
                    coordinator_id = %self.coordinator_id,
                    streams = streams.len(),
                    "Stream list received"
                );
                self.notify(RoomNotification::StreamList { streams });
            }

            SignalingEvent::StreamAdded { stream } => {
                self.notify(RoomNotification::StreamAdded { stream });
            }

            SignalingEvent::StreamRemoved { stream_id } => {
                if self.registry.subscriber(&stream_id).is_some() {
                    self.close_subscriber(&stream_id);
                }
                self.notify(RoomNotification::StreamRemoved { stream_id });
            }

            SignalingEvent::Error {
                stream_id: Some(stream_id),
                reason,
            } => self.fail_session(&stream_id, reason),

            SignalingEvent::Error {
                stream_id: None,
                reason,
            } => self.fail_room(reason),
        }
    }

    fn handle_client(&mut self, event: ClientEvent) {
        room_metrics::record_client_event(event.kind.as_str());

        if self.state == RoomState::Closed {
            self.discard_stale("client", Some(&event.stream_id), "room closed");
            return;
        }

        match event.kind {
            ClientEventKind::Ready => {
                let ready = match self.registry.get_mut(&event.stream_id) {
                    Some(session) if session.state() == SessionState::Negotiating => {
                        session.transition(SessionState::Active);
                        session.client()
                    }
                    _ => None,
                };
                if let Some(client) = ready {
                    info!(
                        target: "room.actor",
                        coordinator_id = %self.coordinator_id,
                        stream_id = %event.stream_id,
                        "Session active"
                    );
                    self.notify(RoomNotification::Ready {
                        stream_id: event.stream_id,
                        client,
                    });
                } else {
                    self.discard_stale("client_ready", Some(&event.stream_id), "not negotiating");
                }
            }
            ClientEventKind::Failed { reason } => self.fail_session(&event.stream_id, reason),
        }
    }

    fn on_connected(&mut self, room_id: RoomId) {
        if self.state != RoomState::Disconnected {
            self.discard_stale("connected", None, "already connected");
            return;
        }

        self.state = RoomState::Connected;
        self.room_id = Some(room_id.clone());
        info!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            room_id = %room_id,
            "Room connected"
        );

        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Ok(room_id.clone()));
        }
    }

    fn on_connect_failed(&mut self, reason: String) {
        if self.state != RoomState::Disconnected {
            self.discard_stale("connect_failed", None, "not connecting");
            return;
        }

        warn!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            reason = %reason,
            "Connect failed"
        );
        self.fail_connect_waiters(|| RoomError::Connection(reason.clone()));
        self.report_error(ErrorKind::Connection, None, reason);
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Error one session; siblings are unaffected.
    fn fail_session(&mut self, stream_id: &StreamId, reason: String) {
        let Some(mut session) = self.registry.remove(stream_id) else {
            self.discard_stale("error", Some(stream_id), "unknown stream");
            return;
        };

        session.transition(SessionState::Errored);
        self.metrics.session_removed(session.role());
        self.metrics.session_errored();
        warn!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            stream_id = %stream_id,
            role = %session.role(),
            reason = %reason,
            "Session failed"
        );
        self.report_error(ErrorKind::Session, Some(stream_id.clone()), reason);
    }

    /// Room-wide failure: every session errors and the room closes.
    fn fail_room(&mut self, reason: String) {
        warn!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            sessions = self.registry.len(),
            reason = %reason,
            "Room-wide signaling error, closing room"
        );

        let sessions = self.registry.drain();
        if sessions.is_empty() {
            self.report_error(ErrorKind::Connection, None, reason.clone());
        }
        for mut session in sessions {
            session.transition(SessionState::Errored);
            self.metrics.session_removed(session.role());
            self.metrics.session_errored();
            let stream_id = session.stream_id().clone();
            self.report_error(ErrorKind::Session, Some(stream_id), reason.clone());
        }

        self.fail_connect_waiters(|| RoomError::Connection(reason.clone()));
        self.state = RoomState::Closed;
        self.notify(RoomNotification::RoomClosed { reason });
    }

    /// Explicit close or cancellation. Idempotent.
    fn close_room(&mut self, reason: &str) {
        if self.state == RoomState::Closed {
            return;
        }

        let channel_open = self.state == RoomState::Connected || !self.connect_waiters.is_empty();
        if channel_open {
            if let Err(e) = self.port.send(SignalingRequest::Disconnect) {
                debug!(
                    target: "room.signaling",
                    coordinator_id = %self.coordinator_id,
                    error = %e,
                    "Disconnect request not sent"
                );
            }
        }

        for mut session in self.registry.drain() {
            session.transition(SessionState::Closed);
            self.metrics.session_removed(session.role());
        }

        self.fail_connect_waiters(|| RoomError::InvalidState("room is closed".to_string()));
        self.state = RoomState::Closed;
        info!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            reason = %reason,
            "Room closed"
        );
        self.notify(RoomNotification::RoomClosed {
            reason: reason.to_string(),
        });
    }

    /// Remove a subscribe session cleanly and emit `on_unsubscribed`.
    fn close_subscriber(&mut self, stream_id: &StreamId) {
        if let Some(mut session) = self.registry.remove(stream_id) {
            session.transition(SessionState::Closed);
            self.metrics.session_removed(SessionRole::Subscribe);
            debug!(
                target: "room.actor",
                coordinator_id = %self.coordinator_id,
                stream_id = %stream_id,
                "Subscribe session closed"
            );
            self.notify(RoomNotification::Unsubscribed {
                stream_id: stream_id.clone(),
            });
        }
    }

    fn fail_connect_waiters(&mut self, error: impl Fn() -> RoomError) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(error()));
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn require_connected(&self) -> Result<(), RoomError> {
        if self.state == RoomState::Connected {
            Ok(())
        } else {
            Err(RoomError::InvalidState(format!(
                "room is {}",
                self.state.as_str()
            )))
        }
    }

    fn insert_session(&mut self, session: PeerSession) -> Result<(), RoomError> {
        let role = session.role();
        self.registry.insert(session).map_err(|e| {
            error!(
                target: "room.registry",
                coordinator_id = %self.coordinator_id,
                error = %e,
                "Registry rejected a pre-checked insert"
            );
            RoomError::Internal(format!("registry conflict: {e}"))
        })?;
        self.metrics.session_opened(role);
        Ok(())
    }

    fn notify(&mut self, notification: RoomNotification) {
        room_metrics::record_notification(notification.kind());
        notification.deliver(&mut self.sink);
    }

    fn report_error(&mut self, kind: ErrorKind, stream_id: Option<StreamId>, reason: String) {
        room_metrics::record_error(kind.as_str());
        self.notify(RoomNotification::Error {
            kind,
            stream_id,
            reason,
        });
    }

    fn discard_stale(&self, event: &str, stream_id: Option<&StreamId>, why: &str) {
        self.metrics.record_stale(event);
        debug!(
            target: "room.actor",
            coordinator_id = %self.coordinator_id,
            event,
            stream_id = stream_id.map(StreamId::as_str),
            why,
            "Discarding stale event"
        );
    }

    fn check_invariants(&self) {
        let holds = self.registry.invariants_hold();
        if !holds {
            error!(
                target: "room.registry",
                coordinator_id = %self.coordinator_id,
                "Session registry invariant violated"
            );
        }
        debug_assert!(holds, "session registry invariant violated");
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            coordinator_id: self.coordinator_id.clone(),
            room_id: self.room_id.clone(),
            state: self.state,
            publish_stream_id: self
                .registry
                .publish_session()
                .map(|p| p.stream_id().clone()),
            sessions: self.registry.iter().map(PeerSession::to_info).collect(),
            mailbox_depth: self.mailbox.current_depth(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::notifications::notification_channel;

    struct TestRoom {
        handle: RoomHandle,
        requests: mpsc::UnboundedReceiver<SignalingRequest>,
        notifications: mpsc::UnboundedReceiver<RoomNotification>,
        _task: JoinHandle<()>,
    }

    fn spawn_room() -> TestRoom {
        let config = Config {
            coordinator_id: "room-unit".to_string(),
            ..Config::default()
        };
        let (port, requests) = mpsc::unbounded_channel();
        let (sink, notifications) = notification_channel();
        let (handle, task) = RoomActor::spawn(&config, port, sink, CancellationToken::new());
        TestRoom {
            handle,
            requests,
            notifications,
            _task: task,
        }
    }

    async fn connect(room: &mut TestRoom) {
        let handle = room.handle.clone();
        let pending = tokio::spawn(async move { handle.connect(Credentials::new("tok")).await });
        assert!(matches!(
            room.requests.recv().await,
            Some(SignalingRequest::Connect { .. })
        ));
        room.handle
            .signaling_event(SignalingEvent::Connected {
                room_id: RoomId::from("room123"),
            })
            .await
            .unwrap();
        assert_eq!(pending.await.unwrap().unwrap(), RoomId::from("room123"));
    }

    #[tokio::test]
    async fn test_room_actor_spawn() {
        let room = spawn_room();

        assert_eq!(room.handle.coordinator_id(), "room-unit");
        assert!(!room.handle.is_cancelled());

        let state = room.handle.get_state().await.unwrap();
        assert_eq!(state.state, RoomState::Disconnected);
        assert!(state.room_id.is_none());

        room.handle.cancel();
        assert!(room.handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let room = spawn_room();

        let result = room.handle.subscribe(StreamId::from("s1")).await;
        assert!(matches!(result, Err(RoomError::InvalidState(_))));

        let result = room
            .handle
            .publish(StreamDescriptor::audio_video("local"), PublishOptions::default())
            .await;
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_connect_configured_without_token_fails() {
        let room = spawn_room();

        let result = room.handle.connect_configured().await;
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_connect_then_connected_state() {
        let mut room = spawn_room();
        connect(&mut room).await;

        let state = room.handle.get_state().await.unwrap();
        assert_eq!(state.state, RoomState::Connected);
        assert_eq!(state.room_id, Some(RoomId::from("room123")));

        // Second connect is answered from state without a new request.
        let again = room.handle.connect(Credentials::new("tok")).await.unwrap();
        assert_eq!(again, RoomId::from("room123"));
        assert!(room.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_failed_reports_connection_error() {
        let mut room = spawn_room();
        let handle = room.handle.clone();
        let pending = tokio::spawn(async move { handle.connect(Credentials::new("tok")).await });
        room.requests.recv().await.unwrap();

        room.handle
            .signaling_event(SignalingEvent::ConnectFailed {
                reason: "token expired".to_string(),
            })
            .await
            .unwrap();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(RoomError::Connection(ref r)) if r == "token expired"));
        assert_eq!(
            room.notifications.recv().await.unwrap(),
            RoomNotification::Error {
                kind: ErrorKind::Connection,
                stream_id: None,
                reason: "token expired".to_string(),
            }
        );
        let state = room.handle.get_state().await.unwrap();
        assert_eq!(state.state, RoomState::Disconnected);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_stream() {
        let mut room = spawn_room();
        connect(&mut room).await;

        let result = room.handle.unsubscribe(StreamId::from("nope")).await;
        assert!(matches!(result, Err(RoomError::UnknownStream(ref id)) if id.as_str() == "nope"));
    }

    #[tokio::test]
    async fn test_unsubscribe_requested_session_cancels_immediately() {
        let mut room = spawn_room();
        connect(&mut room).await;

        room.handle.subscribe(StreamId::from("s1")).await.unwrap();
        room.handle.unsubscribe(StreamId::from("s1")).await.unwrap();

        assert_eq!(
            room.notifications.recv().await.unwrap(),
            RoomNotification::Unsubscribed {
                stream_id: StreamId::from("s1")
            }
        );

        // Late subscribe ack is stale.
        room.handle
            .signaling_event(SignalingEvent::SubscribeAck {
                stream_id: StreamId::from("s1"),
                client: ClientHandle::new(),
            })
            .await
            .unwrap();
        let state = room.handle.get_state().await.unwrap();
        assert!(state.sessions.is_empty());
        assert_eq!(room.handle.metrics().stale_events, 1);
        assert!(room.notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_active_waits_for_ack() {
        let mut room = spawn_room();
        connect(&mut room).await;
        let client = ClientHandle::new();

        room.handle.subscribe(StreamId::from("s1")).await.unwrap();
        room.handle
            .signaling_event(SignalingEvent::SubscribeAck {
                stream_id: StreamId::from("s1"),
                client,
            })
            .await
            .unwrap();
        room.handle.unsubscribe(StreamId::from("s1")).await.unwrap();
        // Repeat is idempotent.
        room.handle.unsubscribe(StreamId::from("s1")).await.unwrap();

        let state = room.handle.get_state().await.unwrap();
        let session = state.session(&StreamId::from("s1")).unwrap();
        assert!(session.unsubscribe_pending);
        assert_eq!(session.state, SessionState::Negotiating);

        room.handle
            .signaling_event(SignalingEvent::UnsubscribeAck {
                stream_id: StreamId::from("s1"),
            })
            .await
            .unwrap();

        assert_eq!(room.notifications.recv().await.unwrap().kind(), "subscribed");
        assert_eq!(
            room.notifications.recv().await.unwrap(),
            RoomNotification::Unsubscribed {
                stream_id: StreamId::from("s1")
            }
        );

        // Exactly one unsubscribe request was sent.
        let mut unsubscribes = 0;
        while let Ok(request) = room.requests.try_recv() {
            if matches!(request, SignalingRequest::Unsubscribe { .. }) {
                unsubscribes += 1;
            }
        }
        assert_eq!(unsubscribes, 1);
    }

    #[tokio::test]
    async fn test_client_ready_outside_negotiating_is_discarded() {
        let mut room = spawn_room();
        connect(&mut room).await;

        room.handle.subscribe(StreamId::from("s1")).await.unwrap();
        room.handle
            .client_reporter(StreamId::from("s1"))
            .ready()
            .await
            .unwrap();

        let state = room.handle.get_state().await.unwrap();
        assert_eq!(
            state.session(&StreamId::from("s1")).unwrap().state,
            SessionState::Requested
        );
        assert!(room.notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recording_for_unknown_stream_is_not_fatal() {
        let mut room = spawn_room();
        connect(&mut room).await;

        room.handle
            .signaling_event(SignalingEvent::RecordingStarted {
                stream_id: StreamId::from("gone"),
                recording_id: common::types::RecordingId::from("rec-1"),
            })
            .await
            .unwrap();

        let state = room.handle.get_state().await.unwrap();
        assert_eq!(state.state, RoomState::Connected);
        assert!(room.notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_removed_closes_subscriber() {
        let mut room = spawn_room();
        connect(&mut room).await;

        room.handle.subscribe(StreamId::from("s1")).await.unwrap();
        room.handle
            .signaling_event(SignalingEvent::StreamRemoved {
                stream_id: StreamId::from("s1"),
            })
            .await
            .unwrap();

        assert_eq!(room.notifications.recv().await.unwrap().kind(), "unsubscribed");
        assert_eq!(
            room.notifications.recv().await.unwrap().kind(),
            "stream_removed"
        );
        let state = room.handle.get_state().await.unwrap();
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_close_sends_disconnect_and_rejects_operations() {
        let mut room = spawn_room();
        connect(&mut room).await;
        room.handle.subscribe(StreamId::from("s1")).await.unwrap();

        room.handle.close("user left").await.unwrap();
        room.handle.close("again").await.unwrap();

        assert_eq!(
            room.notifications.recv().await.unwrap(),
            RoomNotification::RoomClosed {
                reason: "user left".to_string()
            }
        );
        assert!(room.notifications.try_recv().is_err());

        let mut saw_disconnect = false;
        while let Ok(request) = room.requests.try_recv() {
            saw_disconnect |= matches!(request, SignalingRequest::Disconnect);
        }
        assert!(saw_disconnect);

        let result = room.handle.subscribe(StreamId::from("s2")).await;
        assert!(matches!(result, Err(RoomError::InvalidState(_))));
        let result = room.handle.connect(Credentials::new("tok")).await;
        assert!(matches!(result, Err(RoomError::InvalidState(_))));

        let state = room.handle.get_state().await.unwrap();
        assert_eq!(state.state, RoomState::Closed);
        assert!(state.sessions.is_empty());
        assert_eq!(room.handle.metrics().active_subscribe, 0);
    }

    #[tokio::test]
    async fn test_cancellation_closes_room() {
        let mut room = spawn_room();
        connect(&mut room).await;

        room.handle.cancel();
        room._task.await.unwrap();

        assert_eq!(
            room.notifications.recv().await.unwrap(),
            RoomNotification::RoomClosed {
                reason: "cancelled".to_string()
            }
        );
        assert!(matches!(
            room.handle.get_state().await,
            Err(RoomError::Internal(_))
        ));
    }
}
