//! Integration tests for publish and subscribe session lifecycles.
//!
//! Drives a room actor through the mock signaling transport and checks the
//! notification stream, the registry contents and the outbound requests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::{ClientHandle, RecordingId, StreamDescriptor};
use room_coordinator::actors::{RoomState, SessionRole, SessionState};
use room_coordinator::errors::{ErrorKind, RoomError};
use room_coordinator::notifications::RoomNotification;
use room_coordinator::signaling::{PublishOptions, SignalingEvent, SignalingRequest};
use room_test_utils::{data_enabled, init_test_tracing, local_stream, sid, TestRoom};

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn test_publish_round_trip() {
    init_test_tracing();
    let mut room = TestRoom::accepting();
    room.connect().await;

    let client = room
        .handle
        .publish(local_stream(), data_enabled())
        .await
        .unwrap();
    room.emit(SignalingEvent::PublishAck {
        stream_id: sid("pub-1"),
    })
    .await;
    room.client_ready("pub-1").await;

    assert_eq!(
        room.drain_notifications().await,
        vec![
            RoomNotification::Published {
                stream_id: sid("pub-1")
            },
            RoomNotification::Ready {
                stream_id: sid("pub-1"),
                client
            },
        ]
    );

    let state = room.state().await;
    assert_eq!(state.publish_stream_id, Some(sid("pub-1")));
    let session = state.session(&sid("pub-1")).unwrap();
    assert_eq!(session.role, SessionRole::Publish);
    assert_eq!(session.state, SessionState::Active);

    // The publish request carried the data-channel option.
    let publish = room
        .port
        .requests()
        .into_iter()
        .find(|r| matches!(r, SignalingRequest::Publish { .. }))
        .unwrap();
    assert!(matches!(
        publish,
        SignalingRequest::Publish { options, .. } if options.data_enabled
    ));

    room.shutdown().await;
}

#[tokio::test]
async fn test_second_publish_rejected() {
    let room = TestRoom::accepting();
    room.connect().await;

    room.handle
        .publish(local_stream(), PublishOptions::default())
        .await
        .unwrap();
    let result = room
        .handle
        .publish(local_stream(), PublishOptions::default())
        .await;

    assert!(matches!(result, Err(RoomError::AlreadyPublishing)));
    assert_eq!(room.port.count("publish"), 1);
}

#[tokio::test]
async fn test_publish_error_frees_publish_slot() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    room.handle
        .publish(local_stream(), PublishOptions::default())
        .await
        .unwrap();
    room.emit(SignalingEvent::PublishAck {
        stream_id: sid("S"),
    })
    .await;
    room.emit(SignalingEvent::Error {
        stream_id: Some(sid("S")),
        reason: "ice-failed".to_string(),
    })
    .await;

    let notifications = room.drain_notifications().await;
    let errors: Vec<_> = notifications
        .iter()
        .filter(|n| n.kind() == "error")
        .collect();
    assert_eq!(
        errors,
        vec![&RoomNotification::Error {
            kind: ErrorKind::Session,
            stream_id: Some(sid("S")),
            reason: "ice-failed".to_string(),
        }]
    );
    assert!(room.state().await.sessions.is_empty());

    room.handle
        .publish(local_stream(), PublishOptions::default())
        .await
        .expect("publish slot should be free again");
    assert_eq!(room.port.count("publish"), 2);
}

#[tokio::test]
async fn test_publish_error_before_ack_frees_publish_slot() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    room.handle
        .publish(StreamDescriptor::audio_video("S"), PublishOptions::default())
        .await
        .unwrap();
    room.emit(SignalingEvent::Error {
        stream_id: Some(sid("S")),
        reason: "ice-failed".to_string(),
    })
    .await;

    assert_eq!(
        room.drain_notifications().await,
        vec![RoomNotification::Error {
            kind: ErrorKind::Session,
            stream_id: Some(sid("S")),
            reason: "ice-failed".to_string(),
        }]
    );
    assert!(room.state().await.sessions.is_empty());
    assert_eq!(room.handle.metrics().active_publish, 0);

    room.handle
        .publish(StreamDescriptor::audio_video("S2"), PublishOptions::default())
        .await
        .expect("publish slot should be free again");
    assert_eq!(room.state().await.publish_stream_id, Some(sid("S2")));
}

#[tokio::test]
async fn test_publish_client_failure_before_ack() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    room.handle
        .publish(StreamDescriptor::audio_video("S"), PublishOptions::default())
        .await
        .unwrap();
    room.handle
        .client_reporter(sid("S"))
        .failed("gathering-failed")
        .await
        .unwrap();

    assert_eq!(
        room.drain_notifications().await,
        vec![RoomNotification::Error {
            kind: ErrorKind::Session,
            stream_id: Some(sid("S")),
            reason: "gathering-failed".to_string(),
        }]
    );
    assert!(room.state().await.sessions.is_empty());
    assert_eq!(room.handle.metrics().sessions_errored, 1);

    // A late ack for the failed session is stale.
    room.emit(SignalingEvent::PublishAck {
        stream_id: sid("S"),
    })
    .await;
    assert!(room.drain_notifications().await.is_empty());
    assert_eq!(room.handle.metrics().stale_events, 1);
}

#[tokio::test]
async fn test_publish_uses_configured_defaults() {
    let mut config = room_test_utils::test_config("room-defaults");
    config.record_by_default = true;
    let room = TestRoom::with_config(
        &config,
        room_test_utils::MockSignalingPort::builder().accept_connect("room123"),
    );
    room.connect().await;

    room.handle
        .publish_with_defaults(local_stream())
        .await
        .unwrap();

    let requests = room.port.requests();
    assert!(requests.iter().any(|r| matches!(
        r,
        SignalingRequest::Publish { options, .. } if options.record && !options.data_enabled
    )));
}

#[tokio::test]
async fn test_recording_started_attaches_to_publish() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    room.handle
        .publish(local_stream(), PublishOptions::default())
        .await
        .unwrap();
    room.emit(SignalingEvent::PublishAck {
        stream_id: sid("pub-1"),
    })
    .await;
    room.emit(SignalingEvent::RecordingStarted {
        stream_id: sid("pub-1"),
        recording_id: RecordingId::from("rec-9"),
    })
    .await;

    let notifications = room.drain_notifications().await;
    assert_eq!(
        notifications.last(),
        Some(&RoomNotification::RecordingStarted {
            stream_id: sid("pub-1"),
            recording_id: RecordingId::from("rec-9"),
        })
    );
    let state = room.state().await;
    assert_eq!(
        state.session(&sid("pub-1")).unwrap().recording_id,
        Some(RecordingId::from("rec-9"))
    );
}

// ============================================================================
// Subscribe
// ============================================================================

#[tokio::test]
async fn test_subscribe_scenario() {
    let mut room = TestRoom::accepting();
    assert_eq!(room.connect().await.as_str(), "room123");
    assert_eq!(room.state().await.state, RoomState::Connected);

    let h1 = ClientHandle::new();
    room.handle.subscribe(sid("s1")).await.unwrap();
    room.ack_subscribe("s1", h1).await;
    room.client_ready("s1").await;

    assert_eq!(
        room.drain_notifications().await,
        vec![
            RoomNotification::Subscribed {
                stream_id: sid("s1"),
                client: h1
            },
            RoomNotification::Ready {
                stream_id: sid("s1"),
                client: h1
            },
        ]
    );
    let state = room.state().await;
    let session = state.session(&sid("s1")).unwrap();
    assert_eq!(session.state, SessionState::Active);
    assert_eq!(session.client, Some(h1));
}

#[tokio::test]
async fn test_duplicate_subscribe_leaves_registry_unchanged() {
    let room = TestRoom::accepting();
    room.connect().await;

    room.handle.subscribe(sid("s1")).await.unwrap();
    let before = room.state().await.sessions;

    let result = room.handle.subscribe(sid("s1")).await;
    assert!(matches!(result, Err(RoomError::DuplicateSubscription(ref id)) if id == &sid("s1")));
    assert_eq!(room.state().await.sessions, before);
    assert_eq!(room.port.count("subscribe"), 1);
}

#[tokio::test]
async fn test_stale_unsubscribe_ack_does_not_remove_new_session() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    room.handle.subscribe(sid("s1")).await.unwrap();
    room.handle.unsubscribe(sid("s1")).await.unwrap();
    room.handle.subscribe(sid("s1")).await.unwrap();
    room.emit(SignalingEvent::UnsubscribeAck {
        stream_id: sid("s1"),
    })
    .await;

    let state = room.state().await;
    let session = state.session(&sid("s1")).expect("new session must survive");
    assert_eq!(session.state, SessionState::Requested);
    assert!(!session.unsubscribe_pending);

    assert_eq!(
        room.drain_notifications().await,
        vec![RoomNotification::Unsubscribed {
            stream_id: sid("s1")
        }]
    );
    assert_eq!(room.handle.metrics().stale_events, 1);
}

#[tokio::test]
async fn test_subscribe_failure_isolated_from_siblings() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    for id in ["s1", "s2"] {
        room.handle.subscribe(sid(id)).await.unwrap();
        room.ack_subscribe(id, ClientHandle::new()).await;
    }
    room.handle
        .client_reporter(sid("s1"))
        .failed("dtls-timeout")
        .await
        .unwrap();

    let state = room.state().await;
    assert!(state.session(&sid("s1")).is_none());
    assert_eq!(
        state.session(&sid("s2")).unwrap().state,
        SessionState::Negotiating
    );
    assert_eq!(state.state, RoomState::Connected);

    let errors: Vec<_> = room
        .drain_notifications()
        .await
        .into_iter()
        .filter(|n| n.kind() == "error")
        .collect();
    assert_eq!(errors.len(), 1);

    // Consumer may retry.
    room.handle.subscribe(sid("s1")).await.unwrap();
}

#[tokio::test]
async fn test_stream_list_forwarded_without_mutating_registry() {
    let mut room = TestRoom::accepting();
    room.connect().await;

    let payload = r#"[{"id":"101","audio":true,"video":true,"data":1},
                     {"id":"102","audio":true,"video":false}]"#;
    let streams: Vec<StreamDescriptor> = serde_json::from_str(payload).unwrap();
    room.emit(SignalingEvent::StreamList {
        streams: streams.clone(),
    })
    .await;

    assert_eq!(
        room.drain_notifications().await,
        vec![RoomNotification::StreamList { streams }]
    );
    assert!(room.state().await.sessions.is_empty());
}

#[tokio::test]
async fn test_send_failure_rolls_back_session() {
    let room = TestRoom::accepting();
    room.connect().await;

    room.port.set_fail_sends(true);
    let result = room.handle.subscribe(sid("s1")).await;
    assert!(matches!(result, Err(RoomError::Signaling(_))));
    let result = room
        .handle
        .publish(local_stream(), PublishOptions::default())
        .await;
    assert!(matches!(result, Err(RoomError::Signaling(_))));

    assert!(room.state().await.sessions.is_empty());
    assert_eq!(room.handle.metrics().active_subscribe, 0);
    assert_eq!(room.handle.metrics().active_publish, 0);

    room.port.set_fail_sends(false);
    room.handle.subscribe(sid("s1")).await.unwrap();
}

// ============================================================================
// Registry invariant under mixed sequences
// ============================================================================

#[tokio::test]
async fn test_registry_invariant_holds_across_mixed_sequence() {
    let room = TestRoom::accepting();
    room.connect().await;

    let ids = ["a", "b", "c"];
    for round in 0..4 {
        for id in ids {
            let _ = room.handle.subscribe(sid(id)).await;
            if round % 2 == 0 {
                room.ack_subscribe(id, ClientHandle::new()).await;
            }
        }
        let _ = room
            .handle
            .publish(local_stream(), PublishOptions::default())
            .await;
        for id in ids.iter().take(round % 3 + 1) {
            let _ = room.handle.unsubscribe(sid(id)).await;
            room.emit(SignalingEvent::UnsubscribeAck {
                stream_id: sid(id),
            })
            .await;
        }

        let state = room.state().await;
        let publishes = state
            .sessions
            .iter()
            .filter(|s| s.role == SessionRole::Publish)
            .count();
        assert!(publishes <= 1);

        let mut subscribed: Vec<_> = state
            .sessions
            .iter()
            .filter(|s| s.role == SessionRole::Subscribe)
            .map(|s| s.stream_id.clone())
            .collect();
        let total = subscribed.len();
        subscribed.sort();
        subscribed.dedup();
        assert_eq!(subscribed.len(), total);
    }
}
