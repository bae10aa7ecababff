//! In-memory index of the room's peer sessions.
//!
//! Holds at most one publish session (in a dedicated slot, since the server
//! may rebind its stream id on ack) and any number of subscribe sessions
//! keyed by stream id. Lookups by id check the publish slot first. The room actor is the only caller and checks
//! every precondition before mutating, so a `ConflictError` here is a defect.

use common::types::StreamId;
use std::collections::HashMap;

use crate::errors::ConflictError;

use super::session::{PeerSession, SessionRole};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    publish: Option<PeerSession>,
    subscribers: HashMap<StreamId, PeerSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session.
    ///
    /// # Errors
    ///
    /// `ConflictError` if the publish slot is taken, or a subscribe session is
    /// already registered for the stream.
    pub fn insert(&mut self, session: PeerSession) -> Result<(), ConflictError> {
        match session.role() {
            SessionRole::Publish => {
                if self.publish.is_some() {
                    return Err(ConflictError::PublishSlotOccupied);
                }
                self.publish = Some(session);
            }
            SessionRole::Subscribe => {
                let stream_id = session.stream_id().clone();
                if self.subscribers.contains_key(&stream_id) {
                    return Err(ConflictError::DuplicateStream {
                        stream_id,
                        role: SessionRole::Subscribe,
                    });
                }
                self.subscribers.insert(stream_id, session);
            }
        }
        Ok(())
    }

    /// Current publish session, if any.
    #[must_use]
    pub fn publish_session(&self) -> Option<&PeerSession> {
        self.publish.as_ref()
    }

    pub fn publish_session_mut(&mut self) -> Option<&mut PeerSession> {
        self.publish.as_mut()
    }

    /// Remove and return the publish session.
    pub fn take_publish(&mut self) -> Option<PeerSession> {
        self.publish.take()
    }

    /// Subscribe session for `stream_id`.
    #[must_use]
    pub fn subscriber(&self, stream_id: &StreamId) -> Option<&PeerSession> {
        self.subscribers.get(stream_id)
    }

    pub fn subscriber_mut(&mut self, stream_id: &StreamId) -> Option<&mut PeerSession> {
        self.subscribers.get_mut(stream_id)
    }

    /// Look a session up by stream id, publish or subscribe.
    pub fn get_mut(&mut self, stream_id: &StreamId) -> Option<&mut PeerSession> {
        let is_publish = self
            .publish
            .as_ref()
            .is_some_and(|p| p.stream_id() == stream_id);
        if is_publish {
            self.publish.as_mut()
        } else {
            self.subscribers.get_mut(stream_id)
        }
    }

    /// Remove whichever session owns `stream_id`.
    pub fn remove(&mut self, stream_id: &StreamId) -> Option<PeerSession> {
        let is_publish = self
            .publish
            .as_ref()
            .is_some_and(|p| p.stream_id() == stream_id);
        if is_publish {
            self.publish.take()
        } else {
            self.subscribers.remove(stream_id)
        }
    }

    /// Remove every session, publish first.
    pub fn drain(&mut self) -> Vec<PeerSession> {
        let mut sessions: Vec<PeerSession> = self.publish.take().into_iter().collect();
        sessions.extend(self.subscribers.drain().map(|(_, session)| session));
        sessions
    }

    /// All sessions, publish first.
    pub fn iter(&self) -> impl Iterator<Item = &PeerSession> {
        self.publish.iter().chain(self.subscribers.values())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.publish.is_some()) + self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Verify the structural invariants: the publish slot holds a publish
    /// session and every keyed entry is a subscribe session stored under its
    /// own stream id.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let publish_ok = self
            .publish
            .as_ref()
            .map_or(true, |p| p.role() == SessionRole::Publish);

        let subscribers_ok = self.subscribers.iter().all(|(key, session)| {
            session.role() == SessionRole::Subscribe && session.stream_id() == key
        });

        publish_ok && subscribers_ok
    }
}
