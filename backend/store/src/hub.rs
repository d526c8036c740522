//! Transcript change feed.
//!
//! Tracks one broadcast channel per watched session and a global channel for
//! operators watching every session. Delivery is best effort; readers that
//! fall behind re-read the transcript from the store.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use concierge_core::{Message, SessionId};

const DEFAULT_CAPACITY: usize = 64;

/// Emitted after a transcript write lands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEvent {
    pub session_id: SessionId,
    /// Store version of the transcript after the write.
    pub version: u64,
    /// The appended entry. `None` when the transcript was replaced wholesale.
    pub message: Option<Message>,
}

/// Manages transcript subscribers.
#[derive(Clone)]
pub struct SessionHub {
    sessions: Arc<RwLock<HashMap<SessionId, broadcast::Sender<TranscriptEvent>>>>,
    all: broadcast::Sender<TranscriptEvent>,
    capacity: usize,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            all,
            capacity,
        }
    }

    /// Watch a single session.
    ///
    /// Channels whose receivers have all been dropped are pruned here, so
    /// sessions that are watched and abandoned without a write do not pile up.
    pub async fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<TranscriptEvent> {
        let mut w = self.sessions.write().await;
        w.retain(|_, sender| sender.receiver_count() > 0);
        w.entry(session_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Watch every session.
    pub fn subscribe_all(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.all.subscribe()
    }

    /// Deliver an event. Returns how many session-level receivers got it.
    pub async fn publish(&self, event: TranscriptEvent) -> usize {
        let _ = self.all.send(event.clone());

        let mut w = self.sessions.write().await;
        let delivered = match w.get(&event.session_id) {
            Some(sender) if sender.receiver_count() > 0 => sender.send(event.clone()).unwrap_or(0),
            Some(_) => {
                w.remove(&event.session_id);
                0
            }
            None => 0,
        };
        trace!(session = %event.session_id, version = event.version, delivered, "Published transcript event");
        delivered
    }

    /// Number of channels currently held, live or not.
    pub async fn tracked_channels(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions with a live channel.
    pub async fn watched_sessions(&self) -> usize {
        let r = self.sessions.read().await;
        r.values().filter(|s| s.receiver_count() > 0).count()
    }
}
