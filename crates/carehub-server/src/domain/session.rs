//! The session entity.
//!
//! A [`Session`] is shared (via `Arc`) between the connection task that feeds
//! it frames, the reaper thread that may evict it, and the server during
//! shutdown.  Identity fields are immutable; everything that changes lives in
//! [`SessionState`] behind a per-session mutex, so an update on one session
//! never contends with another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use carehub_core::{Classification, SessionPayload, SessionTimeline};
use uuid::Uuid;

/// The hub's view of a connection's transport.
///
/// Implemented by the WebSocket channel in the infrastructure layer and by
/// fakes in tests.  All methods must be callable from any thread.
pub trait SessionChannel: Send + Sync {
    /// Whether the underlying connection is still usable.
    fn is_open(&self) -> bool;

    /// Asks the connection to send a Close frame and end.  Returns `false`
    /// when the channel was already closed, so nothing was requested.
    fn request_close(&self) -> bool;

    /// Whether a close has been requested.  A connection in this state is
    /// on its way out and must not claim a session again.
    fn is_close_requested(&self) -> bool;

    /// When the connection ended, if it has.
    fn closed_at(&self) -> Option<Instant>;
}

/// Mutable part of a session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub payload: SessionPayload,
    pub timeline: SessionTimeline,
}

impl SessionState {
    pub fn new(now: Instant) -> Self {
        Self {
            payload: SessionPayload::Unidentified,
            timeline: SessionTimeline::starting_at(now),
        }
    }

    pub fn classification(&self) -> Classification {
        self.payload.classification()
    }

    /// Moves an unidentified session to `classification`.
    ///
    /// Returns `true` if the classification changed.  A session that is
    /// already classified keeps its payload, and `Unidentified` is ignored.
    pub fn classify_once(&mut self, classification: Classification, device_tag: String) -> bool {
        if self.classification().is_identified() || !classification.is_identified() {
            return false;
        }
        self.payload = SessionPayload::for_classification(classification, device_tag);
        true
    }
}

/// A point-in-time copy of a session, for logging and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub key: String,
    pub connection_id: Uuid,
    pub classification: Classification,
    pub payload: SessionPayload,
    pub timeline: SessionTimeline,
    pub open: bool,
    pub disconnected_at: Option<Instant>,
}

/// One device's session.
pub struct Session {
    key: String,
    connection_id: Uuid,
    channel: Arc<dyn SessionChannel>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("connection_id", &self.connection_id)
            .field("open", &self.channel.is_open())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        key: impl Into<String>,
        connection_id: Uuid,
        channel: Arc<dyn SessionChannel>,
        now: Instant,
    ) -> Self {
        Self {
            key: key.into(),
            connection_id,
            channel,
            state: Mutex::new(SessionState::new(now)),
        }
    }

    /// The peer IP this session is keyed by.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id of the connection that created this session.
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn channel(&self) -> &Arc<dyn SessionChannel> {
        &self.channel
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub fn request_close(&self) -> bool {
        self.channel.request_close()
    }

    pub fn disconnected_at(&self) -> Option<Instant> {
        self.channel.closed_at()
    }

    /// Locks the session state.  A poisoned lock is recovered: the state is
    /// plain data and stays consistent even if a holder panicked.
    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the session state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn classification(&self) -> Classification {
        self.lock().classification()
    }

    pub fn timeline(&self) -> SessionTimeline {
        self.lock().timeline
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            key: self.key.clone(),
            connection_id: self.connection_id,
            classification: state.classification(),
            payload: state.payload.clone(),
            timeline: state.timeline,
            open: self.channel.is_open(),
            disconnected_at: self.channel.closed_at(),
        }
    }
}

// ── Test support ──────────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────────
