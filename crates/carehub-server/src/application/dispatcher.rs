//! Frame dispatch.
//!
//! Every frame read by a connection lands here.  The dispatcher resolves the
//! peer's session in the [`SessionTable`], classifies unidentified sessions,
//! and routes frames of classified sessions to exactly one handler.
//!
//! ```text
//! frame ──► lookup_or_create(peer, connection)
//!             │
//!             ├─ created ────────► classify from this frame (or stay Unidentified)
//!             │
//!             └─ existing ──► mark_received
//!                               ├─ Unidentified ─► retry classification / drop
//!                               ├─ Camera ───────► ImageAnalyzer ─► camera queue
//!                               ├─ Wearable ─────► telemetry JSON ─► wearable queue
//!                               └─ Test ─────────► count
//! ```

use std::sync::Arc;
use std::time::Instant;

use carehub_core::{Classification, Frame, SessionPayload};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::camera::{handle_camera_frame, ImageAnalyzer};
use crate::application::monitor::MonitorSink;
use crate::application::session_table::SessionTable;
use crate::application::wearable::handle_wearable_frame;
use crate::domain::session::{Session, SessionChannel, SessionState};

/// Why a frame was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The session is still unidentified and the frame carries no token.
    Unclassified,
    /// The camera analyzer rejected the frame.
    DecodeFailed,
    /// The wearable frame was not valid telemetry JSON.
    MalformedTelemetry,
    /// The connection has been asked to close (displaced by a reconnect or
    /// evicted) and no longer owns a session.
    ConnectionRetired,
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new session was created from this frame with this classification
    /// (`Unidentified` when the frame carried no token).
    Created(Classification),
    /// An unidentified session was classified by this frame.
    Classified(Classification),
    /// The frame was handled by the session's handler.
    Processed(Classification),
    Dropped(DropReason),
}

/// Routes frames to sessions and handlers.
pub struct Dispatcher {
    analyzer: Arc<dyn ImageAnalyzer>,
    monitor: MonitorSink,
    max_sessions: usize,
}

impl Dispatcher {
    pub fn new(
        analyzer: Arc<dyn ImageAnalyzer>,
        monitor: MonitorSink,
        max_sessions: usize,
    ) -> Self {
        Self {
            analyzer,
            monitor,
            max_sessions,
        }
    }

    pub fn monitor(&self) -> &MonitorSink {
        &self.monitor
    }

    /// Handles one frame read by connection `connection_id` from `peer`.
    ///
    /// A frame from a connection that does not own the peer's session
    /// creates a fresh session; the session it displaces is asked to close.
    /// Frames from a connection that has itself been asked to close are
    /// dropped.
    pub fn dispatch(
        &self,
        table: &SessionTable,
        peer: &str,
        connection_id: Uuid,
        channel: &Arc<dyn SessionChannel>,
        frame: &Frame,
    ) -> DispatchOutcome {
        let now = Instant::now();
        let lookup = table.lookup_or_create(peer, connection_id, &**channel, || {
            Session::new(peer, connection_id, Arc::clone(channel), now)
        });
        let Some(lookup) = lookup else {
            debug!(
                "{peer}: connection {connection_id} is closing; dropping {} frame",
                frame.kind()
            );
            return DispatchOutcome::Dropped(DropReason::ConnectionRetired);
        };

        if let Some(displaced) = &lookup.displaced {
            if lookup.displaced_close_requested {
                warn!(
                    "{peer} reconnected; closing previous connection {}",
                    displaced.connection_id()
                );
            } else {
                debug!("{peer} reconnected; previous connection already closed");
            }
        }

        if lookup.created {
            let sessions = table.len();
            if sessions > self.max_sessions {
                warn!(
                    "{sessions} sessions exceed the advisory maximum of {}",
                    self.max_sessions
                );
            }
            return lookup
                .session
                .with_state(|state| Self::classify_new(peer, state, frame));
        }

        lookup
            .session
            .with_state(|state| self.handle_existing(peer, state, frame, now))
    }

    fn classify_new(peer: &str, state: &mut SessionState, frame: &Frame) -> DispatchOutcome {
        match Self::classify(peer, state, frame) {
            Some(class) => {
                info!("{peer} identified as {class}");
                DispatchOutcome::Created(class)
            }
            None => {
                if frame.is_text() {
                    warn!(
                        "{peer} sent an unrecognised identification message; \
                         session left unidentified"
                    );
                } else {
                    warn!(
                        "{peer} sent a {} frame before identifying; session left unidentified",
                        frame.kind()
                    );
                }
                DispatchOutcome::Created(Classification::Unidentified)
            }
        }
    }

    /// Classifies an unidentified session from a text frame.  Returns the
    /// new classification, or `None` when the frame carries no token.
    fn classify(peer: &str, state: &mut SessionState, frame: &Frame) -> Option<Classification> {
        let text = frame.as_text()?;
        let class = Classification::identify(text);
        if state.classify_once(class, format!("{text}({peer})")) {
            Some(class)
        } else {
            None
        }
    }

    fn handle_existing(
        &self,
        peer: &str,
        state: &mut SessionState,
        frame: &Frame,
        now: Instant,
    ) -> DispatchOutcome {
        state.timeline.mark_received(now);

        let outcome = match &mut state.payload {
            SessionPayload::Unidentified => {
                return match Self::classify(peer, state, frame) {
                    Some(class) => {
                        info!("{peer} identified as {class}");
                        DispatchOutcome::Classified(class)
                    }
                    None => {
                        warn!("{peer} is unidentified; dropping {} frame", frame.kind());
                        DispatchOutcome::Dropped(DropReason::Unclassified)
                    }
                };
            }
            SessionPayload::Camera(data) => {
                let since_processed = state.timeline.since_processed(now);
                match handle_camera_frame(
                    self.analyzer.as_ref(),
                    data,
                    frame.as_bytes(),
                    since_processed,
                ) {
                    Ok(()) => {
                        self.monitor.push_camera(peer, data.clone());
                        DispatchOutcome::Processed(Classification::Camera)
                    }
                    Err(e) => {
                        error!("{peer}: {e}");
                        DispatchOutcome::Dropped(DropReason::DecodeFailed)
                    }
                }
            }
            SessionPayload::Wearable(data) => match handle_wearable_frame(data, frame) {
                Ok(()) => {
                    self.monitor.push_wearable(peer, data.clone());
                    DispatchOutcome::Processed(Classification::Wearable)
                }
                Err(e) => {
                    error!("{peer}: {e}");
                    DispatchOutcome::Dropped(DropReason::MalformedTelemetry)
                }
            },
            SessionPayload::Test(data) => {
                data.frames_received += 1;
                debug!("{peer} test frame #{} ({} bytes)", data.frames_received, frame.len());
                DispatchOutcome::Processed(Classification::Test)
            }
        };

        if matches!(outcome, DispatchOutcome::Processed(_)) {
            state.timeline.mark_processed(Instant::now());
        }
        outcome
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
