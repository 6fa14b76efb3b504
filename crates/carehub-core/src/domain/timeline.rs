//! Monotonic session timestamps.

use std::time::{Duration, Instant};

/// Activity timestamps of one session.
///
/// All values come from the monotonic clock.  The `mark_*` methods never move
/// a timestamp backwards, so an out-of-order `now` passed by a racing caller
/// is simply ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeline {
    connected_at: Instant,
    last_received_at: Instant,
    last_processed_at: Instant,
}

impl SessionTimeline {
    /// Starts a timeline with every timestamp set to `now`.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            connected_at: now,
            last_received_at: now,
            last_processed_at: now,
        }
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn last_received_at(&self) -> Instant {
        self.last_received_at
    }

    pub fn last_processed_at(&self) -> Instant {
        self.last_processed_at
    }

    /// Records that a frame arrived at `now`.
    pub fn mark_received(&mut self, now: Instant) {
        self.last_received_at = self.last_received_at.max(now);
    }

    /// Records that a frame finished processing at `now`.
    pub fn mark_processed(&mut self, now: Instant) {
        self.last_processed_at = self.last_processed_at.max(now);
    }

    /// Time since the last received frame.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_received_at)
    }

    /// Time since the session was created.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.connected_at)
    }

    /// Time since the last successfully processed frame.
    pub fn since_processed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_processed_at)
    }

    /// Whether the idle-eviction rule applies at `now`: the session is older
    /// than `grace_period` *and* has been silent longer than `timeout`.
    pub fn is_expired(&self, now: Instant, timeout: Duration, grace_period: Duration) -> bool {
        self.age(now) > grace_period && self.idle(now) > timeout
    }
}
