//! Idle-session eviction sweep.
//!
//! One sweep scans a snapshot of the table and marks two kinds of session:
//! those whose connection has already ended, and those that have been silent
//! for longer than the idle timeout (once past the grace period).  Expired
//! sessions are asked to close first.  Marked sessions are then removed, but
//! only if the entry still belongs to the scanned connection, so a device
//! that reconnected mid-sweep keeps its new session.

use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use crate::application::session_table::SessionTable;

/// Eviction thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub session_timeout: Duration,
    pub grace_period: Duration,
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    /// Sessions whose connection had already ended.
    pub disconnected: usize,
    /// Sessions evicted for inactivity.
    pub expired: usize,
    /// Expired sessions whose close request could not be delivered.
    pub close_failures: usize,
    pub removed: usize,
}

/// Runs one eviction pass over `table` at time `now`.
pub fn sweep(table: &SessionTable, policy: &EvictionPolicy, now: Instant) -> SweepReport {
    let mut report = SweepReport::default();
    if table.is_empty() {
        return report;
    }

    let mut marked: Vec<(String, Uuid)> = Vec::new();
    table.for_each_snapshot(|session| {
        report.scanned += 1;

        if !session.is_open() {
            report.disconnected += 1;
            marked.push((session.key().to_string(), session.connection_id()));
            return;
        }

        let timeline = session.timeline();
        if timeline.is_expired(now, policy.session_timeout, policy.grace_period) {
            report.expired += 1;
            info!(
                "evicting {}: idle for {:?}",
                session.key(),
                timeline.idle(now)
            );
            if !session.request_close() {
                report.close_failures += 1;
                warn!("failed to request close for idle session {}", session.key());
            }
            marked.push((session.key().to_string(), session.connection_id()));
        }
    });

    for (key, connection_id) in marked {
        if table.remove_if_connection(&key, connection_id) {
            report.removed += 1;
        }
    }
    report
}

// ── Tests ─────────────────────────────────────────────────────────────────────
