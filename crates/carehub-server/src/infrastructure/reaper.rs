//! Background reaper thread.
//!
//! Runs on a dedicated OS thread rather than a tokio task so that a slow sweep
//! (many sessions, contended session locks) never delays socket I/O on the
//! runtime.  The thread sleeps on a stop channel with a timeout of one reaper
//! period: a stop request wakes it immediately, a timeout triggers a sweep.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::application::eviction::{sweep, EvictionPolicy};
use crate::application::session_table::SessionTable;

/// Reaper timing.
#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    pub policy: EvictionPolicy,
    pub period: Duration,
    pub status_log_interval: Duration,
}

/// Handle to a running reaper thread.  Dropping it stops the thread.
#[derive(Debug)]
pub struct ReaperHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Signals the thread and waits for it to exit.  Blocks for at most the
    /// duration of one in-flight sweep.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Signals the thread without waiting for it.  The thread exits after
    /// any in-flight sweep; use this where blocking is not allowed.
    pub fn detach(mut self) {
        self.signal();
        drop(self.thread.take());
    }

    fn signal(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // A send error only means the thread is already gone.
            let _ = tx.send(());
        }
    }

    fn shutdown(&mut self) {
        self.signal();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("reaper thread panicked");
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns the reaper thread over `table`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be created.
pub fn spawn_reaper(
    table: SessionTable,
    settings: ReaperSettings,
) -> std::io::Result<ReaperHandle> {
    let (stop_tx, stop_rx) = mpsc::channel();

    let thread = std::thread::Builder::new()
        .name("carehub-reaper".to_string())
        .spawn(move || reaper_loop(&table, settings, &stop_rx))?;

    debug!(
        "reaper started (period {:?}, timeout {:?}, grace {:?})",
        settings.period, settings.policy.session_timeout, settings.policy.grace_period
    );
    Ok(ReaperHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}

fn reaper_loop(table: &SessionTable, settings: ReaperSettings, stop_rx: &mpsc::Receiver<()>) {
    let mut last_status = Instant::now();

    loop {
        match stop_rx.recv_timeout(settings.period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        let report = sweep(table, &settings.policy, now);
        if report.removed > 0 {
            debug!(
                "reaper removed {} session(s) ({} disconnected, {} idle)",
                report.removed, report.disconnected, report.expired
            );
        }

        if now.duration_since(last_status) >= settings.status_log_interval {
            info!(
                "{} session(s), {} open",
                table.len(),
                table.open_channel_count()
            );
            last_status = now;
        }
    }

    debug!("reaper stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
