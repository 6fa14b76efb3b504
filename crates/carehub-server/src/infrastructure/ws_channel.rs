//! [`SessionChannel`] implementation for WebSocket connections.
//!
//! The connection task owns the actual stream; other parties (reaper thread,
//! server, a displacing reconnect) only hold this handle.  A close request
//! sets a flag and wakes the connection task, which then sends the Close frame
//! itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use tokio::sync::Notify;

use crate::domain::session::SessionChannel;

#[derive(Debug)]
pub struct WsChannel {
    open: AtomicBool,
    close_requested: AtomicBool,
    closed_at: OnceLock<Instant>,
    wake: Notify,
}

impl Default for WsChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl WsChannel {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            close_requested: AtomicBool::new(false),
            closed_at: OnceLock::new(),
            wake: Notify::new(),
        }
    }

    /// Records that the connection has ended.  Idempotent; the first call
    /// fixes the disconnect time.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
        let _ = self.closed_at.set(Instant::now());
    }

    /// Resolves once a close has been requested.
    pub async fn close_requested(&self) {
        while !self.is_close_requested() {
            self.wake.notified().await;
        }
    }
}

impl SessionChannel for WsChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn request_close(&self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.close_requested.store(true, Ordering::Release);
        // notify_one stores a permit when the task is not currently waiting.
        self.wake.notify_one();
        true
    }

    fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    fn closed_at(&self) -> Option<Instant> {
        self.closed_at.get().copied()
    }
}
