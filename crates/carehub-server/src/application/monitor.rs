//! Monitoring queues.
//!
//! Handlers push a copy of the session data after each successfully processed
//! frame so an external monitor (overlay renderer, care backend uploader) can
//! follow the devices.  The hub only ever pushes: queues are bounded and a
//! full queue drops the record rather than stalling a connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use carehub_core::{CameraSessionData, WearableSessionData};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// One pushed copy of session data.
#[derive(Debug, Clone)]
pub struct MonitorRecord<T> {
    /// Session key (peer IP) the data belongs to.
    pub peer: String,
    pub captured_at: Instant,
    pub data: T,
}

/// Consumer ends of the monitoring queues, handed to whoever runs the
/// external monitor.
#[derive(Debug)]
pub struct MonitorReceivers {
    pub camera: mpsc::Receiver<MonitorRecord<CameraSessionData>>,
    pub wearable: mpsc::Receiver<MonitorRecord<WearableSessionData>>,
}

#[derive(Debug, Default)]
struct LastPush {
    camera: Option<Instant>,
    wearable: Option<Instant>,
}

/// Producer side of the monitoring queues.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct MonitorSink {
    camera: mpsc::Sender<MonitorRecord<CameraSessionData>>,
    wearable: mpsc::Sender<MonitorRecord<WearableSessionData>>,
    last_push: Arc<Mutex<LastPush>>,
    dropped: Arc<AtomicU64>,
}

/// Creates the camera and wearable queues, each holding up to `capacity`
/// records.
///
/// # Panics
///
/// Panics if `capacity` is zero; [`ServerConfig::validate`] rejects that.
///
/// [`ServerConfig::validate`]: crate::domain::ServerConfig::validate
pub fn monitor_queues(capacity: usize) -> (MonitorSink, MonitorReceivers) {
    let (camera_tx, camera_rx) = mpsc::channel(capacity);
    let (wearable_tx, wearable_rx) = mpsc::channel(capacity);
    (
        MonitorSink {
            camera: camera_tx,
            wearable: wearable_tx,
            last_push: Arc::new(Mutex::new(LastPush::default())),
            dropped: Arc::new(AtomicU64::new(0)),
        },
        MonitorReceivers {
            camera: camera_rx,
            wearable: wearable_rx,
        },
    )
}

impl MonitorSink {
    /// Queues a camera snapshot.  Returns `false` if it was dropped.
    pub fn push_camera(&self, peer: &str, data: CameraSessionData) -> bool {
        let now = Instant::now();
        let pushed = self.offer(&self.camera, "camera", peer, now, data);
        if pushed {
            self.lock_last_push().camera = Some(now);
        }
        pushed
    }

    /// Queues a wearable snapshot.  Returns `false` if it was dropped.
    pub fn push_wearable(&self, peer: &str, data: WearableSessionData) -> bool {
        let now = Instant::now();
        let pushed = self.offer(&self.wearable, "wearable", peer, now, data);
        if pushed {
            self.lock_last_push().wearable = Some(now);
        }
        pushed
    }

    /// When the last camera record was queued.
    pub fn last_camera_push(&self) -> Option<Instant> {
        self.lock_last_push().camera
    }

    /// When the last wearable record was queued.
    pub fn last_wearable_push(&self) -> Option<Instant> {
        self.lock_last_push().wearable
    }

    /// Records dropped because a queue was full or its consumer was gone.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer<T>(
        &self,
        tx: &mpsc::Sender<MonitorRecord<T>>,
        queue: &str,
        peer: &str,
        now: Instant,
        data: T,
    ) -> bool {
        let record = MonitorRecord {
            peer: peer.to_string(),
            captured_at: now,
            data,
        };
        match tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("{queue} monitor queue full; dropping record from {peer}");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("{queue} monitor queue has no consumer; dropping record from {peer}");
                false
            }
        }
    }

    fn lock_last_push(&self) -> std::sync::MutexGuard<'_, LastPush> {
        self.last_push.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_delivers_record_and_records_time() {
        // Arrange
        let (sink, mut rx) = monitor_queues(4);
        assert!(sink.last_wearable_push().is_none());

        // Act
        let pushed = sink.push_wearable("10.0.0.7", WearableSessionData::new("band"));

        // Assert
        assert!(pushed);
        assert!(sink.last_wearable_push().is_some());
        assert!(sink.last_camera_push().is_none());
        let record = rx.wearable.try_recv().expect("record queued");
        assert_eq!(record.peer, "10.0.0.7");
        assert_eq!(record.data.device_tag, "band");
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        // Arrange
        let (sink, mut rx) = monitor_queues(1);

        // Act
        let first = sink.push_camera("cam", CameraSessionData::new("a"));
        let second = sink.push_camera("cam", CameraSessionData::new("b"));

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.camera.try_recv().unwrap().data.device_tag, "a");
        assert!(rx.camera.try_recv().is_err());
    }

    #[test]
    fn test_push_without_consumer_is_dropped() {
        let (sink, receivers) = monitor_queues(4);
        drop(receivers);

        assert!(!sink.push_camera("cam", CameraSessionData::new("a")));
        assert_eq!(sink.dropped(), 1);
        assert!(sink.last_camera_push().is_none());
    }
}
