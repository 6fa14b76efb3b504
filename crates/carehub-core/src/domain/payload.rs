//! Per-classification session payloads.
//!
//! Each classified session carries exactly one payload variant, chosen when
//! the session is classified.  Because the variant *is* the classification
//! (see [`SessionPayload::classification`]), a session can never claim to be
//! a camera while holding wearable data.

use std::collections::VecDeque;
use std::time::Duration;

use crate::domain::classification::Classification;
use crate::protocol::image::FrameGeometry;
use crate::protocol::telemetry::WearableTelemetry;

/// Maximum number of body key points retained per camera session.
pub const MAX_BODY_POINTS: usize = 30;

/// Posture of the person in view, as reported by the pose-estimation hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonPosture {
    #[default]
    Unknown,
    Standing,
    Sitting,
    Lying,
    Fallen,
}

/// State kept for a camera session.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSessionData {
    /// `"<identification message>(<peer ip>)"`, used as a display label.
    pub device_tag: String,
    /// Current posture estimate.  Only the image analyzer changes this.
    pub posture: PersonPosture,
    /// Most recent body key points `(x, y)`, oldest first, capped at
    /// [`MAX_BODY_POINTS`].
    pub body_points: VecDeque<(f32, f32)>,
    /// Number of frames analysed successfully.
    pub frames_processed: u64,
    /// Instantaneous processing rate derived from the gap between the last
    /// two successfully processed frames.
    pub processing_fps: f64,
    /// Geometry of the last successfully analysed frame.
    pub last_frame: Option<FrameGeometry>,
}

impl CameraSessionData {
    pub fn new(device_tag: impl Into<String>) -> Self {
        Self {
            device_tag: device_tag.into(),
            posture: PersonPosture::Unknown,
            body_points: VecDeque::with_capacity(MAX_BODY_POINTS),
            frames_processed: 0,
            processing_fps: 0.0,
            last_frame: None,
        }
    }

    /// Appends a key point, evicting the oldest one once the ring is full.
    pub fn push_body_point(&mut self, x: f32, y: f32) {
        if self.body_points.len() == MAX_BODY_POINTS {
            self.body_points.pop_front();
        }
        self.body_points.push_back((x, y));
    }

    /// Records one successfully processed frame.
    ///
    /// `since_last_processed` is the gap to the previous processed frame (or
    /// to session creation for the first one).  A zero gap leaves the rate
    /// untouched rather than producing an infinite value.
    pub fn record_processed(&mut self, since_last_processed: Duration) {
        self.frames_processed += 1;
        let secs = since_last_processed.as_secs_f64();
        if secs > 0.0 {
            self.processing_fps = 1.0 / secs;
        }
    }
}

/// Vital signs reported by a wearable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WearableSessionData {
    pub device_tag: String,
    pub is_wearing: bool,
    pub is_fall_detected: bool,
    pub heart_rate_bpm: f64,
    pub body_temperature: f64,
    pub air_humidity: f64,
    pub battery_percentage: f64,
}

impl WearableSessionData {
    pub fn new(device_tag: impl Into<String>) -> Self {
        Self {
            device_tag: device_tag.into(),
            ..Self::default()
        }
    }

    /// Applies the fields present in `telemetry`; absent fields keep their
    /// previous values.
    pub fn apply_telemetry(&mut self, telemetry: &WearableTelemetry) {
        if let Some(status) = telemetry.status.as_deref() {
            self.is_wearing = status == "ON";
        }
        if let Some(fall) = telemetry.fall_detected {
            self.is_fall_detected = fall;
        }
        if let Some(bpm) = telemetry.bpm {
            self.heart_rate_bpm = bpm;
        }
        if let Some(temperature) = telemetry.temperature {
            self.body_temperature = temperature;
        }
        if let Some(humidity) = telemetry.humidity {
            self.air_humidity = humidity;
        }
        if let Some(voltage) = telemetry.voltage {
            self.battery_percentage = voltage;
        }
    }
}

/// State kept for a diagnostic test client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TestSessionData {
    pub frames_received: u64,
}

/// The per-classification data of a session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionPayload {
    #[default]
    Unidentified,
    Camera(CameraSessionData),
    Wearable(WearableSessionData),
    Test(TestSessionData),
}

impl SessionPayload {
    /// Builds the empty payload that matches `classification`.
    pub fn for_classification(classification: Classification, device_tag: String) -> Self {
        match classification {
            Classification::Unidentified => Self::Unidentified,
            Classification::Camera => Self::Camera(CameraSessionData::new(device_tag)),
            Classification::Wearable => Self::Wearable(WearableSessionData::new(device_tag)),
            Classification::Test => Self::Test(TestSessionData::default()),
        }
    }

    /// The classification implied by the payload variant.
    pub fn classification(&self) -> Classification {
        match self {
            Self::Unidentified => Classification::Unidentified,
            Self::Camera(_) => Classification::Camera,
            Self::Wearable(_) => Classification::Wearable,
            Self::Test(_) => Classification::Test,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_classification_matches_variant() {
        for class in [
            Classification::Unidentified,
            Classification::Camera,
            Classification::Wearable,
            Classification::Test,
        ] {
            let payload = SessionPayload::for_classification(class, "tag".to_string());
            assert_eq!(payload.classification(), class);
        }
    }

    #[test]
    fn test_camera_payload_starts_empty() {
        let payload = SessionPayload::for_classification(
            Classification::Camera,
            "CAM-01(10.0.0.4)".to_string(),
        );
        let SessionPayload::Camera(data) = payload else {
            panic!("expected camera payload");
        };
        assert_eq!(data.device_tag, "CAM-01(10.0.0.4)");
        assert_eq!(data.posture, PersonPosture::Unknown);
        assert!(data.body_points.is_empty());
        assert_eq!(data.frames_processed, 0);
        assert!(data.last_frame.is_none());
    }

    #[test]
    fn test_body_point_ring_is_capped() {
        // Arrange
        let mut data = CameraSessionData::new("cam");

        // Act: push more points than the ring holds
        for i in 0..(MAX_BODY_POINTS + 5) {
            data.push_body_point(i as f32, 0.0);
        }

        // Assert: oldest five were evicted
        assert_eq!(data.body_points.len(), MAX_BODY_POINTS);
        assert_eq!(data.body_points.front(), Some(&(5.0, 0.0)));
    }

    #[test]
    fn test_record_processed_computes_fps() {
        let mut data = CameraSessionData::new("cam");
        data.record_processed(Duration::from_millis(250));
        assert_eq!(data.frames_processed, 1);
        assert!((data.processing_fps - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_processed_zero_gap_keeps_previous_fps() {
        let mut data = CameraSessionData::new("cam");
        data.record_processed(Duration::from_millis(500));
        data.record_processed(Duration::ZERO);
        assert_eq!(data.frames_processed, 2);
        assert!((data.processing_fps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_telemetry_updates_only_present_fields() {
        // Arrange: prior state with every field populated
        let mut data = WearableSessionData {
            device_tag: "band".to_string(),
            is_wearing: false,
            is_fall_detected: true,
            heart_rate_bpm: 60.0,
            body_temperature: 36.5,
            air_humidity: 40.0,
            battery_percentage: 80.0,
        };
        let telemetry = WearableTelemetry {
            status: Some("ON".to_string()),
            bpm: Some(72.0),
            ..WearableTelemetry::default()
        };

        // Act
        data.apply_telemetry(&telemetry);

        // Assert
        assert!(data.is_wearing);
        assert_eq!(data.heart_rate_bpm, 72.0);
        assert!(data.is_fall_detected, "absent field must be unchanged");
        assert_eq!(data.body_temperature, 36.5);
        assert_eq!(data.air_humidity, 40.0);
        assert_eq!(data.battery_percentage, 80.0);
    }

    #[test]
    fn test_apply_telemetry_status_other_than_on_means_not_wearing() {
        let mut data = WearableSessionData::new("band");
        data.is_wearing = true;
        data.apply_telemetry(&WearableTelemetry {
            status: Some("OFF".to_string()),
            ..WearableTelemetry::default()
        });
        assert!(!data.is_wearing);
    }
}
