//! Integration tests for the carehub-core public API.
//!
//! These tests drive a session payload the way the hub does: classify the
//! identification message, build the matching payload, then feed it frames
//! through the protocol parsers.

use std::time::{Duration, Instant};

use carehub_core::{
    parse_telemetry, parse_telemetry_bytes, probe_image, Classification, Frame, ImageFormat,
    SessionPayload, SessionTimeline, TelemetryError,
};

fn device_tag(message: &str, ip: &str) -> String {
    format!("{message}({ip})")
}

#[test]
fn test_wearable_session_accumulates_reports() {
    // Arrange
    let message = "WEARABLE band-02";
    let class = Classification::identify(message);
    let mut payload = SessionPayload::for_classification(class, device_tag(message, "10.0.0.7"));

    // Act: full report followed by a partial one
    let reports = [
        r#"{"status":"ON","fall_detected":false,"bpm":72,"temperature":36.4,"humidity":41,"voltage":88}"#,
        r#"{"bpm":80,"fall_detected":true}"#,
    ];
    for text in reports {
        let report = parse_telemetry(text).expect("valid telemetry");
        if let SessionPayload::Wearable(data) = &mut payload {
            data.apply_telemetry(&report);
        }
    }

    // Assert
    let SessionPayload::Wearable(data) = payload else {
        panic!("expected wearable payload");
    };
    assert_eq!(data.device_tag, "WEARABLE band-02(10.0.0.7)");
    assert!(data.is_wearing);
    assert!(data.is_fall_detected);
    assert_eq!(data.heart_rate_bpm, 80.0);
    assert_eq!(data.body_temperature, 36.4);
    assert_eq!(data.air_humidity, 41.0);
    assert_eq!(data.battery_percentage, 88.0);
}

#[test]
fn test_malformed_telemetry_is_reported() {
    assert!(matches!(
        parse_telemetry(r#"{"bpm":"fast"}"#),
        Err(TelemetryError::Json(_))
    ));
    assert!(matches!(
        parse_telemetry_bytes(&[0xC3, 0x28]),
        Err(TelemetryError::NotUtf8)
    ));
}

#[test]
fn test_camera_session_records_probed_frame() {
    // Arrange
    let class = Classification::identify("CAM-livingroom");
    let mut payload =
        SessionPayload::for_classification(class, device_tag("CAM-livingroom", "10.0.0.4"));
    let mut frame = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    frame.extend_from_slice(&13u32.to_be_bytes());
    frame.extend_from_slice(b"IHDR");
    frame.extend_from_slice(&320u32.to_be_bytes());
    frame.extend_from_slice(&240u32.to_be_bytes());
    let frame = Frame::Binary(frame);

    // Act
    let geometry = probe_image(frame.as_bytes()).expect("valid PNG header");
    if let SessionPayload::Camera(data) = &mut payload {
        data.last_frame = Some(geometry);
        data.record_processed(Duration::from_millis(100));
    }

    // Assert
    let SessionPayload::Camera(data) = payload else {
        panic!("expected camera payload");
    };
    let last = data.last_frame.expect("frame recorded");
    assert_eq!(last.format, ImageFormat::Png);
    assert_eq!((last.width, last.height), (320, 240));
    assert_eq!(data.frames_processed, 1);
}

#[test]
fn test_unrecognised_message_keeps_unidentified_payload() {
    let class = Classification::identify("hello");
    let payload = SessionPayload::for_classification(class, device_tag("hello", "10.0.0.9"));
    assert_eq!(payload, SessionPayload::Unidentified);
    assert!(!payload.classification().is_identified());
}

#[test]
fn test_timeline_expiry_follows_activity() {
    // Arrange
    let start = Instant::now();
    let timeout = Duration::from_secs(5);
    let mut timeline = SessionTimeline::starting_at(start);

    // Act: activity at 4s keeps the session alive past the first window
    timeline.mark_received(start + Duration::from_secs(4));

    // Assert
    assert!(!timeline.is_expired(start + Duration::from_secs(8), timeout, timeout));
    assert!(timeline.is_expired(start + Duration::from_secs(10), timeout, timeout));
}
