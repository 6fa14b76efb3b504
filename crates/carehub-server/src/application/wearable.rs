//! Wearable frame handling.

use carehub_core::{
    parse_telemetry, parse_telemetry_bytes, Frame, TelemetryError, WearableSessionData,
};

/// Parses one telemetry frame and applies it to `data`.
///
/// Text and binary frames are both accepted as long as the payload is UTF-8
/// JSON.  Nothing changes when parsing fails.
///
/// # Errors
///
/// Returns [`TelemetryError`] for non-UTF-8 bytes or malformed JSON.
pub fn handle_wearable_frame(
    data: &mut WearableSessionData,
    frame: &Frame,
) -> Result<(), TelemetryError> {
    let telemetry = match frame {
        Frame::Text(text) => parse_telemetry(text)?,
        Frame::Binary(bytes) => parse_telemetry_bytes(bytes)?,
    };
    data.apply_telemetry(&telemetry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_bpm_update_only_those_fields() {
        // Arrange
        let mut data = WearableSessionData::new("band");
        data.body_temperature = 36.6;
        data.battery_percentage = 50.0;

        // Act
        let result = handle_wearable_frame(
            &mut data,
            &Frame::Text(r#"{"status":"ON","bpm":72}"#.to_string()),
        );

        // Assert
        assert!(result.is_ok());
        assert!(data.is_wearing);
        assert_eq!(data.heart_rate_bpm, 72.0);
        assert_eq!(data.body_temperature, 36.6);
        assert_eq!(data.battery_percentage, 50.0);
        assert!(!data.is_fall_detected);
    }

    #[test]
    fn test_malformed_json_changes_nothing() {
        let mut data = WearableSessionData::new("band");
        let before = data.clone();

        let result = handle_wearable_frame(&mut data, &Frame::Text("{bad".to_string()));

        assert!(matches!(result, Err(TelemetryError::Json(_))));
        assert_eq!(data, before);
    }

    #[test]
    fn test_binary_json_is_accepted() {
        let mut data = WearableSessionData::new("band");
        let frame = Frame::Binary(br#"{"fall_detected":true,"voltage":77}"#.to_vec());

        handle_wearable_frame(&mut data, &frame).unwrap();

        assert!(data.is_fall_detected);
        assert_eq!(data.battery_percentage, 77.0);
    }
}
