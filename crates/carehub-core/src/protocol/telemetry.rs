//! Wearable telemetry JSON.
//!
//! Wearables send one JSON object per text frame.  Every field is optional;
//! a field that is absent (or `null`) leaves the corresponding session value
//! untouched.  Unknown fields are ignored so that firmware can add fields
//! without breaking older hubs.
//!
//! ```json
//! {"status":"ON","fall_detected":false,"bpm":72,"temperature":36.4,"humidity":41,"voltage":88}
//! ```
//!
//! `voltage` is reported by the firmware as a battery percentage.

use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors produced while parsing a telemetry frame.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The frame bytes are not valid UTF-8.
    #[error("telemetry frame is not valid UTF-8")]
    NotUtf8,

    /// The text is not a JSON object of the expected shape.
    #[error("malformed telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One wearable telemetry report.
///
/// Only a JSON object is accepted; an array is rejected even when its
/// elements would line up with the fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WearableTelemetry {
    /// `"ON"` while the device is worn; any other value means not worn.
    pub status: Option<String>,
    pub fall_detected: Option<bool>,
    pub bpm: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub voltage: Option<f64>,
}

/// Field layout of a telemetry object.
#[derive(Deserialize)]
struct TelemetryFields {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    fall_detected: Option<bool>,
    #[serde(default)]
    bpm: Option<f64>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    voltage: Option<f64>,
}

impl From<TelemetryFields> for WearableTelemetry {
    fn from(f: TelemetryFields) -> Self {
        Self {
            status: f.status,
            fall_detected: f.fall_detected,
            bpm: f.bpm,
            temperature: f.temperature,
            humidity: f.humidity,
            voltage: f.voltage,
        }
    }
}

struct TelemetryVisitor;

impl<'de> Visitor<'de> for TelemetryVisitor {
    type Value = WearableTelemetry;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a telemetry JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        TelemetryFields::deserialize(MapAccessDeserializer::new(map)).map(Into::into)
    }
}

impl<'de> Deserialize<'de> for WearableTelemetry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TelemetryVisitor)
    }
}

/// Parses one telemetry text frame.
///
/// # Errors
///
/// Returns [`TelemetryError::Json`] if the text is not a JSON object or a
/// field has the wrong type (for example `"bpm":"fast"`).
pub fn parse_telemetry(text: &str) -> Result<WearableTelemetry, TelemetryError> {
    Ok(serde_json::from_str(text)?)
}

/// Parses telemetry that arrived in a binary frame.
///
/// # Errors
///
/// Returns [`TelemetryError::NotUtf8`] for invalid UTF-8, otherwise the same
/// errors as [`parse_telemetry`].
pub fn parse_telemetry_bytes(bytes: &[u8]) -> Result<WearableTelemetry, TelemetryError> {
    let text = std::str::from_utf8(bytes).map_err(|_| TelemetryError::NotUtf8)?;
    parse_telemetry(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_report() {
        let t = parse_telemetry(
            r#"{"status":"ON","fall_detected":true,"bpm":72,"temperature":36.4,"humidity":41.5,"voltage":88}"#,
        )
        .unwrap();
        assert_eq!(t.status.as_deref(), Some("ON"));
        assert_eq!(t.fall_detected, Some(true));
        assert_eq!(t.bpm, Some(72.0));
        assert_eq!(t.temperature, Some(36.4));
        assert_eq!(t.humidity, Some(41.5));
        assert_eq!(t.voltage, Some(88.0));
    }

    #[test]
    fn test_parse_partial_report_leaves_other_fields_none() {
        let t = parse_telemetry(r#"{"bpm":65}"#).unwrap();
        assert_eq!(t.bpm, Some(65.0));
        assert_eq!(t.status, None);
        assert_eq!(t.temperature, None);
    }

    #[test]
    fn test_parse_null_field_is_treated_as_absent() {
        let t = parse_telemetry(r#"{"bpm":null,"humidity":30}"#).unwrap();
        assert_eq!(t.bpm, None);
        assert_eq!(t.humidity, Some(30.0));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let t = parse_telemetry(r#"{"firmware":"1.2.0","bpm":70}"#).unwrap();
        assert_eq!(t.bpm, Some(70.0));
    }

    #[test]
    fn test_parse_malformed_json_is_an_error() {
        let result = parse_telemetry("{bad");
        assert!(matches!(result, Err(TelemetryError::Json(_))));
    }

    #[test]
    fn test_parse_wrong_field_type_is_an_error() {
        assert!(parse_telemetry(r#"{"bpm":"fast"}"#).is_err());
        assert!(parse_telemetry(r#"{"fall_detected":"yes"}"#).is_err());
    }

    #[test]
    fn test_parse_non_object_is_an_error() {
        assert!(parse_telemetry("[1,2,3]").is_err());
        assert!(parse_telemetry("42").is_err());
    }

    #[test]
    fn test_parse_positional_array_is_rejected() {
        // Arrange: elements that match the field types in declaration order
        let text = r#"["ON",true,72,36.4,41,88]"#;

        // Act
        let result = parse_telemetry(text);

        // Assert
        assert!(matches!(result, Err(TelemetryError::Json(_))));
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let result = parse_telemetry_bytes(&[0xC3, 0x28]);
        assert!(matches!(result, Err(TelemetryError::NotUtf8)));
    }

    #[test]
    fn test_parse_bytes_accepts_utf8_json() {
        let t = parse_telemetry_bytes(br#"{"status":"OFF"}"#).unwrap();
        assert_eq!(t.status.as_deref(), Some("OFF"));
    }
}
