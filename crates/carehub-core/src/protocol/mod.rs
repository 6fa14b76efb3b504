//! Wire-level formats: frames, wearable telemetry, and encoded image headers.

pub mod frame;
pub mod image;
pub mod telemetry;

pub use frame::Frame;
pub use image::{probe_image, FrameGeometry, ImageFormat, ImageProbeError};
pub use telemetry::{parse_telemetry, parse_telemetry_bytes, TelemetryError, WearableTelemetry};
