//! # carehub-core
//!
//! Shared library for the care hub containing the session domain model and
//! the formats of the frames that devices send to the hub.
//!
//! This crate has zero dependencies on sockets, async runtimes, or threads.
//! The server crate (`carehub-server`) owns all I/O and builds on the types
//! defined here.
//!
//! # Architecture overview
//!
//! The hub accepts WebSocket connections from devices in a home: cameras that
//! stream encoded still images, and wearables that report vital signs as JSON.
//! Every connection becomes a *session*.  This crate defines:
//!
//! - **`domain`** – What a session *is*: its device classification, the
//!   per-device payload (posture state for cameras, vitals for wearables), and
//!   the timeline of monotonic timestamps used for idle eviction.
//!
//! - **`protocol`** – What arrives on the wire: the [`Frame`] type, the
//!   wearable telemetry JSON document, and header probing for the encoded
//!   images that cameras send.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `carehub_core::Classification` instead of the full module path.
pub use domain::classification::Classification;
pub use domain::payload::{
    CameraSessionData, PersonPosture, SessionPayload, TestSessionData, WearableSessionData,
    MAX_BODY_POINTS,
};
pub use domain::timeline::SessionTimeline;
pub use protocol::frame::Frame;
pub use protocol::image::{probe_image, FrameGeometry, ImageFormat, ImageProbeError};
pub use protocol::telemetry::{
    parse_telemetry, parse_telemetry_bytes, TelemetryError, WearableTelemetry,
};
