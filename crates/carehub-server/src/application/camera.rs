//! Camera frame handling.
//!
//! Pixel decoding and pose estimation are done by an external collaborator
//! plugged in through [`ImageAnalyzer`].  The hub ships
//! [`FormatProbeAnalyzer`], which only checks that the frame is a well-formed
//! JPEG/PNG/BMP and records its geometry.

use std::time::Duration;

use carehub_core::{probe_image, CameraSessionData, ImageProbeError};
use thiserror::Error;

/// Reasons a camera frame could not be analysed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The bytes are not a decodable image.
    #[error("undecodable camera frame: {0}")]
    Undecodable(#[from] ImageProbeError),

    /// The analyzer decoded the frame but could not estimate a posture.
    #[error("pose estimation failed: {0}")]
    Estimation(String),
}

/// Hook for the external image analysis pipeline.
///
/// `analyze` receives the camera session data and the raw frame bytes, and
/// may update `posture`, `body_points` and `last_frame`.  It runs on the
/// connection task with the session locked, so it must not block for long.
#[cfg_attr(test, mockall::automock)]
pub trait ImageAnalyzer: Send + Sync {
    fn analyze(&self, data: &mut CameraSessionData, frame: &[u8]) -> Result<(), AnalysisError>;
}

/// Default analyzer: validates the image header and records the geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatProbeAnalyzer;

impl ImageAnalyzer for FormatProbeAnalyzer {
    fn analyze(&self, data: &mut CameraSessionData, frame: &[u8]) -> Result<(), AnalysisError> {
        data.last_frame = Some(probe_image(frame)?);
        Ok(())
    }
}

/// Runs one camera frame through `analyzer` and updates frame statistics.
///
/// `since_last_processed` is the gap to the previous processed frame.  On
/// failure the posture is restored to its value before the call, whatever
/// the analyzer did to it, and no statistics change.
///
/// # Errors
///
/// Returns the analyzer's [`AnalysisError`].
pub fn handle_camera_frame(
    analyzer: &dyn ImageAnalyzer,
    data: &mut CameraSessionData,
    frame: &[u8],
    since_last_processed: Duration,
) -> Result<(), AnalysisError> {
    let posture = data.posture;
    if let Err(e) = analyzer.analyze(data, frame) {
        data.posture = posture;
        return Err(e);
    }
    data.record_processed(since_last_processed);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
