//! Device-type classification.
//!
//! A device identifies itself with the very first text frame it sends after
//! the WebSocket upgrade.  The frame is free-form text (for example
//! `"CAM-livingroom"` or `"WEARABLE band-02"`); the hub only looks for a
//! case-sensitive token anywhere in it.
//!
//! # Token precedence
//!
//! Tokens are checked in the order camera, wearable, test.  A message that
//! happens to contain more than one token is classified by the first match,
//! so `"CAM-TEST"` is a camera.

/// Token that identifies a camera device.
pub const CAMERA_TOKEN: &str = "CAM";

/// Token that identifies a wearable device.
pub const WEARABLE_TOKEN: &str = "WEARABLE";

/// Token that identifies a test/diagnostic client.
pub const TEST_TOKEN: &str = "TEST";

/// The device type of a session.
///
/// A session starts out `Unidentified` and moves to one of the other variants
/// at most once.  The server never changes a concrete classification again,
/// even when a later frame happens to contain a different token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// No identification frame with a known token has been received yet.
    Unidentified,
    /// Streams encoded still images for posture analysis.
    Camera,
    /// Reports vitals (heart rate, temperature, wear/fall status) as JSON.
    Wearable,
    /// Diagnostic client; frames are counted and otherwise ignored.
    Test,
}

impl Classification {
    /// Classifies an identification message by searching for a device token.
    ///
    /// Returns [`Classification::Unidentified`] when no token is present.
    ///
    /// # Example
    ///
    /// ```rust
    /// use carehub_core::Classification;
    ///
    /// assert_eq!(Classification::identify("CAM-01"), Classification::Camera);
    /// assert_eq!(Classification::identify("cam-01"), Classification::Unidentified);
    /// ```
    pub fn identify(message: &str) -> Self {
        if message.contains(CAMERA_TOKEN) {
            Self::Camera
        } else if message.contains(WEARABLE_TOKEN) {
            Self::Wearable
        } else if message.contains(TEST_TOKEN) {
            Self::Test
        } else {
            Self::Unidentified
        }
    }

    /// Returns `true` for every variant except `Unidentified`.
    pub fn is_identified(self) -> bool {
        self != Self::Unidentified
    }

    /// Short label used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unidentified => "unidentified",
            Self::Camera => "camera",
            Self::Wearable => "wearable",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
