//! Session domain entities for the care hub.
//!
//! Everything in this module is pure data and pure functions: no sockets, no
//! clocks read implicitly (callers pass `Instant`s in), no locks.  That keeps
//! the rules that matter most, such as "a classification is set once" and
//! "timestamps never move backwards", testable without a running server.

/// Device-type classification and the identification tokens.
pub mod classification;

/// Per-classification session payloads (camera posture, wearable vitals).
pub mod payload;

/// Monotonic session timestamps and idle/age arithmetic.
pub mod timeline;
