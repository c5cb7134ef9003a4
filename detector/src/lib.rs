//! Impact detection on a live camera feed.
//!
//! [`ChangeDetector`] compares each sampled frame with the previous one and
//! records every newly appeared, sufficiently large region of change as a
//! [`DetectionPoint`]. Frame acquisition, overlays and transport live outside
//! this crate; they feed frames in and observe detections through channels.

pub mod detector;
pub mod point;
pub mod region;
pub mod report;

pub use detector::{ChangeDetector, DetectionEvent, DetectorSnapshot, SubmitOutcome};
pub use point::{DetectionPoint, Location};
pub use report::{ImpactReport, ReportError};
