use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::region::Region;

/// Normalized position within a frame; both axes in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// One accepted change region. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionPoint {
    id: Uuid,
    location: Location,
    sequence_number: u64,
    region: Region,
    detected_at: DateTime<Utc>,
}

impl DetectionPoint {
    pub(crate) fn new(sequence_number: u64, location: Location, region: Region) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            sequence_number,
            region,
            detected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// 1-based position in emission order since the last clear.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Bounding box in pixels of the frame the region was found in.
    pub fn region(&self) -> Region {
        self.region
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }
}
