use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use impact_common::config::ReportConfig;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::detector::DetectionEvent;

/// Everything a companion device needs to mark one impact.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub id: Uuid,
    pub sequence_number: u64,
    pub x: f64,
    pub y: f64,
    pub detected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
}

/// JPEG close-up around the impact. `x`/`y` locate its top-left corner in
/// the source frame.
#[derive(Debug, Clone, Serialize)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(serialize_with = "as_base64")]
    pub jpeg: Vec<u8>,
}

impl ImpactReport {
    pub fn build(event: &DetectionEvent, config: &ReportConfig) -> Result<Self, ReportError> {
        let point = &event.point;
        let crop = if config.include_crop {
            crop_around(event, config.crop_size, config.jpeg_quality)?
        } else {
            None
        };
        Ok(Self {
            id: point.id(),
            sequence_number: point.sequence_number(),
            x: point.location().x,
            y: point.location().y,
            detected_at: point.detected_at(),
            crop,
        })
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn crop_around(event: &DetectionEvent, size: u32, quality: u8) -> Result<Option<Crop>, ReportError> {
    let frame = &event.frame;
    if size == 0 || frame.is_empty() {
        return Ok(None);
    }

    let region = event.point.region();
    let cx = region.min_x + region.width() / 2;
    let cy = region.min_y + region.height() / 2;
    let (x, width) = window(cx, size, frame.width());
    let (y, height) = window(cy, size, frame.height());

    let img = RgbImage::from_fn(width, height, |dx, dy| Rgb(frame.rgb(x + dx, y + dy)));
    let jpeg = encode_jpeg(&img, quality)?;
    Ok(Some(Crop {
        x,
        y,
        width,
        height,
        jpeg,
    }))
}

/// Start and length of a `size`-wide window centered on `center`, shifted to
/// stay inside `0..limit`.
fn window(center: u32, size: u32, limit: u32) -> (u32, u32) {
    let len = size.min(limit);
    let start = center.saturating_sub(len / 2).min(limit - len);
    (start, len)
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(img)?;
    Ok(buf)
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to encode crop: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::DetectionPoint;
    use crate::region::Region;
    use base64::Engine as _;
    use impact_common::frame::Frame;

    fn event_at(frame: Frame, region: Region) -> DetectionEvent {
        let location = region.center(frame.width(), frame.height());
        DetectionEvent {
            point: DetectionPoint::new(3, location, region),
            frame,
        }
    }

    fn square(x: u32, y: u32, side: u32) -> Region {
        Region {
            min_x: x,
            min_y: y,
            max_x: x + side - 1,
            max_y: y + side - 1,
            pixel_count: (side * side) as usize,
        }
    }

    #[test]
    fn window_stays_inside_the_frame() {
        assert_eq!(window(50, 20, 100), (40, 20));
        assert_eq!(window(2, 20, 100), (0, 20));
        assert_eq!(window(98, 20, 100), (80, 20));
        assert_eq!(window(5, 64, 10), (0, 10));
    }

    #[test]
    fn report_without_crop() {
        let event = event_at(Frame::solid(100, 100, [255, 0, 0]), square(25, 25, 50));
        let config = ReportConfig {
            include_crop: false,
            ..ReportConfig::default()
        };
        let report = ImpactReport::build(&event, &config).unwrap();
        assert_eq!(report.sequence_number, 3);
        assert_eq!(report.id, event.point.id());
        assert!((report.x - 0.5).abs() < 1e-9);
        assert!(report.crop.is_none());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"sequence_number\":3"));
        assert!(!json.contains("crop"));
    }

    #[test]
    fn crop_is_clamped_near_the_corner() {
        let event = event_at(Frame::solid(200, 150, [0, 0, 255]), square(190, 140, 10));
        let config = ReportConfig {
            include_crop: true,
            crop_size: 64,
            jpeg_quality: 90,
        };
        let report = ImpactReport::build(&event, &config).unwrap();
        let crop = report.crop.as_ref().unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (136, 86, 64, 64));
        assert_eq!(&crop.jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&crop.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn crop_is_base64_in_json() {
        let event = event_at(Frame::solid(32, 32, [10, 200, 10]), square(8, 8, 16));
        let report = ImpactReport::build(&event, &ReportConfig::default()).unwrap();
        let crop = report.crop.as_ref().unwrap();
        // Frame smaller than the configured crop: the whole frame is used.
        assert_eq!((crop.width, crop.height), (32, 32));

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let encoded = value["crop"]["jpeg"].as_str().unwrap();
        assert_eq!(BASE64.decode(encoded).unwrap(), crop.jpeg);
    }
}
