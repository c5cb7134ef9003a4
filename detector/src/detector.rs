use std::sync::Arc;
use std::time::Duration;

use impact_common::config::{DetectorConfig, EmissionPolicy};
use impact_common::frame::Frame;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::point::DetectionPoint;
use crate::region::extract_regions;

/// Comparisons are never run more often than this, whatever the config says.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MIN_REGION_SIZE: u32 = 44;

const EVENT_CAPACITY: usize = 64;

/// Published to subscribers once a point has been appended.
///
/// Carries the frame the point was found in so a report can include a crop.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub point: DetectionPoint,
    pub frame: Frame,
}

/// Read-only view of the detector for observers on other tasks.
#[derive(Debug, Clone)]
pub struct DetectorSnapshot {
    pub is_active: bool,
    pub detections: Arc<[DetectionPoint]>,
}

/// What `submit_frame` did with a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Detector is stopped; frame kept only as the last seen frame.
    Inactive,
    /// Arrived before the sample interval elapsed; dropped.
    Debounced,
    /// No baseline yet; frame became the reference.
    BaselineAdopted,
    /// Compared against the baseline, which the frame then replaced.
    Compared {
        regions_found: usize,
        emitted: Vec<DetectionPoint>,
    },
}

/// Detects newly appeared change regions between consecutive sampled frames.
///
/// Not internally synchronized: one task owns the detector and feeds it
/// frames. Other tasks observe it through [`ChangeDetector::watch`] and
/// [`ChangeDetector::subscribe`].
pub struct ChangeDetector {
    baseline: Option<Frame>,
    last_seen: Option<Frame>,
    is_active: bool,
    last_sample: Instant,
    sample_interval: Duration,
    min_region_size: u32,
    emission: EmissionPolicy,
    sequence_counter: u64,
    detections: Vec<DetectionPoint>,
    events: broadcast::Sender<DetectionEvent>,
    snapshot: watch::Sender<DetectorSnapshot>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot, _) = watch::channel(DetectorSnapshot {
            is_active: false,
            detections: Arc::from(Vec::new()),
        });
        Self {
            baseline: None,
            last_seen: None,
            is_active: false,
            last_sample: Instant::now(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            min_region_size: DEFAULT_MIN_REGION_SIZE,
            emission: EmissionPolicy::default(),
            sequence_counter: 0,
            detections: Vec::new(),
            events,
            snapshot,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        let mut detector = Self::new();
        detector.set_sample_interval(config.sample_interval_secs);
        detector.set_min_region_size(config.min_region_size);
        detector.set_emission_policy(config.emission);
        detector
    }

    // -- Configuration ----------------------------------------------------------

    /// Values below 100ms (and NaN) are clamped to 100ms.
    pub fn set_sample_interval(&mut self, seconds: f64) {
        let seconds = seconds.max(MIN_SAMPLE_INTERVAL.as_secs_f64());
        self.sample_interval = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX);
        debug!(interval_ms = self.sample_interval.as_millis() as u64, "sample interval set");
    }

    /// Values below 1 are clamped to 1.
    pub fn set_min_region_size(&mut self, pixels: i64) {
        self.min_region_size = u32::try_from(pixels.max(1)).unwrap_or(u32::MAX);
        debug!(min_region_size = self.min_region_size, "minimum region size set");
    }

    pub fn set_emission_policy(&mut self, policy: EmissionPolicy) {
        self.emission = policy;
    }

    // -- Lifecycle --------------------------------------------------------------

    /// Begin comparing. The next sampled frame becomes a fresh baseline.
    pub fn start(&mut self) {
        self.is_active = true;
        self.baseline = None;
        self.last_sample = Instant::now();
        info!(
            interval_ms = self.sample_interval.as_millis() as u64,
            min_region_size = self.min_region_size,
            "detector started"
        );
        self.publish_snapshot();
    }

    pub fn stop(&mut self) {
        self.is_active = false;
        info!(detections = self.detections.len(), "detector stopped");
        self.publish_snapshot();
    }

    /// Forget all detections; numbering restarts at 1.
    pub fn clear_detections(&mut self) {
        self.detections.clear();
        self.sequence_counter = 0;
        info!("detections cleared");
        self.publish_snapshot();
    }

    // -- Frame processing -------------------------------------------------------

    pub fn submit_frame(&mut self, frame: &Frame) -> SubmitOutcome {
        if !self.is_active {
            self.last_seen = Some(frame.clone());
            return SubmitOutcome::Inactive;
        }

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample);
        if elapsed < self.sample_interval {
            return SubmitOutcome::Debounced;
        }

        let Some(baseline) = self.baseline.replace(frame.clone()) else {
            self.last_sample = now;
            debug!(width = frame.width(), height = frame.height(), "baseline adopted");
            return SubmitOutcome::BaselineAdopted;
        };
        self.last_sample = now;

        let extraction = extract_regions(&baseline, frame);
        let limit = match self.emission {
            EmissionPolicy::FirstRegion => 1,
            EmissionPolicy::EveryRegion => usize::MAX,
        };
        let accepted: Vec<_> = extraction
            .qualifying(self.min_region_size)
            .take(limit)
            .copied()
            .collect();

        debug!(
            regions = extraction.regions.len(),
            accepted = accepted.len(),
            min_region_size = self.min_region_size,
            "frame compared"
        );

        let mut emitted = Vec::with_capacity(accepted.len());
        for region in accepted {
            self.sequence_counter += 1;
            let location = region.center(extraction.width, extraction.height);
            let point = DetectionPoint::new(self.sequence_counter, location, region);
            info!(
                seq = point.sequence_number(),
                x = format!("{:.3}", location.x),
                y = format!("{:.3}", location.y),
                width = region.width(),
                height = region.height(),
                "impact detected"
            );
            self.detections.push(point.clone());
            emitted.push(point);
        }

        if !emitted.is_empty() {
            self.publish_snapshot();
            for point in &emitted {
                // Err only means nobody is subscribed.
                let _ = self.events.send(DetectionEvent {
                    point: point.clone(),
                    frame: frame.clone(),
                });
            }
        }

        SubmitOutcome::Compared {
            regions_found: extraction.regions.len(),
            emitted,
        }
    }

    // -- Observation ------------------------------------------------------------

    /// Receive every detection appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.events.subscribe()
    }

    /// Observe the latest published state.
    pub fn watch(&self) -> watch::Receiver<DetectorSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn detections(&self) -> &[DetectionPoint] {
        &self.detections
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn min_region_size(&self) -> u32 {
        self.min_region_size
    }

    pub fn emission_policy(&self) -> EmissionPolicy {
        self.emission
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Most recent frame submitted while stopped.
    pub fn last_seen_frame(&self) -> Option<&Frame> {
        self.last_seen.as_ref()
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(DetectorSnapshot {
            is_active: self.is_active,
            detections: Arc::from(self.detections.as_slice()),
        });
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}
