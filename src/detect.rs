//! Detection adapter: normalizes heterogeneous detector outputs
//!
//! Backends produce raw [`Observation`]s; the [`DetectionAdapter`] applies
//! the confidence filter and the secondary-detector cadence so the rest of
//! the pipeline never re-checks visibility or scheduling.

use crate::error::Result;
use crate::video::Frame;

/// Which kind of detector produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    /// Per-frame pose landmark (e.g. a torso keypoint)
    PoseLandmark,
    /// Bounding-box center from the heavier object detector
    BoundingBox,
}

/// One candidate target point with confidence, produced fresh per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Pixel position
    pub point: (i32, i32),
    /// Confidence score in [0, 1]
    pub confidence: f32,
    /// Producing detector kind
    pub source: ObservationSource,
}

impl Observation {
    pub fn new(point: (i32, i32), confidence: f32, source: ObservationSource) -> Self {
        Self {
            point,
            confidence,
            source,
        }
    }
}

/// Detector backend trait
///
/// The only contract the control core depends on. Model integrations
/// (pose landmark nets, object detectors) implement this outside the crate.
/// "Nothing detected" is an empty vector, never an error; `Err` is reserved
/// for backend failure on that frame.
pub trait DetectorBackend: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Observation>>;
}

/// Adapter that fuses one per-frame backend with an optional periodic one
pub struct DetectionAdapter {
    primary: Box<dyn DetectorBackend>,
    secondary: Option<Box<dyn DetectorBackend>>,
    /// Run the secondary backend every N frames
    interval: u32,
    frame_counter: u64,
    threshold: f32,
}

impl DetectionAdapter {
    /// Create an adapter
    ///
    /// `interval` is clamped to at least 1 (1 = secondary runs every frame).
    pub fn new(
        primary: Box<dyn DetectorBackend>,
        secondary: Option<Box<dyn DetectorBackend>>,
        interval: u32,
        threshold: f32,
    ) -> Self {
        Self {
            primary,
            secondary,
            interval: interval.max(1),
            frame_counter: 0,
            threshold,
        }
    }

    /// Produce the confidence-filtered observations for one frame
    ///
    /// A backend error is logged and contributes nothing for this frame; one
    /// bad inference must not stop the loop.
    pub fn observe(&mut self, frame: &Frame) -> Vec<Observation> {
        self.frame_counter += 1;

        let mut observations = match self.primary.detect(frame) {
            Ok(obs) => obs,
            Err(e) => {
                log::warn!("Primary detector failed, skipping frame: {}", e);
                Vec::new()
            }
        };

        if let Some(secondary) = self.secondary.as_mut() {
            if self.frame_counter % self.interval as u64 == 0 {
                match secondary.detect(frame) {
                    Ok(obs) => observations.extend(obs),
                    Err(e) => {
                        log::warn!("Secondary detector failed, skipping frame: {}", e);
                    }
                }
            }
        }

        observations.retain(|o| o.confidence >= self.threshold);
        observations
    }
}
