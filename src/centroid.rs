//! Centroid estimation: reduce one frame's observations to a target point
//!
//! Pure math, no I/O. The pose landmarks give a cheap per-frame centroid;
//! when the heavier bounding-box detector also reported this frame, its
//! center anchors the blend to damp jitter.

use crate::detect::{Observation, ObservationSource};

/// Target point for one frame, or no target at all
///
/// `None` means nothing cleared the confidence threshold this frame. A
/// missing target is always reported explicitly; the estimator never coasts
/// on a stale point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameCentroid {
    pub point: Option<(i32, i32)>,
}

impl FrameCentroid {
    pub fn none() -> Self {
        Self { point: None }
    }

    pub fn at(x: i32, y: i32) -> Self {
        Self { point: Some((x, y)) }
    }

    pub fn is_none(&self) -> bool {
        self.point.is_none()
    }
}

/// Blends pose-landmark centroids against periodic bounding-box fixes
#[derive(Debug, Clone)]
pub struct CentroidEstimator {
    /// Weight of the secondary (bounding-box) point in the blend
    secondary_weight: f32,
}

/// Secondary observations must clear this on top of the adapter's filter
/// before they are allowed to anchor the blend.
const BLEND_CONFIDENCE: f32 = 0.5;

impl CentroidEstimator {
    pub fn new(secondary_weight: f32) -> Self {
        Self { secondary_weight }
    }

    /// Estimate the target centroid from one frame's observations
    ///
    /// - Pose landmarks present: their unweighted mean is the primary point.
    /// - A bounding-box fix with confidence > 0.5 also present: blend
    ///   `(1 - w) * primary + w * secondary` componentwise, rounded to the
    ///   nearest pixel.
    /// - Only one source: use it unblended.
    /// - Nothing: no target.
    pub fn estimate(&self, observations: &[Observation]) -> FrameCentroid {
        let primary = mean_point(
            observations
                .iter()
                .filter(|o| o.source == ObservationSource::PoseLandmark),
        );

        // Highest-confidence box only; multi-person disambiguation stops here
        let secondary = observations
            .iter()
            .filter(|o| o.source == ObservationSource::BoundingBox)
            .filter(|o| o.confidence > BLEND_CONFIDENCE)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|o| (o.point.0 as f64, o.point.1 as f64));

        let point = match (primary, secondary) {
            (Some(p), Some(s)) => {
                let w = self.secondary_weight as f64;
                Some(round_point((
                    (1.0 - w) * p.0 + w * s.0,
                    (1.0 - w) * p.1 + w * s.1,
                )))
            }
            (Some(p), None) => Some(round_point(p)),
            (None, Some(s)) => Some(round_point(s)),
            (None, None) => None,
        };

        FrameCentroid { point }
    }
}

fn mean_point<'a, I>(points: I) -> Option<(f64, f64)>
where
    I: Iterator<Item = &'a Observation>,
{
    let mut sum = (0.0f64, 0.0f64);
    let mut count = 0usize;
    for o in points {
        sum.0 += o.point.0 as f64;
        sum.1 += o.point.1 as f64;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some((sum.0 / count as f64, sum.1 / count as f64))
    }
}

fn round_point(p: (f64, f64)) -> (i32, i32) {
    (p.0.round() as i32, p.1.round() as i32)
}
