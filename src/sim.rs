//! Simulated frame source and detector backends
//!
//! Keeps the daemon runnable end to end with no camera or model present:
//! a scripted target walks toward the frame center while the simulated
//! pose and bounding-box backends report noisy observations of it.

use crate::detect::{DetectorBackend, Observation, ObservationSource};
use crate::error::Result;
use crate::video::{Frame, FrameSource};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::Arc;

/// Gaussian pixel noise with deterministic seeding support
///
/// Seed 0 uses entropy; any other seed reproduces the same run.
struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    fn gaussian(&mut self, stddev: f32) -> f32 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * stddev
    }
}

/// Scripted world state shared by the source and the backends
pub struct SimWorld {
    target_x: f64,
    target_y: f64,
    /// Pixels the target moves per frame, toward the frame center
    speed_px: f64,
    width: u32,
    height: u32,
    visible: bool,
}

impl SimWorld {
    fn center_x(&self) -> f64 {
        (self.width / 2) as f64
    }

    /// Advance one frame: walk toward the horizontal center and stop there
    fn step(&mut self) {
        if !self.visible {
            return;
        }
        let center = self.center_x();
        let delta = center - self.target_x;
        if delta.abs() <= self.speed_px {
            self.target_x = center;
        } else {
            self.target_x += self.speed_px * delta.signum();
        }
    }

    /// Hide or reveal the target (exercises the no-target paths)
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Current target position
    pub fn target(&self) -> (f64, f64) {
        (self.target_x, self.target_y)
    }
}

/// Frame source producing fixed-geometry frames with scripted dropouts
pub struct SimFrameSource {
    world: Arc<Mutex<SimWorld>>,
    /// Every Nth frame is a transient dropout (`Ok(None)`)
    dropout_every: Option<u64>,
    counter: u64,
}

impl FrameSource for SimFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.counter += 1;
        if let Some(n) = self.dropout_every {
            if self.counter % n == 0 {
                return Ok(None);
            }
        }
        let mut world = self.world.lock();
        world.step();
        Ok(Some(Frame::empty(world.width, world.height)))
    }
}

/// Torso landmark offsets around the target, symmetric so the noiseless
/// mean lands exactly on the target
const TORSO_OFFSETS: [(i32, i32); 4] = [(-18, -25), (18, -25), (-18, 25), (18, 25)];

/// Simulated per-frame pose backend
pub struct SimPoseBackend {
    world: Arc<Mutex<SimWorld>>,
    noise: NoiseGenerator,
    noise_px: f32,
}

impl DetectorBackend for SimPoseBackend {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Observation>> {
        let (x, y, visible) = {
            let world = self.world.lock();
            (world.target_x, world.target_y, world.visible)
        };
        if !visible {
            return Ok(Vec::new());
        }

        let observations = TORSO_OFFSETS
            .iter()
            .map(|&(dx, dy)| {
                let nx = self.noise.gaussian(self.noise_px);
                let ny = self.noise.gaussian(self.noise_px);
                Observation::new(
                    (
                        (x + dx as f64 + nx as f64).round() as i32,
                        (y + dy as f64 + ny as f64).round() as i32,
                    ),
                    0.9,
                    ObservationSource::PoseLandmark,
                )
            })
            .collect();
        Ok(observations)
    }
}

/// Simulated periodic bounding-box backend
pub struct SimBoxBackend {
    world: Arc<Mutex<SimWorld>>,
    noise: NoiseGenerator,
    noise_px: f32,
}

impl DetectorBackend for SimBoxBackend {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Observation>> {
        let (x, y, visible) = {
            let world = self.world.lock();
            (world.target_x, world.target_y, world.visible)
        };
        if !visible {
            return Ok(Vec::new());
        }

        let nx = self.noise.gaussian(self.noise_px);
        let ny = self.noise.gaussian(self.noise_px);
        Ok(vec![Observation::new(
            (
                (x + nx as f64).round() as i32,
                (y + ny as f64).round() as i32,
            ),
            0.8,
            ObservationSource::BoundingBox,
        )])
    }
}

/// Everything the app needs to run against the simulation
pub struct SimRig {
    pub source: SimFrameSource,
    pub pose: SimPoseBackend,
    pub boxes: SimBoxBackend,
    pub world: Arc<Mutex<SimWorld>>,
}

impl SimRig {
    /// Build a rig with the target starting at `start_x`
    pub fn new(
        width: u32,
        height: u32,
        start_x: f64,
        speed_px: f64,
        noise_px: f32,
        seed: u64,
    ) -> Self {
        let world = Arc::new(Mutex::new(SimWorld {
            target_x: start_x,
            target_y: (height / 2) as f64,
            speed_px,
            width,
            height,
            visible: true,
        }));

        Self {
            source: SimFrameSource {
                world: Arc::clone(&world),
                dropout_every: None,
                counter: 0,
            },
            pose: SimPoseBackend {
                world: Arc::clone(&world),
                noise: NoiseGenerator::new(seed),
                noise_px,
            },
            boxes: SimBoxBackend {
                world: Arc::clone(&world),
                noise: NoiseGenerator::new(seed.wrapping_add(1)),
                noise_px,
            },
            world,
        }
    }

    /// Default rig for the given frame geometry: target enters from the
    /// right edge and walks to the center
    pub fn with_defaults(width: u32, height: u32, seed: u64) -> Self {
        Self::new(width, height, (width as f64) - 80.0, 4.0, 2.0, seed)
    }

    /// Inject a transient dropout every `n` frames
    pub fn with_dropouts(mut self, n: u64) -> Self {
        self.source.dropout_every = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_walks_to_center_and_stops() {
        let rig = SimRig::new(640, 480, 600.0, 10.0, 0.0, 7);
        let mut source = rig.source;
        for _ in 0..50 {
            source.next_frame().unwrap();
        }
        let (x, _) = rig.world.lock().target();
        assert_eq!(x, 320.0);
    }

    #[test]
    fn test_noiseless_pose_mean_is_exact() {
        let rig = SimRig::new(640, 480, 500.0, 0.0, 0.0, 7);
        let mut pose = rig.pose;
        let frame = Frame::empty(640, 480);
        let obs = pose.detect(&frame).unwrap();
        assert_eq!(obs.len(), 4);
        let sum_x: i32 = obs.iter().map(|o| o.point.0).sum();
        assert_eq!(sum_x / 4, 500);
    }

    #[test]
    fn test_hidden_target_yields_no_observations() {
        let rig = SimRig::new(640, 480, 500.0, 0.0, 0.0, 7);
        rig.world.lock().set_visible(false);
        let mut pose = rig.pose;
        let mut boxes = rig.boxes;
        let frame = Frame::empty(640, 480);
        assert!(pose.detect(&frame).unwrap().is_empty());
        assert!(boxes.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_dropout_cadence() {
        let rig = SimRig::new(640, 480, 500.0, 0.0, 0.0, 7).with_dropouts(3);
        let mut source = rig.source;
        let got: Vec<bool> = (0..6)
            .map(|_| source.next_frame().unwrap().is_some())
            .collect();
        assert_eq!(got, vec![true, true, false, true, true, false]);
    }
}
