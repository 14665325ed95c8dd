//! Operating mode state machine and per-frame command production
//!
//! The operator owns the mode: transitions happen only through control
//! channel messages, never internally. Losing the target while `Tracking`
//! yields a `Stop` command for that frame; the mode stays `Tracking`.

use crate::centroid::FrameCentroid;
use parking_lot::RwLock;
use std::sync::Arc;

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Hold still regardless of detections
    #[default]
    Stopped,
    /// Follow the detected person
    Tracking,
    /// Sweep back and forth looking for a person
    Scanning,
}

impl Mode {
    /// Parse an operator command token. Exact match only; anything else is
    /// rejected by returning `None`.
    pub fn parse(token: &str) -> Option<Mode> {
        match token {
            "stop" => Some(Mode::Stopped),
            "track" => Some(Mode::Tracking),
            "scan" => Some(Mode::Scanning),
            _ => None,
        }
    }
}

/// The single authoritative mode cell
///
/// Written only by the control channel server, read once per frame tick.
/// The lock is held only for the duration of one read or write.
#[derive(Debug, Clone, Default)]
pub struct SharedMode(Arc<RwLock<Mode>>);

impl SharedMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Mode {
        *self.0.read()
    }

    pub fn set(&self, mode: Mode) {
        *self.0.write() = mode;
    }
}

/// Actuation command produced once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Halt rotation
    Stop,
    /// Sweep at the given signed magnitude
    Scan(i32),
    /// Proportional steering delta toward the target
    Track(i32),
}

/// Bounded sweep state, owned by the controller
///
/// The magnitude ramps by one step per frame; when the emitted value reaches
/// half the frame width the direction flips and the ramp restarts, so the
/// sweep never overshoots the bound by more than one step.
#[derive(Debug, Clone, Copy)]
pub struct ScanState {
    direction: i32,
    magnitude: i32,
    step: i32,
}

impl ScanState {
    pub fn new(step: i32) -> Self {
        Self {
            direction: 1,
            magnitude: step,
            step,
        }
    }

    /// Emit the next sweep value and advance the ramp
    pub fn advance(&mut self, half_width: i32) -> i32 {
        let value = self.direction * self.magnitude;
        if value.abs() >= half_width {
            self.direction = -self.direction;
            self.magnitude = self.step;
        } else {
            self.magnitude += self.step;
        }
        value
    }
}

/// Per-frame state machine combining mode and centroid into a command
pub struct ModeController {
    mode: SharedMode,
    scan: ScanState,
    last_mode: Mode,
    frame_center_x: i32,
    half_width: i32,
    scan_step: i32,
}

impl ModeController {
    /// Create a controller for the given frame geometry
    pub fn new(mode: SharedMode, frame_width: u32, scan_step: i32) -> Self {
        let half_width = (frame_width / 2) as i32;
        Self {
            mode,
            scan: ScanState::new(scan_step),
            last_mode: Mode::Stopped,
            frame_center_x: half_width,
            half_width,
            scan_step,
        }
    }

    /// Produce the command for one frame
    ///
    /// Reads the shared mode exactly once. Sweep state resets on every
    /// transition into `Scanning`.
    pub fn tick(&mut self, centroid: &FrameCentroid) -> Command {
        let mode = self.mode.get();
        if mode == Mode::Scanning && self.last_mode != Mode::Scanning {
            self.scan = ScanState::new(self.scan_step);
        }
        self.last_mode = mode;

        match mode {
            Mode::Stopped => Command::Stop,
            Mode::Tracking => match centroid.point {
                Some((x, _)) => Command::Track(x - self.frame_center_x),
                None => Command::Stop,
            },
            Mode::Scanning => {
                // Person interrupt: a confident target pauses the sweep for
                // this frame, mode still only changes via the operator
                if centroid.point.is_some() {
                    Command::Stop
                } else {
                    Command::Scan(self.scan.advance(self.half_width))
                }
            }
        }
    }
}
