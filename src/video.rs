//! Frame type and acquisition seam
//!
//! Camera integration lives outside this crate; the control loop only
//! depends on the [`FrameSource`] trait.

use crate::error::Result;

/// One captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Raw pixel data, layout defined by the producing source
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame with no pixel payload (geometry only)
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Vec::new(),
        }
    }

    /// Horizontal center of the frame
    pub fn center_x(&self) -> i32 {
        (self.width / 2) as i32
    }
}

/// Frame acquisition backend
///
/// - `Ok(Some(frame))`: a frame was captured
/// - `Ok(None)`: transient dropout, the caller skips and retries
/// - `Err(_)`: persistent failure, the caller terminates the loop
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
