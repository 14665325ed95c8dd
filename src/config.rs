//! Configuration for the anugam daemon
//!
//! Loads configuration from a TOML file with the minimal parameters needed
//! for the tracking control loop.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub hardware: HardwareConfig,
    pub video: VideoConfig,
    pub tracking: TrackingConfig,
    pub scan: ScanConfig,
    pub control: ControlConfig,
    pub logging: LoggingConfig,
}

/// Hardware configuration (serial link to the motor controller)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    /// Motor controller serial port (e.g. `/dev/ttyUSB0`, `COM5`)
    pub serial_port: String,
    /// Serial baud rate
    pub baud_rate: u32,
}

/// Video geometry and frame source selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    /// Frame source backend (`sim` is the only in-tree source; camera
    /// integrations plug in through the `FrameSource` trait)
    pub source: String,
    /// Frame width in pixels
    pub frame_width: u32,
    /// Frame height in pixels
    pub frame_height: u32,
}

/// Tracking and fusion parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Minimum detection confidence; observations below this never reach
    /// the estimator
    pub confidence_threshold: f32,
    /// Weight given to the secondary (bounding-box) detector when blending
    /// against the per-frame pose centroid
    pub secondary_blend: f32,
    /// Run the secondary detector every N frames (1 = every frame)
    pub detector_interval: u32,
}

/// Scan sweep parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Per-frame sweep magnitude increment
    pub step: i32,
}

/// Operator control channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// WebSocket bind address for mode commands
    ///
    /// Examples:
    /// - `127.0.0.1:8765` - Localhost only
    /// - `0.0.0.0:8765` - All interfaces
    pub bind_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareConfig {
                serial_port: "/dev/ttyUSB0".to_string(),
                baud_rate: 115_200,
            },
            video: VideoConfig {
                source: "sim".to_string(),
                frame_width: 640,
                frame_height: 480,
            },
            tracking: TrackingConfig {
                confidence_threshold: 0.5,
                secondary_blend: 0.3,
                detector_interval: 15,
            },
            scan: ScanConfig { step: 50 },
            control: ControlConfig {
                bind_address: "127.0.0.1:8765".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
