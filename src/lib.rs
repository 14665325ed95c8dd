//! Anugam - person-following chair control daemon
//!
//! Translates a person's position in a video frame into steering deltas for
//! a serial motor controller. Three long-running units of execution:
//!
//! - **Control loop**: frame -> detection -> centroid -> mode-gated command
//! - **Serial writer**: drains a one-slot coalescing mailbox into the link
//! - **Control channel**: WebSocket server switching the operating mode
//!
//! The only cross-unit state is the shared [`controller::Mode`] cell and the
//! command mailbox; a stale command is worse than a dropped one, so the
//! mailbox overwrites instead of queueing.

pub mod app;
pub mod centroid;
pub mod config;
pub mod control;
pub mod controller;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod sim;
pub mod video;

// Re-export commonly used types
pub use app::App;
pub use config::AppConfig;
pub use error::{Error, Result};
