//! Ambient capture pipeline.
//!
//! Platform specifics (how to grab the screen, read the active window,
//! run OCR, embed images) live behind the traits in [`sources`]; this
//! module owns the loop that drives them on an interval and persists one
//! activity record per tick.

pub mod controller;
pub mod recorder;
pub mod sources;

pub use controller::RecorderController;
pub use sources::{CaptureDevices, Embedder, OcrEngine, ScreenSource, WindowInfo, WindowInspector};

use std::path::PathBuf;

/// Configuration for the capture loop.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Seconds between capture ticks
    pub interval_secs: u64,
    /// Abort a single capture that runs longer than this; OCR and
    /// embedding can wedge on pathological frames
    pub capture_timeout_secs: u64,
    /// Root directory for stored screenshots, one subdirectory per day
    pub screenshots_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            capture_timeout_secs: 30,
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}
