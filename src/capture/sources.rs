//! Capture collaborator traits.
//!
//! Implementations are platform- or deployment-specific and live outside
//! this crate; everything here is written against these seams so the
//! pipeline can run identically under X11, Wayland, macOS or a test
//! harness.

use std::sync::Arc;

use anyhow::Result;

/// Produces the current screen content as encoded PNG bytes.
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> Result<Vec<u8>>;
}

/// Reads metadata about the currently focused window.
pub trait WindowInspector: Send + Sync {
    fn active_window(&self) -> Result<WindowInfo>;
}

#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub app_name: String,
    pub title: String,
}

/// Extracts visible text from an encoded screenshot.
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, png_bytes: &[u8]) -> Result<String>;
}

/// Maps screenshots and free text into one shared vector space, so a text
/// query can be scored against image embeddings.
pub trait Embedder: Send + Sync {
    fn embed_image(&self, png_bytes: &[u8]) -> Result<Vec<f32>>;
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

/// The full set of collaborators the recorder drives each tick.
#[derive(Clone)]
pub struct CaptureDevices {
    pub screen: Arc<dyn ScreenSource>,
    pub windows: Arc<dyn WindowInspector>,
    pub ocr: Arc<dyn OcrEngine>,
    pub embedder: Arc<dyn Embedder>,
}
