//! Activity record data model.
//!
//! Represents one row of the ambient activity log: a single capture tick
//! with its window metadata, screenshot location, OCR text and image
//! embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{classify_activity, Category};

/// One captured snapshot of desktop activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
    pub screenshot_path: Option<String>,
    pub ocr_text: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

impl ActivityRecord {
    /// Activity category, derived on read from the captured text fields.
    /// Never stored, so rule changes reclassify history for free.
    pub fn category(&self) -> Category {
        classify_activity(
            &self.app_name,
            &self.window_title,
            self.ocr_text.as_deref().unwrap_or(""),
        )
    }
}
