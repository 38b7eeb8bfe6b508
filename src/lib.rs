//! daytrace: an ambient desktop activity log with focus scoring and
//! anomaly detection.
//!
//! A recorder loop periodically captures desktop state (screenshot, active
//! window, OCR text, image embedding) through the collaborator traits in
//! [`capture`] and persists one [`db::ActivityRecord`] per tick. The
//! analysis layer then derives productivity signals from the log:
//!
//! - a per-day focus score series against a user-chosen reference
//!   embedding ([`focus`], [`similarity`]),
//! - ranked semantic search over captured records ([`report`]),
//! - isolation-forest anomaly flags over time-of-day and category
//!   features ([`anomaly`]),
//! - a ranking of visually unusual screenshots by autoencoder
//!   reconstruction error ([`vision`]).
//!
//! Writers are expected to be externally serialized: one recorder loop,
//! one reference `set` or model re-fit at a time. Reads can happen
//! concurrently.

pub mod anomaly;
pub mod capture;
pub mod classify;
pub mod db;
pub mod error;
pub mod focus;
pub mod report;
pub mod similarity;
pub mod vision;

pub use db::{ActivityRecord, Database};
pub use error::{AnalysisError, AnalysisResult};
pub use report::AnalysisService;
