//! Tabular anomaly detection over the activity log.
//!
//! An isolation forest over time-of-day, day-of-week and activity-category
//! features. "Anomalous" here means behaviorally unusual for this user,
//! e.g. entertainment at 3am on a weekday when the log is otherwise
//! daytime coding.

pub mod detector;
pub mod features;
pub mod forest;

pub use detector::ActivityAnomalyModel;
pub use forest::IsolationForest;

use serde::{Deserialize, Serialize};

/// Tunables for the isolation forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Number of trees in the ensemble
    pub num_trees: usize,
    /// Records subsampled (without replacement) per tree
    pub sample_size: usize,
    /// Scores above this are anomalies
    pub threshold: f64,
    /// Seed for reproducible fits
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: 256,
            threshold: 0.5,
            seed: 42,
        }
    }
}
