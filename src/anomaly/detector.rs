//! Activity-level anomaly model: feature extraction plus a fitted forest.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::anomaly::features::{category_vocabulary, feature_row};
use crate::anomaly::{AnomalyConfig, IsolationForest};
use crate::classify::Category;
use crate::db::models::ActivityRecord;
use crate::error::{AnalysisError, AnalysisResult};

/// A fitted anomaly model over activity records.
///
/// Carries the category vocabulary observed at fit time so the one-hot
/// layout at scoring time matches training exactly, and the config it was
/// fitted with so a reloaded artifact reports how it was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAnomalyModel {
    vocabulary: Vec<Category>,
    forest: IsolationForest,
    config: AnomalyConfig,
}

impl ActivityAnomalyModel {
    pub fn fit(records: &[ActivityRecord], config: &AnomalyConfig) -> AnalysisResult<Self> {
        if records.is_empty() {
            return Err(AnalysisError::InsufficientData { needed: 1, got: 0 });
        }

        let vocabulary = category_vocabulary(records);
        let rows: Vec<Vec<f64>> = records
            .iter()
            .map(|record| feature_row(record, &vocabulary))
            .collect();
        let forest = IsolationForest::fit(&rows, config)?;

        Ok(Self {
            vocabulary,
            forest,
            config: config.clone(),
        })
    }

    /// Anomaly score for one record, in (0, 1].
    pub fn score(&self, record: &ActivityRecord) -> f64 {
        self.forest.score(&feature_row(record, &self.vocabulary))
    }

    pub fn is_anomalous(&self, record: &ActivityRecord) -> bool {
        self.score(record) > self.config.threshold
    }

    /// One flag per input record, in input order.
    pub fn predict(&self, records: &[ActivityRecord]) -> Vec<bool> {
        records.iter().map(|r| self.is_anomalous(r)).collect()
    }

    pub fn save(&self, path: &Path) -> AnalysisResult<()> {
        let serialized = serde_json::to_string(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Load a previously saved model. A missing file is reported as
    /// "not trained yet" so callers can prompt for training instead of
    /// showing a corruption error.
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        if !path.exists() {
            return Err(AnalysisError::ModelNotTrained {
                path: path.display().to_string(),
            });
        }

        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| AnalysisError::ModelLoadFailure {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record_at(hour: u32, minute: u32, app_name: &str, title: &str) -> ActivityRecord {
        ActivityRecord {
            id: None,
            // 2026-03-02 is a Monday
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap(),
            app_name: app_name.to_string(),
            window_title: title.to_string(),
            screenshot_path: None,
            ocr_text: None,
            embedding: None,
        }
    }

    fn daytime_coding_with_night_video() -> Vec<ActivityRecord> {
        let mut records: Vec<ActivityRecord> = (0..99)
            .map(|i| record_at(14, i % 60, "code.exe", "main.rs"))
            .collect();
        records.push(record_at(3, 0, "chrome", "late night - YouTube"));
        records
    }

    #[test]
    fn test_rare_pattern_is_flagged() {
        let records = daytime_coding_with_night_video();
        let model = ActivityAnomalyModel::fit(&records, &AnomalyConfig::default()).unwrap();

        assert!(model.is_anomalous(&records[99]));
        assert!(!model.is_anomalous(&records[0]));
        assert!(model.score(&records[99]) > model.score(&records[0]));

        let flags = model.predict(&records);
        assert_eq!(flags.len(), 100);
        assert_eq!(flags.iter().filter(|flag| **flag).count(), 1);
        assert!(flags[99]);
    }

    #[test]
    fn test_unseen_category_scores_without_panicking() {
        let records: Vec<ActivityRecord> = (0..32)
            .map(|i| record_at(10, i % 60, "code.exe", "lib.rs"))
            .collect();
        let model = ActivityAnomalyModel::fit(&records, &AnomalyConfig::default()).unwrap();

        let unseen = record_at(10, 30, "chrome", "inbox - Gmail");
        let score = model.score(&unseen);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_save_load_reproduces_scores_exactly() {
        let records = daytime_coding_with_night_video();
        let model = ActivityAnomalyModel::fit(&records, &AnomalyConfig::default()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_model.json");
        model.save(&path).unwrap();
        let reloaded = ActivityAnomalyModel::load(&path).unwrap();

        for record in &records {
            assert_eq!(model.score(record), reloaded.score(record));
            assert_eq!(model.is_anomalous(record), reloaded.is_anomalous(record));
        }
    }

    #[test]
    fn test_load_missing_file_reports_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let err = ActivityAnomalyModel::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, AnalysisError::ModelNotTrained { .. }));
    }

    #[test]
    fn test_load_corrupt_file_reports_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity_model.json");
        std::fs::write(&path, "not a model").unwrap();

        let err = ActivityAnomalyModel::load(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::ModelLoadFailure { .. }));
    }

    #[test]
    fn test_fit_on_empty_log_errors() {
        let err = ActivityAnomalyModel::fit(&[], &AnomalyConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }
}
