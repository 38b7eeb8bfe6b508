//! Feature engineering for the tabular anomaly model.

use chrono::{Datelike, Timelike};

use crate::classify::Category;
use crate::db::models::ActivityRecord;

/// The distinct categories present in a training set, sorted so the
/// one-hot layout is stable across fits of the same data.
pub fn category_vocabulary(records: &[ActivityRecord]) -> Vec<Category> {
    let mut vocabulary: Vec<Category> = records.iter().map(|r| r.category()).collect();
    vocabulary.sort();
    vocabulary.dedup();
    vocabulary
}

/// Numeric feature row for one record: hour of day, day of week
/// (Monday = 0), then one indicator per vocabulary category. A category
/// outside the vocabulary leaves every indicator at zero rather than
/// failing, so a model can score records captured after new rules were
/// added.
pub fn feature_row(record: &ActivityRecord, vocabulary: &[Category]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + vocabulary.len());
    row.push(f64::from(record.timestamp.hour()));
    row.push(f64::from(record.timestamp.weekday().num_days_from_monday()));

    let category = record.category();
    for known in vocabulary {
        row.push(if *known == category { 1.0 } else { 0.0 });
    }

    row
}
