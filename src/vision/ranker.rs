//! Ranking of records by visual reconstruction error.

use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::db::models::ActivityRecord;
use crate::vision::autoencoder::Autoencoder;
use crate::vision::preprocess::load_screenshot;

/// One record paired with how poorly the autoencoder reconstructed its
/// screenshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualAnomaly {
    pub record: ActivityRecord,
    pub reconstruction_error: f32,
}

/// Rank records by reconstruction error, highest first, truncated to `k`.
///
/// A record whose screenshot is missing or unreadable scores 0.0 instead
/// of failing the whole ranking; screenshots get cleaned up by hand and a
/// report over old records must survive that. Ties keep input (time)
/// order, so repeated runs over the same log agree.
pub fn rank_visual_anomalies(
    model: &Autoencoder,
    records: &[ActivityRecord],
    k: usize,
) -> Vec<VisualAnomaly> {
    let mut ranked: Vec<VisualAnomaly> = records
        .iter()
        .map(|record| VisualAnomaly {
            record: record.clone(),
            reconstruction_error: screenshot_error(model, record),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.reconstruction_error
            .partial_cmp(&a.reconstruction_error)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);
    ranked
}

fn screenshot_error(model: &Autoencoder, record: &ActivityRecord) -> f32 {
    let Some(path) = record.screenshot_path.as_deref() else {
        return 0.0;
    };

    let frame = match load_screenshot(Path::new(path), model.side()) {
        Ok(frame) => frame,
        Err(err) => {
            warn!("Could not read screenshot {path}: {err}");
            return 0.0;
        }
    };

    match model.reconstruction_error(&frame) {
        Ok(error) => error,
        Err(err) => {
            warn!("Could not score screenshot {path}: {err}");
            0.0
        }
    }
}
