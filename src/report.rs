//! Dashboard-facing analysis over the activity log.
//!
//! Everything here reads the log and derives views: the focus score
//! series, ranked semantic search, anomaly flags, and the per-day
//! breakdown and timeline. Nothing writes except
//! [`AnalysisService::set_reference_from_latest`].

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use serde::Serialize;

use crate::anomaly::{ActivityAnomalyModel, AnomalyConfig};
use crate::classify::Category;
use crate::db::{ActivityRecord, Database};
use crate::error::AnalysisResult;
use crate::focus::{relevance_score, ReferenceStore};
use crate::vision::{rank_visual_anomalies, Autoencoder, VisualAnomaly};

/// Focus scores for one day, oldest first.
///
/// `reference_set` lets a caller distinguish "no reference chosen yet"
/// from "a day of genuinely unfocused activity": both produce low scores.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSeries {
    pub reference_set: bool,
    pub points: Vec<FocusPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusPoint {
    pub timestamp: DateTime<Utc>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub record: ActivityRecord,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularAnomaly {
    pub record: ActivityRecord,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMinutes {
    pub category: Category,
    pub minutes: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBlock {
    pub block_start: DateTime<Utc>,
    pub category: Category,
}

/// Rank records against a query embedding, best first, truncated to
/// `top_n`. Records without an embedding score 0.0; a record whose
/// embedding dimension disagrees with the query is an error, not a
/// silent zero. Ties keep input order.
pub fn rank_by_relevance(
    query: &[f32],
    records: &[ActivityRecord],
    top_n: usize,
) -> AnalysisResult<Vec<SearchHit>> {
    let mut hits = Vec::with_capacity(records.len());
    for record in records {
        let score = relevance_score(record.embedding.as_deref(), Some(query))?;
        hits.push(SearchHit {
            record: record.clone(),
            score,
        });
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_n);
    Ok(hits)
}

/// Fit an anomaly model on the given records and return the flagged ones
/// with their scores, in input order.
pub fn detect_tabular_anomalies(
    records: &[ActivityRecord],
    config: &AnomalyConfig,
) -> AnalysisResult<Vec<TabularAnomaly>> {
    let model = ActivityAnomalyModel::fit(records, config)?;
    Ok(flag_records(&model, records))
}

fn flag_records(model: &ActivityAnomalyModel, records: &[ActivityRecord]) -> Vec<TabularAnomaly> {
    records
        .iter()
        .filter(|record| model.is_anomalous(record))
        .map(|record| TabularAnomaly {
            record: record.clone(),
            score: model.score(record),
        })
        .collect()
}

pub struct AnalysisService {
    db: Database,
    reference: ReferenceStore,
    capture_interval_secs: u64,
}

impl AnalysisService {
    pub fn new(db: Database, reference: ReferenceStore, capture_interval_secs: u64) -> Self {
        Self {
            db,
            reference,
            capture_interval_secs,
        }
    }

    /// Focus score for every record on `date`, scored against the stored
    /// reference embedding. Without a reference every point scores 0.0.
    pub async fn focus_score_series(&self, date: NaiveDate) -> Result<FocusSeries> {
        let records = self.db.activity_records_for_date(date).await?;
        let reference = self.reference.get()?;

        let mut points = Vec::with_capacity(records.len());
        for record in &records {
            let score = relevance_score(record.embedding.as_deref(), reference.as_deref())?;
            points.push(FocusPoint {
                timestamp: record.timestamp,
                score,
            });
        }

        Ok(FocusSeries {
            reference_set: reference.is_some(),
            points,
        })
    }

    /// Search one day of activity against a query embedding.
    pub async fn semantic_search(
        &self,
        query: &[f32],
        date: NaiveDate,
        top_n: usize,
    ) -> Result<Vec<SearchHit>> {
        let records = self.db.activity_records_for_date(date).await?;
        Ok(rank_by_relevance(query, &records, top_n)?)
    }

    /// Self-contained anomaly pass: fit on the day's records and flag
    /// within them.
    pub async fn tabular_anomalies(&self, date: NaiveDate) -> Result<Vec<TabularAnomaly>> {
        let records = self.db.activity_records_for_date(date).await?;
        Ok(detect_tabular_anomalies(&records, &AnomalyConfig::default())?)
    }

    /// Flag a day's records using a model trained elsewhere (usually over
    /// the full log).
    pub async fn tabular_anomalies_with(
        &self,
        model: &ActivityAnomalyModel,
        date: NaiveDate,
    ) -> Result<Vec<TabularAnomaly>> {
        let records = self.db.activity_records_for_date(date).await?;
        Ok(flag_records(model, &records))
    }

    /// The day's top `k` records by visual reconstruction error.
    pub async fn visual_anomalies(
        &self,
        model: &Autoencoder,
        date: NaiveDate,
        k: usize,
    ) -> Result<Vec<VisualAnomaly>> {
        let records = self.db.activity_records_for_date(date).await?;
        Ok(rank_visual_anomalies(model, &records, k))
    }

    /// Minutes spent per category, most first. Each record stands for one
    /// capture interval.
    pub async fn daily_breakdown(&self, date: NaiveDate) -> Result<Vec<CategoryMinutes>> {
        let records = self.db.activity_records_for_date(date).await?;

        let mut order: Vec<Category> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        for record in &records {
            let category = record.category();
            match order.iter().position(|c| *c == category) {
                Some(index) => counts[index] += 1,
                None => {
                    order.push(category);
                    counts.push(1);
                }
            }
        }

        let mut breakdown: Vec<CategoryMinutes> = order
            .into_iter()
            .zip(counts)
            .map(|(category, count)| CategoryMinutes {
                category,
                minutes: (count as u64 * self.capture_interval_secs) as f64 / 60.0,
            })
            .collect();
        breakdown.sort_by(|a, b| {
            b.minutes
                .partial_cmp(&a.minutes)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(breakdown)
    }

    /// The day as 10-minute blocks, each labeled with the block's majority
    /// category. Blocks with no records are omitted. A tie goes to the
    /// category observed first within the block.
    pub async fn activity_timeline(&self, date: NaiveDate) -> Result<Vec<TimelineBlock>> {
        let records = self.db.activity_records_for_date(date).await?;

        let mut blocks: Vec<(DateTime<Utc>, Vec<(Category, usize)>)> = Vec::new();
        for record in &records {
            let block_start = record
                .timestamp
                .duration_trunc(Duration::minutes(10))
                .context("failed to bucket timestamp")?;

            if blocks.last().map(|(start, _)| *start) != Some(block_start) {
                blocks.push((block_start, Vec::new()));
            }
            let tally = &mut blocks
                .last_mut()
                .context("timeline bucket missing")?
                .1;

            let category = record.category();
            match tally.iter_mut().find(|(c, _)| *c == category) {
                Some((_, count)) => *count += 1,
                None => tally.push((category, 1)),
            }
        }

        Ok(blocks
            .into_iter()
            .filter_map(|(block_start, tally)| {
                let (category, _) = tally
                    .into_iter()
                    .reduce(|best, next| if next.1 > best.1 { next } else { best })?;
                Some(TimelineBlock {
                    block_start,
                    category,
                })
            })
            .collect())
    }

    /// Nominate the most recent capture as the focus reference.
    pub async fn set_reference_from_latest(&self) -> Result<Vec<f32>> {
        let latest = match self.db.latest_activity_record().await? {
            Some(record) => record,
            None => bail!("activity log is empty; nothing to use as a reference"),
        };

        let embedding = match latest.embedding {
            Some(embedding) => embedding,
            None => bail!(
                "latest record ({}) has no embedding; was the embedder running?",
                latest.timestamp.to_rfc3339()
            ),
        };

        self.reference.set(&embedding)?;
        Ok(embedding)
    }
}
