use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Serialize an embedding for the `embedding_json` column. Records captured
/// while the embedder was unavailable carry no vector, stored as NULL.
pub fn encode_embedding(embedding: Option<&Vec<f32>>) -> Result<Option<String>> {
    embedding
        .map(|vector| serde_json::to_string(vector).context("failed to serialize embedding"))
        .transpose()
}

pub fn decode_embedding(raw: Option<String>, field: &str) -> Result<Option<Vec<f32>>> {
    raw.map(|json| {
        serde_json::from_str(&json).with_context(|| format!("failed to parse {field}"))
    })
    .transpose()
}
