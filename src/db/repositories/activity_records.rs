use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{decode_embedding, encode_embedding, parse_datetime, to_u64},
    models::ActivityRecord,
};

fn row_to_record(row: &Row) -> Result<ActivityRecord> {
    let timestamp: String = row.get("timestamp")?;
    let embedding_json: Option<String> = row.get("embedding_json")?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        app_name: row.get("app_name")?,
        window_title: row.get("window_title")?,
        screenshot_path: row.get("screenshot_path")?,
        ocr_text: row.get("ocr_text")?,
        embedding: decode_embedding(embedding_json, "embedding_json")?,
    })
}

impl Database {
    pub async fn insert_activity_record(&self, record: &ActivityRecord) -> Result<i64> {
        let record = record.clone();
        self.execute(move |conn| {
            let embedding_json = encode_embedding(record.embedding.as_ref())?;
            conn.execute(
                "INSERT INTO activity_log (timestamp, app_name, window_title, screenshot_path, ocr_text, embedding_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.timestamp.to_rfc3339(),
                    record.app_name,
                    record.window_title,
                    record.screenshot_path,
                    record.ocr_text,
                    embedding_json,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// All records whose timestamp falls on the given UTC calendar date,
    /// oldest first.
    pub async fn activity_records_for_date(&self, date: NaiveDate) -> Result<Vec<ActivityRecord>> {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1);
        self.activity_records_between(start, end).await
    }

    /// Records in the half-open window `[start, end)`, oldest first.
    pub async fn activity_records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, app_name, window_title, screenshot_path, ocr_text, embedding_json
                 FROM activity_log
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC",
            )?;

            let mut rows = stmt.query(params![start.to_rfc3339(), end.to_rfc3339()])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// The whole log, oldest first. Used for offline model training,
    /// where the fit should see every capture ever made.
    pub async fn all_activity_records(&self) -> Result<Vec<ActivityRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, app_name, window_title, screenshot_path, ocr_text, embedding_json
                 FROM activity_log
                 ORDER BY timestamp ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn latest_activity_record(&self) -> Result<Option<ActivityRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, app_name, window_title, screenshot_path, ocr_text, embedding_json
                 FROM activity_log
                 ORDER BY timestamp DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query([])?;
            let record = match rows.next()? {
                Some(row) => Some(row_to_record(row)?),
                None => None,
            };
            Ok(record)
        })
        .await
    }

    pub async fn count_activity_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM activity_log", [], |row| row.get(0))?;
            to_u64(count, "count")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record_at(timestamp: DateTime<Utc>, app_name: &str) -> ActivityRecord {
        ActivityRecord {
            id: None,
            timestamp,
            app_name: app_name.to_string(),
            window_title: format!("{app_name} window"),
            screenshot_path: Some("screenshots/2026-03-02/10-00-00.png".to_string()),
            ocr_text: Some("fn main() {}".to_string()),
            embedding: Some(vec![0.25, -0.5, 1.0]),
        }
    }

    fn temp_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("daytrace.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_insert_and_fetch_round_trip() {
        let (_dir, db) = temp_database();
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let record = record_at(timestamp, "Code.exe");

        let id = db.insert_activity_record(&record).await.unwrap();
        assert!(id > 0);

        let fetched = db
            .activity_records_for_date(timestamp.date_naive())
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, Some(id));
        assert_eq!(fetched[0].timestamp, timestamp);
        assert_eq!(fetched[0].app_name, "Code.exe");
        assert_eq!(fetched[0].embedding, Some(vec![0.25, -0.5, 1.0]));
    }

    #[tokio::test]
    async fn test_date_window_excludes_neighboring_days() {
        let (_dir, db) = temp_database();
        let on_day = Utc.with_ymd_and_hms(2026, 3, 2, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap();

        db.insert_activity_record(&record_at(on_day, "firefox"))
            .await
            .unwrap();
        db.insert_activity_record(&record_at(next_day, "firefox"))
            .await
            .unwrap();

        let fetched = db
            .activity_records_for_date(on_day.date_naive())
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].timestamp, on_day);
    }

    #[tokio::test]
    async fn test_records_without_embedding_round_trip_as_none() {
        let (_dir, db) = temp_database();
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap();
        let mut record = record_at(timestamp, "slack");
        record.embedding = None;
        record.ocr_text = None;
        record.screenshot_path = None;

        db.insert_activity_record(&record).await.unwrap();
        let fetched = db
            .activity_records_for_date(timestamp.date_naive())
            .await
            .unwrap();
        assert_eq!(fetched[0].embedding, None);
        assert_eq!(fetched[0].ocr_text, None);
        assert_eq!(fetched[0].screenshot_path, None);
    }

    #[tokio::test]
    async fn test_latest_record_and_count() {
        let (_dir, db) = temp_database();
        assert!(db.latest_activity_record().await.unwrap().is_none());
        assert_eq!(db.count_activity_records().await.unwrap(), 0);

        let earlier = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        db.insert_activity_record(&record_at(earlier, "outlook"))
            .await
            .unwrap();
        db.insert_activity_record(&record_at(later, "Code.exe"))
            .await
            .unwrap();

        let latest = db.latest_activity_record().await.unwrap().unwrap();
        assert_eq!(latest.timestamp, later);
        assert_eq!(db.count_activity_records().await.unwrap(), 2);
    }
}
