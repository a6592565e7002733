//! Dedupe and raw-event persistence.

use sqlx::SqlitePool;

use crate::error::Result;

/// Insert the dedupe marker for `event_id`. Returns `true` if this is the
/// first time the event has been seen (mirrors `INSERT OR IGNORE` +
/// `rowcount == 1`).
pub async fn insert_dedupe(pool: &SqlitePool, event_id: &str, received_at: f64) -> Result<bool> {
    let result = sqlx::query("INSERT OR IGNORE INTO dedupe_events (event_id, received_at) VALUES (?, ?)")
        .bind(event_id)
        .bind(received_at)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_raw_event(
    pool: &SqlitePool,
    event_id: &str,
    received_at: f64,
    payload_json: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO raw_events (event_id, received_at, payload_json) VALUES (?, ?, ?)",
    )
    .bind(event_id)
    .bind(received_at)
    .bind(payload_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub struct RawEventRow {
    pub event_id: String,
    pub received_at: f64,
    pub payload_json: String,
}

pub async fn fetch_raw_events(pool: &SqlitePool, limit: i64) -> Result<Vec<RawEventRow>> {
    let rows = sqlx::query_as::<_, (String, f64, String)>(
        "SELECT event_id, received_at, payload_json FROM raw_events ORDER BY received_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(event_id, received_at, payload_json)| RawEventRow {
            event_id,
            received_at,
            payload_json,
        })
        .collect())
}
