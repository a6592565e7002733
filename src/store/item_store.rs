//! Digest-item, embedding, and job-metric persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{DigestItem, Embedding, Entities};

fn row_to_item(row: &SqliteRow) -> DigestItem {
    let labels_json: Option<String> = row.try_get("labels_json").unwrap_or(None);
    let labels = labels_json
        .and_then(|j| serde_json::from_str::<Vec<String>>(&j).ok())
        .unwrap_or_default();
    let entities_json: Option<String> = row.try_get("entities_json").unwrap_or(None);
    let entities = entities_json
        .and_then(|j| serde_json::from_str::<Entities>(&j).ok())
        .unwrap_or_default();
    DigestItem {
        thread_ts: row.try_get("thread_ts").unwrap_or_default(),
        channel: row.try_get("channel").unwrap_or_default(),
        title: row.try_get("title").unwrap_or_default(),
        labels,
        entities,
        urgency: row.try_get("urgency").unwrap_or(0.0),
        summary: row.try_get("summary").unwrap_or_default(),
        updated_at: row.try_get("updated_at").unwrap_or(0.0),
    }
}

fn row_to_embedding(row: &SqliteRow) -> Embedding {
    let vector_json: String = row.try_get("vector_json").unwrap_or_else(|_| "[]".to_string());
    let vector = serde_json::from_str::<Vec<f64>>(&vector_json).unwrap_or_default();
    Embedding {
        thread_ts: row.try_get("thread_ts").unwrap_or_default(),
        dim: row.try_get::<i64, _>("dim").unwrap_or(0) as usize,
        vector,
        updated_at: row.try_get("updated_at").unwrap_or(0.0),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_digest_item(
    pool: &SqlitePool,
    thread_ts: &str,
    channel: &str,
    title: &str,
    labels: &[String],
    entities: &Entities,
    urgency: f64,
    summary: &str,
    updated_at: f64,
) -> Result<()> {
    let mut sorted_labels: Vec<String> = labels.to_vec();
    sorted_labels.sort();
    sorted_labels.dedup();
    let labels_json = serde_json::to_string(&sorted_labels).unwrap_or_else(|_| "[]".to_string());
    let entities_json = serde_json::to_string(entities).unwrap_or_else(|_| "{}".to_string());
    sqlx::query(
        r#"INSERT INTO digest_items
            (thread_ts, channel, title, labels_json, entities_json, urgency, summary, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(thread_ts) DO UPDATE SET
                title=excluded.title,
                labels_json=excluded.labels_json,
                entities_json=excluded.entities_json,
                urgency=excluded.urgency,
                summary=excluded.summary,
                updated_at=excluded.updated_at"#,
    )
    .bind(thread_ts)
    .bind(channel)
    .bind(title)
    .bind(labels_json)
    .bind(entities_json)
    .bind(urgency)
    .bind(summary)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn upsert_embedding(
    pool: &SqlitePool,
    thread_ts: &str,
    dim: usize,
    vector: &[f64],
    updated_at: f64,
) -> Result<()> {
    let vector_json = serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"INSERT INTO embeddings (thread_ts, dim, vector_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(thread_ts) DO UPDATE SET
                dim=excluded.dim,
                vector_json=excluded.vector_json,
                updated_at=excluded.updated_at"#,
    )
    .bind(thread_ts)
    .bind(dim as i64)
    .bind(vector_json)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn increment_metric(pool: &SqlitePool, queue_name: &str, processed_at: f64) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO job_metrics (queue_name, processed_count, last_processed_at)
            VALUES (?, 1, ?)
            ON CONFLICT(queue_name) DO UPDATE SET
                processed_count=processed_count + 1,
                last_processed_at=excluded.last_processed_at"#,
    )
    .bind(queue_name)
    .bind(processed_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub struct MetricRow {
    pub queue_name: String,
    pub processed_count: i64,
    pub last_processed_at: Option<f64>,
}

pub async fn fetch_metrics(pool: &SqlitePool) -> Result<Vec<MetricRow>> {
    let rows = sqlx::query_as::<_, (String, i64, Option<f64>)>(
        "SELECT queue_name, processed_count, last_processed_at FROM job_metrics",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(queue_name, processed_count, last_processed_at)| MetricRow {
            queue_name,
            processed_count,
            last_processed_at,
        })
        .collect())
}

pub async fn fetch_items(pool: &SqlitePool, limit: i64) -> Result<Vec<DigestItem>> {
    let rows = sqlx::query("SELECT * FROM digest_items ORDER BY updated_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_item).collect())
}

pub async fn fetch_embedding(pool: &SqlitePool, thread_ts: &str) -> Result<Option<Embedding>> {
    let row = sqlx::query("SELECT * FROM embeddings WHERE thread_ts = ?")
        .bind(thread_ts)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_embedding))
}
