//! Digest and interaction persistence.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::model::DigestViewItem;

pub async fn insert_digest(
    pool: &SqlitePool,
    digest_id: &str,
    user_id: &str,
    project_id: &str,
    items: &[DigestViewItem],
    created_at: f64,
) -> Result<()> {
    let items_json = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        "INSERT INTO digests (digest_id, user_id, project_id, created_at, items_json) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(digest_id)
    .bind(user_id)
    .bind(project_id)
    .bind(created_at)
    .bind(items_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub struct DigestRow {
    pub digest_id: String,
    pub user_id: String,
    pub project_id: String,
    pub created_at: f64,
    pub items: Vec<DigestViewItem>,
}

pub async fn fetch_digest(pool: &SqlitePool, digest_id: &str) -> Result<Option<DigestRow>> {
    let row: Option<(String, String, String, f64, String)> = sqlx::query_as(
        "SELECT digest_id, user_id, project_id, created_at, items_json FROM digests WHERE digest_id = ?",
    )
    .bind(digest_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(digest_id, user_id, project_id, created_at, items_json)| DigestRow {
        digest_id,
        user_id,
        project_id,
        created_at,
        items: serde_json::from_str(&items_json).unwrap_or_default(),
    }))
}

pub async fn insert_interaction(
    pool: &SqlitePool,
    interaction_id: &str,
    user_id: &str,
    project_id: &str,
    thread_ts: &str,
    action: &str,
    created_at: f64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO interactions (interaction_id, user_id, project_id, thread_ts, action, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(interaction_id)
    .bind(user_id)
    .bind(project_id)
    .bind(thread_ts)
    .bind(action)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}
