//! Message and thread aggregate persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{Message, Reaction, Thread};

fn row_to_message(row: &SqliteRow) -> Message {
    let reactions_json: Option<String> = row.try_get("reactions_json").unwrap_or(None);
    let reactions = reactions_json
        .and_then(|j| serde_json::from_str::<Vec<Reaction>>(&j).ok())
        .unwrap_or_default();
    Message {
        channel: row.try_get("channel").unwrap_or_default(),
        ts: row.try_get("ts").unwrap_or_default(),
        thread_ts: row.try_get("thread_ts").unwrap_or_default(),
        user: row.try_get("user").unwrap_or(None),
        text: row.try_get("text").unwrap_or(None),
        reactions,
        is_deleted: row.try_get::<i64, _>("is_deleted").unwrap_or(0) != 0,
        edited_at: row.try_get("edited_at").unwrap_or(None),
        created_at: row.try_get("created_at").unwrap_or(0.0),
    }
}

fn row_to_thread(row: &SqliteRow) -> Thread {
    let participants_json: Option<String> = row.try_get("participants_json").unwrap_or(None);
    let participants = participants_json
        .and_then(|j| serde_json::from_str::<Vec<String>>(&j).ok())
        .unwrap_or_default();
    Thread {
        thread_ts: row.try_get("thread_ts").unwrap_or_default(),
        channel: row.try_get("channel").unwrap_or_default(),
        root_ts: row.try_get("root_ts").unwrap_or_default(),
        created_at: row.try_get("created_at").unwrap_or(0.0),
        last_activity: row.try_get("last_activity").unwrap_or(0.0),
        reply_count: row.try_get("reply_count").unwrap_or(0),
        reaction_count: row.try_get("reaction_count").unwrap_or(0),
        participants,
    }
}

/// Insert a message if `(channel, ts)` hasn't been seen. Returns whether it
/// was newly inserted.
#[allow(clippy::too_many_arguments)]
pub async fn insert_message(
    pool: &SqlitePool,
    channel: &str,
    ts: &str,
    thread_ts: &str,
    user: Option<&str>,
    text: Option<&str>,
    reactions: &[Reaction],
    created_at: f64,
) -> Result<bool> {
    let reactions_json = if reactions.is_empty() {
        None
    } else {
        Some(serde_json::to_string(reactions).unwrap_or_else(|_| "[]".to_string()))
    };
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO messages
            (channel, ts, thread_ts, user, text, reactions_json, is_deleted, edited_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?)"#,
    )
    .bind(channel)
    .bind(ts)
    .bind(thread_ts)
    .bind(user)
    .bind(text)
    .bind(reactions_json)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_messages_for_thread(pool: &SqlitePool, thread_ts: &str) -> Result<Vec<Message>> {
    let rows = sqlx::query("SELECT * FROM messages WHERE thread_ts = ? ORDER BY CAST(ts AS REAL) ASC")
        .bind(thread_ts)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_message).collect())
}

pub async fn fetch_message(pool: &SqlitePool, channel: &str, ts: &str) -> Result<Option<Message>> {
    let row = sqlx::query("SELECT * FROM messages WHERE channel = ? AND ts = ?")
        .bind(channel)
        .bind(ts)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_message))
}

pub async fn update_message_text(
    pool: &SqlitePool,
    channel: &str,
    ts: &str,
    text: Option<&str>,
    edited_at: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE messages SET text = ?, edited_at = ?, is_deleted = 0 WHERE channel = ? AND ts = ?",
    )
    .bind(text)
    .bind(edited_at)
    .bind(channel)
    .bind(ts)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_message_deleted(
    pool: &SqlitePool,
    channel: &str,
    ts: &str,
    edited_at: f64,
) -> Result<()> {
    sqlx::query("UPDATE messages SET is_deleted = 1, edited_at = ? WHERE channel = ? AND ts = ?")
        .bind(edited_at)
        .bind(channel)
        .bind(ts)
        .execute(pool)
        .await?;
    Ok(())
}

/// Add or remove one count of `reaction` on a message, dropping entries
/// that reach zero. Mirrors `db.py::update_message_reactions`.
pub async fn update_message_reactions(
    pool: &SqlitePool,
    channel: &str,
    ts: &str,
    reaction: &str,
    delta: i64,
) -> Result<()> {
    let Some(message) = fetch_message(pool, channel, ts).await? else {
        return Ok(());
    };
    let mut reactions = message.reactions;
    let mut updated = false;
    for entry in reactions.iter_mut() {
        if entry.name == reaction {
            entry.count = (entry.count + delta).max(0);
            updated = true;
            break;
        }
    }
    if !updated && delta > 0 {
        reactions.push(Reaction {
            name: reaction.to_string(),
            count: 1,
        });
    }
    reactions.retain(|r| r.count > 0);
    let reactions_json = serde_json::to_string(&reactions).unwrap_or_else(|_| "[]".to_string());
    sqlx::query("UPDATE messages SET reactions_json = ? WHERE channel = ? AND ts = ?")
        .bind(reactions_json)
        .bind(channel)
        .bind(ts)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_thread(pool: &SqlitePool, thread_ts: &str) -> Result<Option<Thread>> {
    let row = sqlx::query("SELECT * FROM threads WHERE thread_ts = ?")
        .bind(thread_ts)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_thread))
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_thread(
    pool: &SqlitePool,
    thread_ts: &str,
    channel: &str,
    root_ts: &str,
    created_at: f64,
    last_activity: f64,
    reply_count: i64,
    reaction_count: i64,
    participants: &[String],
) -> Result<()> {
    let mut sorted: Vec<String> = participants.to_vec();
    sorted.sort();
    sorted.dedup();
    let participants_json = serde_json::to_string(&sorted).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"INSERT INTO threads
            (thread_ts, channel, root_ts, created_at, last_activity, reply_count, reaction_count, participants_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(thread_ts) DO UPDATE SET
                last_activity=excluded.last_activity,
                reply_count=excluded.reply_count,
                reaction_count=excluded.reaction_count,
                participants_json=excluded.participants_json"#,
    )
    .bind(thread_ts)
    .bind(channel)
    .bind(root_ts)
    .bind(created_at)
    .bind(last_activity)
    .bind(reply_count)
    .bind(reaction_count)
    .bind(participants_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_threads(pool: &SqlitePool, limit: i64) -> Result<Vec<Thread>> {
    let rows = sqlx::query("SELECT * FROM threads ORDER BY last_activity DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_thread).collect())
}
