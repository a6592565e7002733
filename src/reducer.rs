//! Thread state reducer (§4.3): applies one chat event to the message
//! store, then recomputes the thread's aggregate from its full message
//! set. Recompute-don't-patch — every mutation re-derives `reply_count`,
//! `reaction_count`, `last_activity`, and `participants` from scratch
//! rather than incrementally patching them, so a late edit or deletion
//! can never leave the aggregate inconsistent with its messages.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::model::ThreadEvent;
use crate::store::thread_store;

/// Apply `event` to the store and recompute the affected thread's
/// aggregate. Returns the affected thread_ts, or `None` if the event was
/// unrecognized or a duplicate message insert (nothing to recompute).
pub async fn apply_event(pool: &SqlitePool, event: &ThreadEvent, now: f64) -> Result<Option<String>> {
    match event {
        ThreadEvent::Message {
            channel,
            ts,
            thread_ts,
            user,
            text,
            reactions,
        } => {
            let inserted = thread_store::insert_message(
                pool,
                channel,
                ts,
                thread_ts,
                user.as_deref(),
                text.as_deref(),
                reactions.as_deref().unwrap_or(&[]),
                now,
            )
            .await?;
            if !inserted {
                return Ok(None);
            }
            recompute_thread(pool, thread_ts, channel, now).await?;
            Ok(Some(thread_ts.clone()))
        }
        ThreadEvent::MessageChanged {
            channel,
            ts,
            thread_ts,
            text,
        } => {
            thread_store::update_message_text(pool, channel, ts, text.as_deref(), now).await?;
            recompute_thread(pool, thread_ts, channel, now).await?;
            Ok(Some(thread_ts.clone()))
        }
        ThreadEvent::MessageDeleted { channel, ts } => {
            let Some(message) = thread_store::fetch_message(pool, channel, ts).await? else {
                return Ok(None);
            };
            thread_store::mark_message_deleted(pool, channel, ts, now).await?;
            recompute_thread(pool, &message.thread_ts, channel, now).await?;
            Ok(Some(message.thread_ts))
        }
        ThreadEvent::ReactionAdded { channel, ts, name } => {
            let Some(message) = thread_store::fetch_message(pool, channel, ts).await? else {
                return Ok(None);
            };
            thread_store::update_message_reactions(pool, channel, ts, name, 1).await?;
            recompute_thread(pool, &message.thread_ts, channel, now).await?;
            Ok(Some(message.thread_ts))
        }
        ThreadEvent::ReactionRemoved { channel, ts, name } => {
            let Some(message) = thread_store::fetch_message(pool, channel, ts).await? else {
                return Ok(None);
            };
            thread_store::update_message_reactions(pool, channel, ts, name, -1).await?;
            recompute_thread(pool, &message.thread_ts, channel, now).await?;
            Ok(Some(message.thread_ts))
        }
        ThreadEvent::Unrecognized => Ok(None),
    }
}

/// Recompute a thread's aggregate (`threads` row) from its current message
/// set. Mirrors `threading.py::update_thread_stats`.
async fn recompute_thread(pool: &SqlitePool, thread_ts: &str, channel: &str, now: f64) -> Result<()> {
    let messages = thread_store::get_messages_for_thread(pool, thread_ts).await?;
    if messages.is_empty() {
        return Ok(());
    }
    let root_ts = thread_ts.to_string();
    let created_at = thread_ts.parse::<f64>().unwrap_or(now);

    let mut last_activity = 0.0;
    let mut reply_count = 0i64;
    let mut reaction_count = 0i64;
    let mut participants = Vec::new();

    for msg in &messages {
        let ts_val = msg.ts.parse::<f64>().unwrap_or(0.0);
        if ts_val > last_activity {
            last_activity = ts_val;
        }
        if msg.ts != thread_ts {
            reply_count += 1;
        }
        reaction_count += msg.reactions.iter().map(|r| r.count).sum::<i64>();
        if let Some(user) = &msg.user {
            participants.push(user.clone());
        }
    }

    thread_store::upsert_thread(
        pool,
        thread_ts,
        channel,
        &root_ts,
        created_at,
        last_activity,
        reply_count,
        reaction_count,
        &participants,
    )
    .await
}

/// Concatenate the text of every message in a thread, in timestamp order,
/// one line per message. Mirrors `threading.py::get_thread_text`, which
/// only skips falsy text and does not exclude deleted messages; the
/// deleted-message exclusion is a summary-only rule (§4.4), applied in
/// `build_summary` instead.
pub async fn thread_text(pool: &SqlitePool, thread_ts: &str) -> Result<(String, Vec<crate::model::Message>)> {
    let messages = thread_store::get_messages_for_thread(pool, thread_ts).await?;
    let text = messages
        .iter()
        .filter_map(|m| m.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    Ok((text, messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await
            .unwrap();
        crate::db::initialize(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn message_then_delete_recomputes_reply_count() {
        let pool = test_pool().await;
        let root = ThreadEvent::Message {
            channel: "C1".into(),
            ts: "100.0".into(),
            thread_ts: "100.0".into(),
            user: Some("U1".into()),
            text: Some("root".into()),
            reactions: None,
        };
        apply_event(&pool, &root, 1000.0).await.unwrap();
        let reply = ThreadEvent::Message {
            channel: "C1".into(),
            ts: "101.0".into(),
            thread_ts: "100.0".into(),
            user: Some("U2".into()),
            text: Some("reply".into()),
            reactions: None,
        };
        apply_event(&pool, &reply, 1001.0).await.unwrap();

        let thread = thread_store::get_thread(&pool, "100.0").await.unwrap().unwrap();
        assert_eq!(thread.reply_count, 1);

        apply_event(
            &pool,
            &ThreadEvent::MessageDeleted {
                channel: "C1".into(),
                ts: "101.0".into(),
            },
            1002.0,
        )
        .await
        .unwrap();

        let (text, _) = thread_text(&pool, "100.0").await.unwrap();
        assert_eq!(text, "root\nreply");
    }

    #[tokio::test]
    async fn duplicate_message_insert_is_a_noop() {
        let pool = test_pool().await;
        let event = ThreadEvent::Message {
            channel: "C1".into(),
            ts: "100.0".into(),
            thread_ts: "100.0".into(),
            user: Some("U1".into()),
            text: Some("root".into()),
            reactions: None,
        };
        let first = apply_event(&pool, &event, 1000.0).await.unwrap();
        let second = apply_event(&pool, &event, 1001.0).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
