//! Per-queue worker loops: reduce → enrich → embed → persist → record a
//! processed-count metric. Mirrors `workers.py::process_event`/`worker_loop`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::embedding;
use crate::enrichment;
use crate::model::EventPayload;
use crate::reducer;
use crate::store::item_store;

/// Process one inbound event end to end. A no-op if the reducer reports no
/// thread was touched (duplicate message, or an unrecognized event shape).
pub async fn process_event(pool: &SqlitePool, payload: &EventPayload, now: f64) -> crate::error::Result<()> {
    let event = payload.event.classify();
    let channel = match &event {
        crate::model::ThreadEvent::Message { channel, .. }
        | crate::model::ThreadEvent::MessageChanged { channel, .. }
        | crate::model::ThreadEvent::MessageDeleted { channel, .. }
        | crate::model::ThreadEvent::ReactionAdded { channel, .. }
        | crate::model::ThreadEvent::ReactionRemoved { channel, .. } => channel.clone(),
        crate::model::ThreadEvent::Unrecognized => return Ok(()),
    };

    let Some(thread_ts) = reducer::apply_event(pool, &event, now).await? else {
        return Ok(());
    };

    let (thread_text, messages) = reducer::thread_text(pool, &thread_ts).await?;
    let enriched = enrichment::enrich_thread(&thread_text, &messages);
    item_store::upsert_digest_item(
        pool,
        &thread_ts,
        &channel,
        &enriched.title,
        &enriched.labels,
        &enriched.entities,
        enriched.urgency,
        &enriched.summary,
        now,
    )
    .await?;

    let vector = embedding::compute_embedding(&thread_text);
    item_store::upsert_embedding(pool, &thread_ts, vector.len(), &vector, now).await?;

    Ok(())
}

/// Drain `rx` forever, processing one event at a time and recording a
/// processed-count metric per queue. Exits only when every sender for
/// `rx` has dropped.
pub async fn run_worker_loop(
    pool: Arc<SqlitePool>,
    queue_name: &'static str,
    mut rx: mpsc::UnboundedReceiver<EventPayload>,
    depth: Arc<AtomicI64>,
) {
    while let Some(payload) = rx.recv().await {
        let now = crate::time::unix_timestamp();
        if let Err(err) = process_event(&pool, &payload, now).await {
            tracing::error!(queue = queue_name, event_id = %payload.event_id, error = %err, "failed to process event");
        } else if let Err(err) = item_store::increment_metric(&pool, queue_name, now).await {
            tracing::error!(queue = queue_name, error = %err, "failed to record metric");
        }
        depth.fetch_sub(1, Ordering::SeqCst);
    }
    tracing::info!(queue = queue_name, "worker loop exiting: all senders dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InnerEvent;
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
    async fn process_event_enriches_and_embeds_a_new_thread() {
        let pool = test_pool().await;
        let payload = EventPayload {
            event_id: "e1".into(),
            event_time: None,
            event_ts: None,
            team_id: Some("T1".into()),
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "message".into(),
                channel: Some("C1".into()),
                ts: Some("100.0".into()),
                thread_ts: Some("100.0".into()),
                user: Some("U1".into()),
                text: Some("This is a blocker, decision needed by friday".into()),
                ..Default::default()
            },
        };
        process_event(&pool, &payload, 1000.0).await.unwrap();

        let item = item_store::fetch_items(&pool, 10).await.unwrap();
        assert_eq!(item.len(), 1);
        assert!(item[0].labels.contains(&"BLOCKER".to_string()));

        let embedding = item_store::fetch_embedding(&pool, "100.0").await.unwrap();
        assert!(embedding.is_some());
    }
}
