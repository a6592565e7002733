//! Event intake: dedupe → persist raw payload → route to a queue.
//! Mirrors `ingest.py::ingest_payload`/`handle_slack_event`.

pub mod signature;

use sqlx::SqlitePool;

use crate::config::SignatureConfig;
use crate::error::{IntakeError, Result};
use crate::model::EventPayload;
use crate::queue::{self, QueueHandles};
use crate::store::event_store;

/// Result of ingesting one payload: whether it was newly queued, and its
/// (possibly routed) queue, for callers that care.
pub struct IngestOutcome {
    pub queued: bool,
    pub event_id: String,
}

/// Dedupe, persist, and route a payload to hot/standard. Used by
/// `/slack/events`, `/sim/events`, and `/seed_mock`.
pub async fn ingest_payload(
    pool: &SqlitePool,
    handles: &QueueHandles,
    payload: EventPayload,
    now: f64,
) -> Result<IngestOutcome> {
    let is_new = event_store::insert_dedupe(pool, &payload.event_id, now).await?;
    if !is_new {
        return Ok(IngestOutcome {
            queued: false,
            event_id: payload.event_id,
        });
    }
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| IntakeError::InvalidPayload(e.to_string()))?;
    event_store::insert_raw_event(pool, &payload.event_id, now, &payload_json).await?;
    let event_id = payload.event_id.clone();
    queue::route(handles, payload);
    Ok(IngestOutcome {
        queued: true,
        event_id,
    })
}

/// Dedupe, persist, and route a payload straight to the backfill queue,
/// bypassing hot/standard routing entirely. Used by `/backfill`.
pub async fn ingest_backfill(
    pool: &SqlitePool,
    handles: &QueueHandles,
    payload: EventPayload,
    now: f64,
) -> Result<IngestOutcome> {
    let is_new = event_store::insert_dedupe(pool, &payload.event_id, now).await?;
    if !is_new {
        return Ok(IngestOutcome {
            queued: false,
            event_id: payload.event_id,
        });
    }
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| IntakeError::InvalidPayload(e.to_string()))?;
    event_store::insert_raw_event(pool, &payload.event_id, now, &payload_json).await?;
    let event_id = payload.event_id.clone();
    queue::enqueue_backfill(handles, payload);
    Ok(IngestOutcome {
        queued: true,
        event_id,
    })
}

/// Verify a `/slack/events` request's signature per `signature`, raising
/// the appropriate `IntakeError` on failure. A no-op when verification is
/// disabled.
pub fn verify_request_signature(
    signature: &SignatureConfig,
    body: &[u8],
    timestamp: &str,
    signature_header: &str,
    now: f64,
) -> Result<()> {
    if !signature.enabled {
        return Ok(());
    }
    let Some(secret) = signature.signing_secret.as_deref() else {
        return Err(IntakeError::MissingSigningSecret.into());
    };
    if !self::signature::verify_signature(
        body,
        timestamp,
        signature_header,
        secret,
        now,
        signature.freshness_window_secs,
    ) {
        return Err(IntakeError::InvalidSignature.into());
    }
    Ok(())
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

    fn payload(event_id: &str) -> EventPayload {
        EventPayload {
            event_id: event_id.into(),
            event_time: None,
            event_ts: None,
            team_id: None,
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "message".into(),
                channel: Some("C1".into()),
                ts: Some("1.0".into()),
                text: Some("hello".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn duplicate_event_id_is_reported_as_duplicate() {
        let pool = test_pool().await;
        let (handles, _rx) = queue::new_queues();
        let first = ingest_payload(&pool, &handles, payload("e1"), 1.0).await.unwrap();
        assert!(first.queued);
        let second = ingest_payload(&pool, &handles, payload("e1"), 2.0).await.unwrap();
        assert!(!second.queued);
    }

    #[test]
    fn missing_secret_with_verification_enabled_errors() {
        let cfg = SignatureConfig {
            signing_secret: None,
            enabled: true,
            freshness_window_secs: 300,
        };
        let result = verify_request_signature(&cfg, b"{}", "1000", "v0=abc", 1000.0);
        assert!(result.is_err());
    }

    #[test]
    fn disabled_verification_always_passes() {
        let cfg = SignatureConfig {
            signing_secret: None,
            enabled: false,
            freshness_window_secs: 300,
        };
        assert!(verify_request_signature(&cfg, b"{}", "", "", 1000.0).is_ok());
    }
}
