//! Idempotent digest delivery over the chat platform (§4.10). Mirrors
//! `original_source/app/delivery.py`.

use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::chat::ChatClient;
use crate::error::Result;
use crate::model::{Delivery, DeliveryStatus, DigestViewItem};
use crate::store::schedule_store;

fn format_message(items: &[DigestViewItem]) -> String {
    let mut lines = vec!["Daily Digest".to_string()];
    for item in items {
        lines.push(format!("\u{2022} {} \u{2014} {}", item.title, item.why_shown));
    }
    lines.join("\n")
}

fn format_blocks(items: &[DigestViewItem]) -> Vec<Value> {
    let mut blocks = vec![json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": "*Daily Digest*" }
    })];
    for item in items {
        blocks.push(json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*{}*\n{}\n_{}_ ", item.title, item.summary, item.why_shown)
            }
        }));
    }
    blocks
}

pub enum DeliveryOutcome {
    Duplicate { delivery_id: String },
    Delivered { delivery: Delivery },
    Failed { delivery: Delivery },
}

/// Deliver `items` for `digest_id` to `user_id` in `team_id`. Idempotent:
/// if a delivery already exists for this digest, return it unchanged
/// rather than posting a second message.
pub async fn deliver_digest(
    pool: &SqlitePool,
    chat: &dyn ChatClient,
    digest_id: &str,
    team_id: &str,
    user_id: &str,
    items: &[DigestViewItem],
    now: f64,
) -> Result<DeliveryOutcome> {
    if let Some(existing) = schedule_store::fetch_delivery_by_digest(pool, digest_id).await? {
        return Ok(DeliveryOutcome::Duplicate {
            delivery_id: existing.delivery_id,
        });
    }

    let text = format_message(items);
    let blocks = format_blocks(items);
    let delivery_id = format!("del-{}", Uuid::new_v4().simple());

    match chat.post_digest_message(team_id, user_id, &text, &blocks).await {
        Ok(platform_message_id) => {
            schedule_store::insert_delivery(
                pool,
                &delivery_id,
                digest_id,
                team_id,
                user_id,
                now,
                DeliveryStatus::Delivered,
                Some(&platform_message_id),
                None,
            )
            .await?;
            Ok(DeliveryOutcome::Delivered {
                delivery: Delivery {
                    delivery_id,
                    digest_id: digest_id.to_string(),
                    team_id: team_id.to_string(),
                    user_id: user_id.to_string(),
                    delivered_at: now,
                    status: DeliveryStatus::Delivered,
                    platform_message_id: Some(platform_message_id),
                    error: None,
                },
            })
        }
        Err(e) => {
            let error = e.to_string();
            schedule_store::insert_delivery(
                pool,
                &delivery_id,
                digest_id,
                team_id,
                user_id,
                now,
                DeliveryStatus::Failed,
                None,
                Some(&error),
            )
            .await?;
            Ok(DeliveryOutcome::Failed {
                delivery: Delivery {
                    delivery_id,
                    digest_id: digest_id.to_string(),
                    team_id: team_id.to_string(),
                    user_id: user_id.to_string(),
                    delivered_at: now,
                    status: DeliveryStatus::Failed,
                    platform_message_id: None,
                    error: Some(error),
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entities, ScoreBreakdown};
    use async_trait::async_trait;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubChat {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ChatClient for StubChat {
        async fn exchange_code(&self, _code: &str, _redirect_uri: &str) -> Result<String> {
            Err(crate::error::DeliveryError::ExternalChatFailure("not exercised".into()).into())
        }

        async fn post_digest_message(
            &self,
            _team_id: &str,
            _user_id: &str,
            _text: &str,
            _blocks: &[Value],
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(crate::error::DeliveryError::ExternalChatFailure("boom".into()).into())
            } else {
                Ok("1234.5678".to_string())
            }
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await
            .unwrap();
        crate::db::initialize(&pool).await.unwrap();
        pool
    }

    fn sample_items() -> Vec<DigestViewItem> {
        vec![DigestViewItem {
            thread_ts: "100.0".into(),
            title: "Vendor A lead time".into(),
            summary: "8 week lead time flagged".into(),
            labels: vec!["RISK".into()],
            entities: Entities::default(),
            urgency: 0.6,
            why_shown: "Role match: vendor/lead time".into(),
            score_breakdown: ScoreBreakdown {
                final_score: 0.5,
                sim: 0.5,
                urgency: 0.6,
                ownership: 0.0,
                recency: 0.5,
                diversity_penalty: 0.0,
            },
        }]
    }

    #[tokio::test]
    async fn delivers_and_records_success() {
        let pool = test_pool().await;
        let chat = StubChat {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let outcome = deliver_digest(&pool, &chat, "dig-1", "T1", "u1", &sample_items(), 1000.0)
            .await
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_delivery_for_same_digest_is_a_noop() {
        let pool = test_pool().await;
        let chat = StubChat {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        deliver_digest(&pool, &chat, "dig-1", "T1", "u1", &sample_items(), 1000.0)
            .await
            .unwrap();
        let outcome = deliver_digest(&pool, &chat, "dig-1", "T1", "u1", &sample_items(), 2000.0)
            .await
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Duplicate { .. }));
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn records_failure_status_on_post_error() {
        let pool = test_pool().await;
        let chat = StubChat {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let outcome = deliver_digest(&pool, &chat, "dig-1", "T1", "u1", &sample_items(), 1000.0)
            .await
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Failed { .. }));
    }

    #[test]
    fn format_message_lists_title_and_reason() {
        let msg = format_message(&sample_items());
        assert!(msg.starts_with("Daily Digest"));
        assert!(msg.contains("Vendor A lead time"));
        assert!(msg.contains("Role match: vendor/lead time"));
    }
}
