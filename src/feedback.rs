//! Online user-vector feedback loop (§4.8): decay toward the role vector
//! when stale, then blend in the acted-on item's embedding. Mirrors
//! `feedback.py::apply_feedback`.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::FeedbackConfig;
use crate::embedding::normalize;
use crate::error::{FeedbackError, ProfileError, Result};
use crate::model::FeedbackAction;
use crate::store::{digest_store, item_store, profile_store};

pub struct FeedbackResult {
    pub interaction_id: String,
    pub action: FeedbackAction,
    pub direction: &'static str,
    pub new_vector: Vec<f64>,
    pub new_norm: f64,
}

/// Decay `user_vec` toward `role_vec` if more than `decay_days` have
/// elapsed since `last_updated`. Mirrors `feedback.py::_decay_user_vector`.
fn decay_user_vector(
    user_vec: &[f64],
    role_vec: &[f64],
    last_updated: f64,
    now: f64,
    cfg: FeedbackConfig,
) -> Vec<f64> {
    if now - last_updated <= cfg.decay_days * 86400.0 {
        return user_vec.to_vec();
    }
    let blended: Vec<f64> = user_vec
        .iter()
        .zip(role_vec)
        .map(|(u, r)| (1.0 - cfg.decay_blend) * u + cfg.decay_blend * r)
        .collect();
    normalize(&blended)
}

/// Apply one feedback action: decay the user vector if stale, blend
/// toward (positive) or away from (negative) the item's embedding, and
/// persist both the new vector and an append-only interaction row.
pub async fn apply_feedback(
    pool: &SqlitePool,
    user_id: &str,
    project_id: &str,
    thread_ts: &str,
    action: &str,
    cfg: FeedbackConfig,
    now: f64,
) -> Result<FeedbackResult> {
    let action = FeedbackAction::parse(action)
        .ok_or_else(|| FeedbackError::InvalidAction(action.to_string()))?;

    let user = profile_store::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownUser(user_id.to_string()))?;
    let role_id = user
        .role_id
        .clone()
        .ok_or_else(|| ProfileError::UnknownRole(String::new()))?;
    let role = profile_store::fetch_role(pool, &role_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownRole(role_id.clone()))?;
    let embedding = item_store::fetch_embedding(pool, thread_ts)
        .await?
        .ok_or_else(|| ProfileError::UnknownEmbedding(thread_ts.to_string()))?;

    let raw_user_vec = user.user_vector.unwrap_or_else(|| role.role_vector.clone());
    let user_vec = normalize(&raw_user_vec);
    let user_vec = decay_user_vector(&user_vec, &role.role_vector, user.updated_at, now, cfg);
    let item_vec = normalize(&embedding.vector);

    let (updated, direction) = if action.is_positive() {
        let v: Vec<f64> = user_vec
            .iter()
            .zip(&item_vec)
            .map(|(u, v)| cfg.alpha * u + (1.0 - cfg.alpha) * v)
            .collect();
        (v, "toward")
    } else {
        let v: Vec<f64> = user_vec
            .iter()
            .zip(&item_vec)
            .map(|(u, v)| cfg.alpha * u - (1.0 - cfg.alpha) * v)
            .collect();
        (v, "away")
    };
    let updated = normalize(&updated);

    let interaction_id = format!("int-{}", Uuid::new_v4().simple());
    digest_store::insert_interaction(
        pool,
        &interaction_id,
        user_id,
        project_id,
        thread_ts,
        action.as_str(),
        now,
    )
    .await?;
    profile_store::update_user_vector(pool, user_id, &updated, now).await?;

    let new_norm = updated.iter().map(|v| v * v).sum::<f64>().sqrt();
    Ok(FeedbackResult {
        interaction_id,
        action,
        direction,
        new_vector: updated,
        new_norm,
    })
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

    async fn seed(pool: &SqlitePool) {
        profile_store::upsert_role(pool, "r1", "ME", "structures materials", &[1.0, 0.0], 0.0)
            .await
            .unwrap();
        profile_store::upsert_user(pool, "u1", "Maya", None, Some("r1"), Some(&[1.0, 0.0]), 0.0)
            .await
            .unwrap();
        item_store::upsert_embedding(pool, "100.0", 2, &[0.0, 1.0], 0.0).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_action_is_rejected() {
        let pool = test_pool().await;
        seed(&pool).await;
        let result = apply_feedback(
            &pool,
            "u1",
            "p1",
            "100.0",
            "not_a_real_action",
            FeedbackConfig::default(),
            1000.0,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn positive_action_increases_dot_with_item_vector() {
        let pool = test_pool().await;
        seed(&pool).await;
        let before_dot = 1.0 * 0.0 + 0.0 * 1.0;
        let result = apply_feedback(
            &pool,
            "u1",
            "p1",
            "100.0",
            "thumbs_up",
            FeedbackConfig::default(),
            1000.0,
        )
        .await
        .unwrap();
        let after_dot: f64 = result.new_vector[0] * 0.0 + result.new_vector[1] * 1.0;
        assert!(after_dot > before_dot);
        assert!((result.new_norm - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn negative_action_decreases_dot_with_item_vector() {
        let pool = test_pool().await;
        seed(&pool).await;
        let result = apply_feedback(
            &pool,
            "u1",
            "p1",
            "100.0",
            "dismiss",
            FeedbackConfig::default(),
            1000.0,
        )
        .await
        .unwrap();
        let after_dot: f64 = result.new_vector[1];
        assert!(after_dot < 0.0);
    }

    #[tokio::test]
    async fn unknown_embedding_errors() {
        let pool = test_pool().await;
        seed(&pool).await;
        let result = apply_feedback(
            &pool,
            "u1",
            "p1",
            "no-such-thread",
            "click",
            FeedbackConfig::default(),
            1000.0,
        )
        .await;
        assert!(result.is_err());
    }
}
