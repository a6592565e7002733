//! `POST /feedback` (§6): apply one user feedback action.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::feedback;
use crate::time;

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub project_id: String,
    pub thread_ts: String,
    pub action: String,
}

#[derive(Serialize)]
pub struct FeedbackView {
    pub interaction_id: String,
    pub action: &'static str,
    pub direction: &'static str,
    pub new_norm: f64,
}

pub async fn submit(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Json<FeedbackView>> {
    let now = time::unix_timestamp();
    let result = feedback::apply_feedback(
        &state.pool,
        &req.user_id,
        &req.project_id,
        &req.thread_ts,
        &req.action,
        state.config.feedback,
        now,
    )
    .await?;
    Ok(Json(FeedbackView {
        interaction_id: result.interaction_id,
        action: result.action.as_str(),
        direction: result.direction,
        new_norm: result.new_norm,
    }))
}
