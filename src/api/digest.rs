//! `GET /digest` (§6): the personalized ranked digest view.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::digest;
use crate::model::DigestViewItem;
use crate::profiles;
use crate::time;

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Deserialize)]
pub struct DigestQuery {
    pub user_id: String,
    pub project_id: String,
    #[serde(default = "default_n")]
    pub n: usize,
}

fn default_n() -> usize {
    10
}

pub async fn get_digest(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<DigestQuery>,
) -> ApiResult<Json<Vec<DigestViewItem>>> {
    profiles::check_channel_access(&state.pool, &q.user_id, &q.project_id).await?;
    let now = time::unix_timestamp();
    let built = digest::build_digest(
        &state.pool,
        &q.user_id,
        &q.project_id,
        q.n,
        state.config.query_weights,
        state.config.retrieval,
        now,
    )
    .await?;
    Ok(Json(built.items))
}
