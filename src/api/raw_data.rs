//! `GET /raw_events`, `/threads`, `/items`, `/embeddings/{thread_ts}` (§6):
//! read-only dumps of the raw and derived stores, used by the demo client
//! and operator debugging.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::model::{DigestItem, Embedding, Thread};
use crate::store::{event_store, item_store, thread_store};

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct RawEvent {
    pub event_id: String,
    pub received_at: f64,
    pub payload: serde_json::Value,
}

pub async fn raw_events(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<RawEvent>>> {
    let rows = event_store::fetch_raw_events(&state.pool, q.limit).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| RawEvent {
                event_id: r.event_id,
                received_at: r.received_at,
                payload: serde_json::from_str(&r.payload_json).unwrap_or(serde_json::Value::Null),
            })
            .collect(),
    ))
}

pub async fn threads(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<Thread>>> {
    Ok(Json(thread_store::fetch_threads(&state.pool, q.limit).await?))
}

pub async fn items(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Vec<DigestItem>>> {
    Ok(Json(item_store::fetch_items(&state.pool, q.limit).await?))
}

pub async fn embedding(
    State(state): State<Arc<ApiState>>,
    Path(thread_ts): Path<String>,
) -> ApiResult<Json<Embedding>> {
    match item_store::fetch_embedding(&state.pool, &thread_ts).await? {
        Some(embedding) => Ok(Json(embedding)),
        None => Err(super::error::ApiError(
            crate::error::ProfileError::UnknownEmbedding(thread_ts).into(),
        )),
    }
}
