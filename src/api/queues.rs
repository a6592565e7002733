//! `GET /queues/status` (§6): per-queue depth and processed-count metrics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::store::item_store;

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Serialize)]
pub struct QueueStatus {
    pub name: &'static str,
    pub size: i64,
    pub processed_count: i64,
    pub last_processed_at: Option<f64>,
}

pub async fn status(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<QueueStatus>>> {
    let metrics = item_store::fetch_metrics(&state.pool).await?;
    let metric_for = |name: &str| {
        metrics
            .iter()
            .find(|m| m.queue_name == name)
            .map(|m| (m.processed_count, m.last_processed_at))
            .unwrap_or((0, None))
    };

    let depths = &state.handles.depths;
    let names = [
        ("hot", depths.hot.load(Ordering::SeqCst)),
        ("standard", depths.standard.load(Ordering::SeqCst)),
        ("backfill", depths.backfill.load(Ordering::SeqCst)),
    ];

    Ok(Json(
        names
            .into_iter()
            .map(|(name, size)| {
                let (processed_count, last_processed_at) = metric_for(name);
                QueueStatus {
                    name,
                    size,
                    processed_count,
                    last_processed_at,
                }
            })
            .collect(),
    ))
}
