//! `GET /debug/query_vector`, `/debug/retrieve`, `/debug/rerank` (§6):
//! diagnostic views onto the retrieval pipeline, truncated to the first
//! 20 vector dimensions.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::profiles;
use crate::rerank;
use crate::retrieval::{self, CandidateFilter};
use crate::time;

use super::error::ApiResult;
use super::state::ApiState;

const DEBUG_DIM_LIMIT: usize = 20;
const DEBUG_RETRIEVE_K: usize = 50;

fn truncated(v: &[f64]) -> Vec<f64> {
    v.iter().take(DEBUG_DIM_LIMIT).copied().collect()
}

#[derive(Deserialize)]
pub struct UserProjectQuery {
    pub user_id: String,
    pub project_id: String,
}

#[derive(Serialize)]
pub struct QueryVectorView {
    pub q_vector: Vec<f64>,
    pub weights: (f64, f64, f64),
    pub component_norms: (f64, f64, f64),
}

pub async fn query_vector(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<UserProjectQuery>,
) -> ApiResult<Json<QueryVectorView>> {
    let ctx = profiles::get_query_vector(&state.pool, &q.user_id, &q.project_id, state.config.query_weights).await?;
    Ok(Json(QueryVectorView {
        q_vector: truncated(&ctx.result.q_vector),
        weights: (ctx.result.weights.role, ctx.result.weights.user, ctx.result.weights.phase),
        component_norms: (
            ctx.result.component_norms.role,
            ctx.result.component_norms.user,
            ctx.result.component_norms.phase,
        ),
    }))
}

#[derive(Serialize)]
pub struct RetrievedItem {
    pub thread_ts: String,
    pub title: String,
    pub sim_score: f64,
    pub urgency: f64,
    pub vector: Vec<f64>,
}

pub async fn retrieve(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<UserProjectQuery>,
) -> ApiResult<Json<Vec<RetrievedItem>>> {
    let now = time::unix_timestamp();
    let ctx = profiles::get_query_vector(&state.pool, &q.user_id, &q.project_id, state.config.query_weights).await?;
    let filter = CandidateFilter {
        project_id: Some(q.project_id.clone()),
        channels: None,
        since_ts: None,
        label_filter: Vec::new(),
    };
    let candidates =
        retrieval::load_candidate_items(&state.pool, filter, state.config.retrieval.window_hours, now).await?;
    let top = retrieval::retrieve_top_k(&ctx.result.q_vector, candidates, DEBUG_RETRIEVE_K);
    Ok(Json(
        top.into_iter()
            .map(|sc| RetrievedItem {
                thread_ts: sc.candidate.thread_ts,
                title: sc.candidate.title,
                sim_score: sc.sim_score,
                urgency: sc.candidate.urgency,
                vector: truncated(&sc.candidate.vector),
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct RerankQuery {
    pub user_id: String,
    pub project_id: String,
    #[serde(default = "default_n")]
    pub n: usize,
}

fn default_n() -> usize {
    10
}

#[derive(Serialize)]
pub struct RerankedItem {
    pub thread_ts: String,
    pub title: String,
    pub base_score: f64,
    pub final_score: f64,
    pub force_included: bool,
    pub diversity_penalty: f64,
}

pub async fn rerank_view(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<RerankQuery>,
) -> ApiResult<Json<Vec<RerankedItem>>> {
    let now = time::unix_timestamp();
    let ctx = profiles::get_query_vector(&state.pool, &q.user_id, &q.project_id, state.config.query_weights).await?;
    let filter = CandidateFilter {
        project_id: Some(q.project_id.clone()),
        channels: None,
        since_ts: None,
        label_filter: Vec::new(),
    };
    let candidates =
        retrieval::load_candidate_items(&state.pool, filter, state.config.retrieval.window_hours, now).await?;
    let top = retrieval::retrieve_top_k(&ctx.result.q_vector, candidates, DEBUG_RETRIEVE_K);
    let ranked = rerank::rerank_candidates(&state.pool, top, &q.user_id, q.n, 0.2, state.config.retrieval.window_hours, now).await?;
    Ok(Json(
        ranked
            .into_iter()
            .map(|r| RerankedItem {
                thread_ts: r.thread_ts,
                title: r.title,
                base_score: r.base_score,
                final_score: r.final_score,
                force_included: r.force_included,
                diversity_penalty: r.diversity_penalty,
            })
            .collect(),
    ))
}
