//! `POST /schedules`, `POST /schedules/{id}/run_now` (§6, §8 scenario 6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ScheduleCron;
use crate::scheduler;
use crate::store::schedule_store;
use crate::time;

use super::error::{ApiError, ApiResult};
use super::state::ApiState;

#[derive(Deserialize)]
pub struct CreateScheduleRequest {
    pub team_id: String,
    pub project_id: String,
    pub user_id: String,
    pub time_of_day: String,
    pub timezone: String,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize)]
pub struct ScheduleView {
    pub schedule_id: String,
    pub team_id: String,
    pub project_id: String,
    pub user_id: String,
    pub time_of_day: String,
    pub timezone: String,
    pub is_enabled: bool,
}

pub async fn create_schedule(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateScheduleRequest>,
) -> ApiResult<Json<ScheduleView>> {
    let now = time::unix_timestamp();
    let schedule_id = format!("sch-{}", Uuid::new_v4().simple());
    let cron = ScheduleCron {
        time_of_day: req.time_of_day.clone(),
        timezone: req.timezone.clone(),
    };
    schedule_store::insert_schedule(
        &state.pool,
        &schedule_id,
        &req.team_id,
        &req.project_id,
        &req.user_id,
        &cron,
        req.is_enabled,
        now,
    )
    .await?;
    Ok(Json(ScheduleView {
        schedule_id,
        team_id: req.team_id,
        project_id: req.project_id,
        user_id: req.user_id,
        time_of_day: req.time_of_day,
        timezone: req.timezone,
        is_enabled: req.is_enabled,
    }))
}

#[derive(Serialize)]
#[serde(tag = "status")]
pub enum RunNowResponse {
    #[serde(rename = "delivered")]
    Delivered { schedule_id: String },
    #[serde(rename = "already_delivered")]
    AlreadyDelivered { delivery_id: String },
}

/// Idempotent per schedule: a prior delivery for this schedule's
/// `(team_id, project_id, user_id)` short-circuits a fresh build, since
/// each `scheduler::run_now` call mints a brand new `digest_id` and
/// `deliver_digest`'s own dedup key is the digest, not the schedule.
pub async fn run_now(
    State(state): State<Arc<ApiState>>,
    Path(schedule_id): Path<String>,
) -> ApiResult<Json<RunNowResponse>> {
    let schedule = schedule_store::fetch_schedule(&state.pool, &schedule_id)
        .await?
        .ok_or_else(|| ApiError(crate::error::SchedulerError::UnknownSchedule(schedule_id.clone()).into()))?;

    if let Some(existing) = schedule_store::fetch_latest_delivery_for_schedule(
        &state.pool,
        &schedule.team_id,
        &schedule.project_id,
        &schedule.user_id,
    )
    .await?
    {
        return Ok(Json(RunNowResponse::AlreadyDelivered {
            delivery_id: existing.delivery_id,
        }));
    }

    let now = time::unix_timestamp();
    scheduler::run_now(
        &state.pool,
        state.chat.as_ref(),
        &schedule_id,
        state.config.query_weights,
        state.config.retrieval,
        now,
    )
    .await?;

    Ok(Json(RunNowResponse::Delivered { schedule_id }))
}
