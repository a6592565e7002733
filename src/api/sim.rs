//! `/sim/events`, `/simulate/start`, `/simulate/stop`, `/simulate/status`,
//! `/simulate/reset` (§6, §11.2): the scripted scenario streamer.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::intake;
use crate::sim::dataset::{get_scenario_events, SimClock};
use crate::time;

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Deserialize)]
pub struct SimEventsRequest {
    #[serde(default)]
    pub scenario_id: Option<String>,
}

#[derive(Serialize)]
pub struct SimEventsResponse {
    pub scenario_id: String,
    pub event_ids: Vec<String>,
}

/// Generate and ingest a scenario synchronously, independent of the
/// throttled background streamer `/simulate/*` controls.
pub async fn sim_events(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SimEventsRequest>,
) -> ApiResult<Json<SimEventsResponse>> {
    let scenario_id = req.scenario_id.unwrap_or_else(|| "carbon_fiber_demo".into());
    let mut clock = SimClock::default();
    let events = get_scenario_events(&scenario_id, &mut clock)?;
    let mut event_ids = Vec::with_capacity(events.len());
    for event in events {
        let now = time::unix_timestamp();
        let outcome = intake::ingest_payload(&state.pool, &state.handles, event, now).await?;
        event_ids.push(outcome.event_id);
    }
    Ok(Json(SimEventsResponse {
        scenario_id,
        event_ids,
    }))
}

#[derive(Deserialize)]
pub struct SimulateStartRequest {
    #[serde(default = "default_scenario")]
    pub scenario_id: String,
    #[serde(default = "default_speed")]
    pub speed_multiplier: f64,
    #[serde(default)]
    pub max_events: Option<u64>,
    #[serde(default)]
    pub loop_scenario: bool,
}

fn default_scenario() -> String {
    "carbon_fiber_demo".into()
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Serialize)]
pub struct SimStatusView {
    pub running: bool,
    pub scenario_id: Option<String>,
    pub emitted_count: u64,
    pub last_event_id: Option<String>,
    pub speed_multiplier: f64,
    pub max_events: Option<u64>,
    pub loop_scenario: bool,
}

impl From<crate::sim::streamer::SimStatus> for SimStatusView {
    fn from(s: crate::sim::streamer::SimStatus) -> Self {
        SimStatusView {
            running: s.running,
            scenario_id: s.scenario_id,
            emitted_count: s.emitted_count,
            last_event_id: s.last_event_id,
            speed_multiplier: s.speed_multiplier,
            max_events: s.max_events,
            loop_scenario: s.loop_scenario,
        }
    }
}

pub async fn start(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SimulateStartRequest>,
) -> Json<SimStatusView> {
    state.sim.start(&req.scenario_id, req.speed_multiplier, req.max_events, req.loop_scenario);
    Json(state.sim.status().into())
}

pub async fn stop(State(state): State<Arc<ApiState>>) -> Json<SimStatusView> {
    state.sim.stop();
    Json(state.sim.status().into())
}

pub async fn status(State(state): State<Arc<ApiState>>) -> Json<SimStatusView> {
    Json(state.sim.status().into())
}

pub async fn reset(State(state): State<Arc<ApiState>>) -> Json<SimStatusView> {
    state.sim.reset();
    Json(state.sim.status().into())
}
