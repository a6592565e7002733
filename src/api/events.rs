//! `POST /slack/events`, `POST /backfill`, `POST /seed_mock` (§6).

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::intake;
use crate::model::EventPayload;
use crate::sim::dataset::{get_scenario_events, SimClock};
use crate::time;

use super::error::{ApiError, ApiResult};
use super::state::ApiState;

#[derive(Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub event_id: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// The Slack `url_verification` handshake is answered inline, bypassing
/// signature verification and ingestion entirely: Slack sends it before a
/// signing secret has necessarily been configured on either side.
pub async fn slack_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<Value>> {
    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError(crate::error::IntakeError::InvalidPayload(e.to_string()).into()))?;
    if parsed.get("type").and_then(Value::as_str) == Some("url_verification") {
        let challenge = parsed.get("challenge").cloned().unwrap_or(Value::Null);
        return Ok(Json(json!({ "challenge": challenge })));
    }

    let now = time::unix_timestamp();
    let timestamp = header_str(&headers, "x-slack-request-timestamp");
    let signature = header_str(&headers, "x-slack-signature");
    intake::verify_request_signature(&state.config.signature, &body, timestamp, signature, now)?;

    let payload: EventPayload = serde_json::from_value(parsed)
        .map_err(|e| ApiError(crate::error::IntakeError::InvalidPayload(e.to_string()).into()))?;
    let outcome = intake::ingest_payload(&state.pool, &state.handles, payload, now).await?;
    Ok(Json(json!({
        "status": if outcome.queued { "queued" } else { "duplicate" },
        "event_id": outcome.event_id,
    })))
}

/// No signature check: this path is for operator-driven historical replay.
pub async fn backfill(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<EventPayload>,
) -> ApiResult<Json<IngestResponse>> {
    let now = time::unix_timestamp();
    let outcome = intake::ingest_backfill(&state.pool, &state.handles, payload, now).await?;
    Ok(Json(IngestResponse {
        status: if outcome.queued { "queued" } else { "duplicate" },
        event_id: outcome.event_id,
    }))
}

#[derive(serde::Deserialize, Default)]
pub struct SeedMockRequest {
    #[serde(default)]
    pub scenario_id: Option<String>,
}

#[derive(Serialize)]
pub struct SeedMockResponse {
    pub scenario_id: String,
    pub event_ids: Vec<String>,
}

/// Generates a scripted scenario and ingests it synchronously, one event
/// at a time, the same path `/slack/events` uses.
pub async fn seed_mock(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SeedMockRequest>,
) -> ApiResult<Json<SeedMockResponse>> {
    let scenario_id = req.scenario_id.unwrap_or_else(|| "carbon_fiber_demo".into());
    let mut clock = SimClock::default();
    let events = get_scenario_events(&scenario_id, &mut clock)?;

    let mut event_ids = Vec::with_capacity(events.len());
    for event in events {
        let now = time::unix_timestamp();
        let outcome = intake::ingest_payload(&state.pool, &state.handles, event, now).await?;
        event_ids.push(outcome.event_id);
    }
    Ok(Json(SeedMockResponse {
        scenario_id,
        event_ids,
    }))
}
