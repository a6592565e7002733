//! `POST /roles`, `/phases`, `/projects`, `/users`; the PATCH/association
//! routes; `GET /profiles/users/{u}`, `/profiles/projects/{p}` (§6).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::profiles;
use crate::store::profile_store;
use crate::time;

use super::error::ApiResult;
use super::state::ApiState;

#[derive(Serialize)]
pub struct IdView {
    pub id: String,
    pub vector_dim: usize,
}

#[derive(Deserialize)]
pub struct CreateRoleRequest {
    pub role_id: String,
    pub name: String,
    pub description: String,
}

pub async fn create_role(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<Json<IdView>> {
    let now = time::unix_timestamp();
    let vector = profiles::create_role(&state.pool, &req.role_id, &req.name, &req.description, now).await?;
    Ok(Json(IdView {
        id: req.role_id,
        vector_dim: vector.len(),
    }))
}

#[derive(Deserialize)]
pub struct CreatePhaseRequest {
    pub phase_key: String,
    pub description: String,
}

pub async fn create_phase(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreatePhaseRequest>,
) -> ApiResult<Json<IdView>> {
    let now = time::unix_timestamp();
    let vector = profiles::create_phase(&state.pool, &req.phase_key, &req.description, now).await?;
    Ok(Json(IdView {
        id: req.phase_key,
        vector_dim: vector.len(),
    }))
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub project_id: String,
    pub name: String,
    pub current_phase: String,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
}

pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<IdView>> {
    let now = time::unix_timestamp();
    profiles::create_project(
        &state.pool,
        &req.project_id,
        &req.name,
        &req.current_phase,
        req.channels.as_deref(),
        now,
    )
    .await?;
    Ok(Json(IdView {
        id: req.project_id,
        vector_dim: 0,
    }))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub role_id: Option<String>,
}

pub async fn create_user(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<IdView>> {
    let now = time::unix_timestamp();
    let (vector, _role_id) = profiles::create_user(
        &state.pool,
        &req.user_id,
        &req.name,
        req.role_id.as_deref(),
        now,
    )
    .await?;
    Ok(Json(IdView {
        id: req.user_id,
        vector_dim: vector.map(|v| v.len()).unwrap_or(0),
    }))
}

#[derive(Deserialize)]
pub struct PhaseKeyBody {
    pub key: String,
}

#[derive(Serialize)]
pub struct ProjectPhaseView {
    pub project_id: String,
    pub current_phase: String,
}

pub async fn update_project_phase(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Json(body): Json<PhaseKeyBody>,
) -> ApiResult<Json<ProjectPhaseView>> {
    let now = time::unix_timestamp();
    profiles::update_project_phase(&state.pool, &project_id, &body.key, now).await?;
    Ok(Json(ProjectPhaseView {
        project_id,
        current_phase: body.key,
    }))
}

#[derive(Deserialize)]
pub struct RoleIdBody {
    pub role_id: String,
}

#[derive(Serialize)]
pub struct UserRoleView {
    pub user_id: String,
    pub role_id: String,
    pub vector_dim: usize,
}

pub async fn update_user_role(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
    Json(body): Json<RoleIdBody>,
) -> ApiResult<Json<UserRoleView>> {
    let now = time::unix_timestamp();
    let vector = profiles::update_user_role(&state.pool, &user_id, &body.role_id, now).await?;
    Ok(Json(UserRoleView {
        user_id,
        role_id: body.role_id,
        vector_dim: vector.len(),
    }))
}

#[derive(Serialize)]
pub struct Ack {
    pub ok: bool,
}

pub async fn add_user_to_project(
    State(state): State<Arc<ApiState>>,
    Path((user_id, project_id)): Path<(String, String)>,
) -> ApiResult<Json<Ack>> {
    profiles::add_user_to_project(&state.pool, &user_id, &project_id).await?;
    Ok(Json(Ack { ok: true }))
}

#[derive(Deserialize)]
pub struct ChannelBody {
    pub channel_id: String,
}

pub async fn add_project_channel(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
    Json(body): Json<ChannelBody>,
) -> ApiResult<Json<Ack>> {
    profile_store::add_project_channel(&state.pool, &project_id, &body.channel_id).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn add_user_channel(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
    Json(body): Json<ChannelBody>,
) -> ApiResult<Json<Ack>> {
    profile_store::add_user_channel(&state.pool, &user_id, &body.channel_id).await?;
    Ok(Json(Ack { ok: true }))
}

#[derive(Serialize)]
pub struct UserProfileView {
    pub user_id: String,
    pub role_id: Option<String>,
    pub user_vector_dim: usize,
    pub projects: Vec<String>,
}

pub async fn user_profile(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserProfileView>> {
    let profile = profiles::get_user_profile(&state.pool, &user_id).await?;
    Ok(Json(UserProfileView {
        user_id: profile.user_id,
        role_id: profile.role_id,
        user_vector_dim: profile.user_vector_dim,
        projects: profile.projects,
    }))
}

#[derive(Serialize)]
pub struct ProjectProfileView {
    pub project_id: String,
    pub current_phase: String,
    pub phase_vector_dim: usize,
}

pub async fn project_profile(
    State(state): State<Arc<ApiState>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ProjectProfileView>> {
    let profile = profiles::get_project_profile(&state.pool, &project_id).await?;
    Ok(Json(ProjectProfileView {
        project_id: profile.project_id,
        current_phase: profile.current_phase,
        phase_vector_dim: profile.phase_vector.len(),
    }))
}
