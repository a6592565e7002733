//! `GET /slack/install`, `GET /slack/oauth_redirect` (§6): the OAuth v2
//! code-grant install flow.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Redirect};
use serde::{Deserialize, Serialize};

use super::error::ApiResult;
use super::state::ApiState;

pub async fn install(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let redirect_uri = state.config.oauth.redirect_uri.as_deref().unwrap_or("");
    let url = crate::chat::build_install_url(&state.config.oauth, redirect_uri);
    Redirect::to(&url)
}

#[derive(Deserialize)]
pub struct OAuthRedirectQuery {
    pub code: String,
}

#[derive(Serialize)]
pub struct InstallAck {
    pub installed: bool,
    pub team_id: String,
}

pub async fn oauth_redirect(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<OAuthRedirectQuery>,
) -> ApiResult<Json<InstallAck>> {
    let redirect_uri = state.config.oauth.redirect_uri.clone().unwrap_or_default();
    let team_id = state.chat.exchange_code(&q.code, &redirect_uri).await?;
    Ok(Json(InstallAck {
        installed: true,
        team_id,
    }))
}
