//! Chat-platform integration: OAuth install/token exchange and the
//! message-posting subset of the Slack Web API actually used by delivery
//! (§4.10, §6 `/slack/install`, `/slack/oauth_redirect`). Mirrors
//! `original_source/app/slack.py`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::config::OAuthConfig;
use crate::error::{DeliveryError, Result};
use crate::model::Workspace;
use crate::store::schedule_store;

const SLACK_OAUTH_AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";
const SLACK_OAUTH_TOKEN_URL: &str = "https://slack.com/api/oauth.v2.access";
const SLACK_API_BASE: &str = "https://slack.com/api";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the `/slack/install` redirect URL users click to start the OAuth
/// v2 code grant.
pub fn build_install_url(oauth: &OAuthConfig, redirect_uri: &str) -> String {
    let client_id = oauth.client_id.as_deref().unwrap_or("");
    format!(
        "{SLACK_OAUTH_AUTHORIZE_URL}?client_id={client_id}&scope={}&redirect_uri={redirect_uri}",
        oauth.scopes
    )
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    ok: bool,
    access_token: Option<String>,
    bot_user_id: Option<String>,
    scope: Option<String>,
    team: Option<OAuthTeam>,
}

#[derive(Debug, Deserialize)]
struct OAuthTeam {
    id: Option<String>,
}

/// A trait over the subset of the chat platform's Web API this system
/// calls, so delivery and OAuth handling can be exercised without a live
/// network dependency in tests.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Exchange an OAuth `code` for a workspace access token and persist
    /// it (`slack_workspaces`). Returns the resolved `team_id`.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String>;

    /// Open (or resolve) a direct-message channel with `user_id` and post
    /// `text`/`blocks` into it. Returns the platform message id (`ts`).
    async fn post_digest_message(
        &self,
        team_id: &str,
        user_id: &str,
        text: &str,
        blocks: &[Value],
    ) -> Result<String>;
}

/// `ChatClient` backed by real HTTPS calls to the Slack Web API.
pub struct SlackChatClient {
    pool: sqlx::SqlitePool,
    oauth: OAuthConfig,
    http: reqwest::Client,
}

impl SlackChatClient {
    pub fn new(pool: sqlx::SqlitePool, oauth: OAuthConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { pool, oauth, http }
    }

    async fn fetch_workspace(&self, team_id: &str) -> Result<Workspace> {
        schedule_store::fetch_workspace(&self.pool, team_id)
            .await?
            .ok_or_else(|| DeliveryError::WorkspaceNotFound(team_id.to_string()).into())
    }

    async fn api_call(&self, team_id: &str, method: &str, params: &HashMap<&str, String>) -> Result<Value> {
        let workspace = self.fetch_workspace(team_id).await?;
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&workspace.access_token)
            .form(params)
            .send()
            .await
            .map_err(|e| DeliveryError::ExternalChatFailure(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DeliveryError::ExternalChatFailure(e.to_string()))?;
        if !status.is_success() {
            return Err(DeliveryError::ExternalChatFailure(format!("{method} returned {status}")).into());
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ChatClient for SlackChatClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let client_id = self
            .oauth
            .client_id
            .as_deref()
            .ok_or_else(|| DeliveryError::ExternalChatFailure("missing_client_config".into()))?;
        let client_secret = self
            .oauth
            .client_secret
            .as_deref()
            .ok_or_else(|| DeliveryError::ExternalChatFailure("missing_client_config".into()))?;

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        let response = self
            .http
            .post(SLACK_OAUTH_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| DeliveryError::ExternalChatFailure(e.to_string()))?;
        let data: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::ExternalChatFailure(e.to_string()))?;
        if !data.ok {
            return Err(DeliveryError::ExternalChatFailure("oauth_failed".into()).into());
        }
        let team_id = data
            .team
            .and_then(|t| t.id)
            .ok_or_else(|| DeliveryError::ExternalChatFailure("invalid_oauth_payload".into()))?;
        let access_token = data
            .access_token
            .ok_or_else(|| DeliveryError::ExternalChatFailure("invalid_oauth_payload".into()))?;
        let scopes: Vec<String> = data
            .scope
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        schedule_store::upsert_workspace(
            &self.pool,
            &team_id,
            &access_token,
            data.bot_user_id.as_deref().unwrap_or(""),
            &scopes,
            crate::time::unix_timestamp(),
        )
        .await?;
        Ok(team_id)
    }

    async fn post_digest_message(
        &self,
        team_id: &str,
        user_id: &str,
        text: &str,
        blocks: &[Value],
    ) -> Result<String> {
        let mut open_params = HashMap::new();
        open_params.insert("users", user_id.to_string());
        let open_resp = self.api_call(team_id, "conversations.open", &open_params).await?;
        let channel_id = open_resp
            .get("channel")
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| DeliveryError::ExternalChatFailure("conversations.open returned no channel".into()))?
            .to_string();

        let mut post_params = HashMap::new();
        post_params.insert("channel", channel_id);
        post_params.insert("text", text.to_string());
        post_params.insert(
            "blocks",
            serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_string()),
        );
        let resp = self.api_call(team_id, "chat.postMessage", &post_params).await?;
        Ok(resp
            .get("ts")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_install_url_includes_client_id_and_scopes() {
        let oauth = OAuthConfig {
            client_id: Some("abc".into()),
            client_secret: None,
            redirect_uri: None,
            scopes: "chat:write".into(),
        };
        let url = build_install_url(&oauth, "https://example.com/redirect");
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("scope=chat:write"));
        assert!(url.contains("redirect_uri=https://example.com/redirect"));
    }
}
