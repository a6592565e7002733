//! HTTP server setup: router and route wiring (§6).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use super::state::ApiState;
use super::{debug, digest, events, feedback, health, oauth, profiles, queues, raw_data, schedules, sim};

/// Start the HTTP server on `bind`, running until `shutdown_rx` reports
/// `true`.
pub async fn start_http_server(
    bind: SocketAddr,
    state: Arc<ApiState>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health::handler))
        .route("/slack/events", post(events::slack_events))
        .route("/backfill", post(events::backfill))
        .route("/seed_mock", post(events::seed_mock))
        .route("/queues/status", get(queues::status))
        .route("/raw_events", get(raw_data::raw_events))
        .route("/threads", get(raw_data::threads))
        .route("/items", get(raw_data::items))
        .route("/embeddings/{thread_ts}", get(raw_data::embedding))
        .route("/roles", post(profiles::create_role))
        .route("/phases", post(profiles::create_phase))
        .route("/projects", post(profiles::create_project))
        .route("/users", post(profiles::create_user))
        .route("/projects/{id}/phase", patch(profiles::update_project_phase))
        .route("/users/{id}/role", patch(profiles::update_user_role))
        .route("/users/{u}/projects/{p}", post(profiles::add_user_to_project))
        .route("/projects/{p}/channels", post(profiles::add_project_channel))
        .route("/users/{u}/channels", post(profiles::add_user_channel))
        .route("/profiles/users/{u}", get(profiles::user_profile))
        .route("/profiles/projects/{p}", get(profiles::project_profile))
        .route("/digest", get(digest::get_digest))
        .route("/feedback", post(feedback::submit))
        .route("/slack/install", get(oauth::install))
        .route("/slack/oauth_redirect", get(oauth::oauth_redirect))
        .route("/schedules", post(schedules::create_schedule))
        .route("/schedules/{id}/run_now", post(schedules::run_now))
        .route("/debug/query_vector", get(debug::query_vector))
        .route("/debug/retrieve", get(debug::retrieve))
        .route("/debug/rerank", get(debug::rerank_view))
        .route("/sim/events", post(sim::sim_events))
        .route("/simulate/start", post(sim::start))
        .route("/simulate/stop", post(sim::stop))
        .route("/simulate/status", get(sim::status))
        .route("/simulate/reset", post(sim::reset))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server exited with error");
        }
    });

    Ok(handle)
}
