//! digestline entry point: load configuration, open the store, wire the
//! queues/workers/scheduler, and serve the HTTP surface (§6) until a
//! shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use digestline::api::{start_http_server, ApiState};
use digestline::chat::SlackChatClient;
use digestline::config::Config;
use digestline::queue::{new_queues, QueueReceivers};
use digestline::sim::streamer::SimStreamer;
use digestline::{db, scheduler, worker};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(bind = %config.bind_addr, database = %config.database_path.display(), "starting digestline");

    let pool = db::connect(&config.database_path)
        .await
        .context("failed to open database")?;

    let (handles, receivers) = new_queues();
    let QueueReceivers { hot, standard, backfill } = receivers;

    let chat: Arc<dyn digestline::chat::ChatClient> =
        Arc::new(SlackChatClient::new(pool.clone(), config.oauth.clone()));

    let sim = SimStreamer::new(pool.clone(), handles.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let hot_worker = tokio::spawn(worker::run_worker_loop(
        Arc::new(pool.clone()),
        "hot",
        hot,
        handles.depths.hot.clone(),
    ));
    let standard_worker = tokio::spawn(worker::run_worker_loop(
        Arc::new(pool.clone()),
        "standard",
        standard,
        handles.depths.standard.clone(),
    ));
    let backfill_worker = tokio::spawn(worker::run_worker_loop(
        Arc::new(pool.clone()),
        "backfill",
        backfill,
        handles.depths.backfill.clone(),
    ));

    let scheduler_handle = tokio::spawn(scheduler::run(
        pool.clone(),
        chat.clone(),
        config.query_weights,
        config.retrieval,
        shutdown_rx.clone(),
    ));

    let state = Arc::new(ApiState {
        pool: pool.clone(),
        handles,
        chat,
        config,
        sim,
    });

    let http_handle = start_http_server(state.config.bind_addr, state, shutdown_rx.clone())
        .await
        .context("failed to start HTTP server")?;

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    let _ = http_handle.await;
    let _ = scheduler_handle.await;
    // Worker loops only exit once every sender for their channel has
    // dropped; the server's `ApiState` (and thus its `QueueHandles` clone)
    // may still be held elsewhere, so join-waiting here could hang a
    // process asked to stop. Abort instead: no durability requirement
    // beyond committed rows (§5 Cancellation).
    hot_worker.abort();
    standard_worker.abort();
    backfill_worker.abort();

    tracing::info!("digestline stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
