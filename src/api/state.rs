//! Shared state handed to every HTTP handler via `State<Arc<ApiState>>`.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::chat::ChatClient;
use crate::config::Config;
use crate::queue::QueueHandles;
use crate::sim::streamer::SimStreamer;

/// Everything a handler needs: the store, the queue senders, the chat
/// client used for OAuth and delivery, resolved configuration, and the
/// scenario streamer backing `/sim/*` and `/simulate/*`.
pub struct ApiState {
    pub pool: SqlitePool,
    pub handles: QueueHandles,
    pub chat: Arc<dyn ChatClient>,
    pub config: Config,
    pub sim: SimStreamer,
}
