//! Throttled scenario streaming: feeds a scenario's events through ordinary
//! intake at a configurable speed, for `/simulate/*`. Mirrors
//! `original_source/app/sim/streamer.py`.

use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::intake;
use crate::queue::QueueHandles;
use crate::sim::dataset::{get_scenario_events, SimClock};

#[derive(Debug, Clone)]
pub struct SimStatus {
    pub running: bool,
    pub scenario_id: Option<String>,
    pub emitted_count: u64,
    pub last_event_id: Option<String>,
    pub speed_multiplier: f64,
    pub max_events: Option<u64>,
    pub loop_scenario: bool,
}

impl Default for SimStatus {
    fn default() -> Self {
        Self {
            running: false,
            scenario_id: None,
            emitted_count: 0,
            last_event_id: None,
            speed_multiplier: 1.0,
            max_events: None,
            loop_scenario: false,
        }
    }
}

struct Inner {
    status: SimStatus,
    clock: SimClock,
    task: Option<JoinHandle<()>>,
}

/// Handle to the scenario streamer's shared, lock-protected state. Cheap to
/// clone; every clone refers to the same running (or idle) stream.
#[derive(Clone)]
pub struct SimStreamer {
    pool: SqlitePool,
    handles: QueueHandles,
    inner: Arc<Mutex<Inner>>,
}

impl SimStreamer {
    pub fn new(pool: SqlitePool, handles: QueueHandles) -> Self {
        Self {
            pool,
            handles,
            inner: Arc::new(Mutex::new(Inner {
                status: SimStatus::default(),
                clock: SimClock::default(),
                task: None,
            })),
        }
    }

    pub fn status(&self) -> SimStatus {
        self.inner.lock().unwrap().status.clone()
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.status = SimStatus::default();
        inner.clock = SimClock::default();
    }

    /// Start streaming `scenario_id` if nothing is currently running.
    /// Mirrors `streamer.py::start_streaming`'s idempotent no-op guard.
    pub fn start(&self, scenario_id: &str, speed_multiplier: f64, max_events: Option<u64>, loop_scenario: bool) {
        let mut inner = self.inner.lock().unwrap();
        if inner.status.running {
            return;
        }
        inner.status = SimStatus {
            running: true,
            scenario_id: Some(scenario_id.to_string()),
            emitted_count: 0,
            last_event_id: None,
            speed_multiplier,
            max_events,
            loop_scenario,
        };

        let streamer = self.clone();
        let scenario_id = scenario_id.to_string();
        let handle = tokio::spawn(async move { streamer.emit_loop(scenario_id).await });
        inner.task = Some(handle);
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.status.running = false;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.inner.lock().unwrap().status.running
    }

    async fn emit_loop(&self, scenario_id: String) {
        loop {
            if !self.is_running() {
                break;
            }
            let events = {
                let mut inner = self.inner.lock().unwrap();
                match get_scenario_events(&scenario_id, &mut inner.clock) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::error!(scenario_id, error = %e, "unknown simulation scenario");
                        inner.status.running = false;
                        return;
                    }
                }
            };

            for event in events {
                if !self.is_running() {
                    break;
                }
                let event_id = event.event_id.clone();
                let now = crate::time::unix_timestamp();
                if let Err(e) = intake::ingest_payload(&self.pool, &self.handles, event, now).await {
                    tracing::error!(error = %e, "simulated event failed to ingest");
                }

                let mut stop_for_limit = false;
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.status.emitted_count += 1;
                    inner.status.last_event_id = Some(event_id);
                    if let Some(max) = inner.status.max_events {
                        if inner.status.emitted_count >= max {
                            inner.status.running = false;
                            stop_for_limit = true;
                        }
                    }
                }
                if stop_for_limit {
                    return;
                }

                let speed = self.inner.lock().unwrap().status.speed_multiplier.max(0.01);
                let delay = std::time::Duration::from_secs_f64(1.0 / speed);
                tokio::time::sleep(delay).await;
            }

            let should_loop = self.inner.lock().unwrap().status.loop_scenario;
            if !should_loop {
                self.inner.lock().unwrap().status.running = false;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await
            .unwrap();
        crate::db::initialize(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn starting_twice_is_a_noop() {
        let pool = test_pool().await;
        let (handles, _rx) = crate::queue::new_queues();
        let streamer = SimStreamer::new(pool, handles);
        streamer.start("carbon_fiber_demo", 1000.0, Some(1), false);
        streamer.start("carbon_fiber_demo", 1.0, None, false);
        assert_eq!(streamer.status().speed_multiplier, 1000.0);
        streamer.stop();
    }

    #[tokio::test]
    async fn reset_clears_status() {
        let pool = test_pool().await;
        let (handles, _rx) = crate::queue::new_queues();
        let streamer = SimStreamer::new(pool, handles);
        streamer.start("carbon_fiber_demo", 1000.0, Some(1), false);
        streamer.reset();
        let status = streamer.status();
        assert!(!status.running);
        assert_eq!(status.emitted_count, 0);
    }
}
