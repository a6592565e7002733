//! Digest delivery scheduler: a 60-second-tick loop that evaluates every
//! enabled schedule's due time and fires at most once per day. Mirrors
//! `original_source/app/scheduling.py`.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use sqlx::SqlitePool;
use tokio::sync::watch;

use crate::chat::ChatClient;
use crate::config::{QueryWeights, RetrievalConfig};
use crate::delivery;
use crate::digest;
use crate::error::Result;
use crate::model::Schedule;
use crate::store::schedule_store;

const CHECK_INTERVAL_SECONDS: u64 = 60;
const DIGEST_ITEM_COUNT: usize = 10;

/// Whether `schedule` is due at `now_utc`, i.e. the schedule's configured
/// local time-of-day matches the current minute in its timezone (falling
/// back to UTC for an unrecognized IANA name) and it hasn't already
/// delivered today. Mirrors `scheduling.py::_is_due`.
async fn is_due(pool: &SqlitePool, schedule: &Schedule, now_utc: chrono::DateTime<Utc>) -> Result<bool> {
    let tz: Tz = Tz::from_str(&schedule.cron.timezone).unwrap_or(Tz::UTC);
    let local = now_utc.with_timezone(&tz);
    let current_hhmm = format!("{:02}:{:02}", local.hour(), local.minute());
    if current_hhmm != schedule.cron.time_of_day {
        return Ok(false);
    }

    let latest = schedule_store::fetch_latest_delivery_for_schedule(
        pool,
        &schedule.team_id,
        &schedule.project_id,
        &schedule.user_id,
    )
    .await?;
    Ok(latest.is_none())
}

/// Build and deliver today's digest for `schedule`.
async fn fire(
    pool: &SqlitePool,
    chat: &dyn ChatClient,
    schedule: &Schedule,
    query_weights: QueryWeights,
    retrieval_cfg: RetrievalConfig,
    now: f64,
) -> Result<()> {
    let built = digest::build_digest(
        pool,
        &schedule.user_id,
        &schedule.project_id,
        DIGEST_ITEM_COUNT,
        query_weights,
        retrieval_cfg,
        now,
    )
    .await?;

    delivery::deliver_digest(
        pool,
        chat,
        &built.digest_id,
        &schedule.team_id,
        &schedule.user_id,
        &built.items,
        now,
    )
    .await?;
    Ok(())
}

/// Evaluate every enabled schedule once and deliver the ones that are due.
async fn tick(
    pool: &SqlitePool,
    chat: &dyn ChatClient,
    query_weights: QueryWeights,
    retrieval_cfg: RetrievalConfig,
) {
    let now_utc = Utc::now();
    let now = now_utc.timestamp() as f64;

    let schedules = match schedule_store::fetch_schedules(pool).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to load digest schedules");
            return;
        }
    };

    for schedule in schedules.into_iter().filter(|s| s.is_enabled) {
        let due = match is_due(pool, &schedule, now_utc).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(schedule_id = %schedule.schedule_id, error = %e, "failed to evaluate due time");
                continue;
            }
        };
        if !due {
            continue;
        }
        if let Err(e) = fire(pool, chat, &schedule, query_weights, retrieval_cfg, now).await {
            tracing::error!(schedule_id = %schedule.schedule_id, error = %e, "scheduled digest delivery failed");
        } else {
            tracing::info!(schedule_id = %schedule.schedule_id, "scheduled digest delivered");
        }
    }
}

/// Run the 60-second-tick scheduler loop until `shutdown` reports `true`.
/// Mirrors `scheduling.py::scheduler_loop`'s cancellable wait.
pub async fn run(
    pool: SqlitePool,
    chat: Arc<dyn ChatClient>,
    query_weights: QueryWeights,
    retrieval_cfg: RetrievalConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tick(&pool, chat.as_ref(), query_weights, retrieval_cfg).await;

        let wait = tokio::time::sleep(std::time::Duration::from_secs(CHECK_INTERVAL_SECONDS));
        tokio::select! {
            _ = wait => {}
            _ = shutdown.wait_for(|v| *v) => {
                tracing::info!("scheduler loop shutting down");
                return;
            }
        }
    }
}

/// Run a schedule immediately regardless of its due time, for the
/// `/schedules/{id}/run_now` endpoint.
pub async fn run_now(
    pool: &SqlitePool,
    chat: &dyn ChatClient,
    schedule_id: &str,
    query_weights: QueryWeights,
    retrieval_cfg: RetrievalConfig,
    now: f64,
) -> Result<()> {
    let schedule = schedule_store::fetch_schedule(pool, schedule_id)
        .await?
        .ok_or_else(|| crate::error::SchedulerError::UnknownSchedule(schedule_id.to_string()))?;
    fire(pool, chat, &schedule, query_weights, retrieval_cfg, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScheduleCron;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await
            .unwrap();
        crate::db::initialize(&pool).await.unwrap();
        pool
    }

    fn schedule(time_of_day: &str, timezone: &str) -> Schedule {
        Schedule {
            schedule_id: "sch-1".into(),
            team_id: "T1".into(),
            project_id: "p1".into(),
            user_id: "u1".into(),
            cron: ScheduleCron {
                time_of_day: time_of_day.into(),
                timezone: timezone.into(),
            },
            is_enabled: true,
        }
    }

    #[tokio::test]
    async fn due_at_matching_utc_minute() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let s = schedule("09:00", "UTC");
        assert!(is_due(&pool, &s, now).await.unwrap());
    }

    #[tokio::test]
    async fn not_due_at_other_minute() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 1, 0).unwrap();
        let s = schedule("09:00", "UTC");
        assert!(!is_due(&pool, &s, now).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_timezone_falls_back_to_utc() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let s = schedule("09:00", "Not/A_Real_Zone");
        assert!(is_due(&pool, &s, now).await.unwrap());
    }

    #[tokio::test]
    async fn already_delivered_today_is_not_due_again() {
        let pool = test_pool().await;
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let s = schedule("09:00", "UTC");
        schedule_store::insert_delivery(
            &pool,
            "del-1",
            "dig-1",
            &s.team_id,
            &s.user_id,
            now.timestamp() as f64,
            crate::model::DeliveryStatus::Delivered,
            Some("1.1"),
            None,
        )
        .await
        .unwrap();
        crate::store::digest_store::insert_digest(&pool, "dig-1", &s.user_id, &s.project_id, &[], now.timestamp() as f64)
            .await
            .unwrap();
        assert!(!is_due(&pool, &s, now).await.unwrap());
    }
}
