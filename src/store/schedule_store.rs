//! Schedule, delivery, and chat-workspace persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{Delivery, DeliveryStatus, Schedule, ScheduleCron, Workspace};

fn row_to_schedule(row: &SqliteRow) -> Schedule {
    let cron_json: String = row.try_get("cron_json").unwrap_or_else(|_| "{}".to_string());
    let cron: ScheduleCron = serde_json::from_str(&cron_json).unwrap_or(ScheduleCron {
        time_of_day: "09:00".to_string(),
        timezone: "UTC".to_string(),
    });
    Schedule {
        schedule_id: row.try_get("schedule_id").unwrap_or_default(),
        team_id: row.try_get("team_id").unwrap_or_default(),
        project_id: row.try_get("project_id").unwrap_or_default(),
        user_id: row.try_get("user_id").unwrap_or_default(),
        cron,
        is_enabled: row.try_get::<i64, _>("is_enabled").unwrap_or(0) != 0,
    }
}

fn row_to_delivery(row: &SqliteRow) -> Delivery {
    let status_str: String = row.try_get("status").unwrap_or_default();
    let status = if status_str == "delivered" {
        DeliveryStatus::Delivered
    } else {
        DeliveryStatus::Failed
    };
    Delivery {
        delivery_id: row.try_get("delivery_id").unwrap_or_default(),
        digest_id: row.try_get("digest_id").unwrap_or_default(),
        team_id: row.try_get("team_id").unwrap_or_default(),
        user_id: row.try_get("user_id").unwrap_or_default(),
        delivered_at: row.try_get("delivered_at").unwrap_or(0.0),
        status,
        platform_message_id: row.try_get("slack_ts").unwrap_or(None),
        error: row.try_get("error").unwrap_or(None),
    }
}

fn row_to_workspace(row: &SqliteRow) -> Workspace {
    let scopes_json: String = row.try_get("scopes_json").unwrap_or_else(|_| "[]".to_string());
    Workspace {
        team_id: row.try_get("team_id").unwrap_or_default(),
        access_token: row.try_get("access_token").unwrap_or_default(),
        bot_user_id: row.try_get("bot_user_id").unwrap_or_default(),
        installed_at: row.try_get("installed_at").unwrap_or(0.0),
        scopes: serde_json::from_str(&scopes_json).unwrap_or_default(),
    }
}

pub async fn insert_schedule(
    pool: &SqlitePool,
    schedule_id: &str,
    team_id: &str,
    project_id: &str,
    user_id: &str,
    cron: &ScheduleCron,
    is_enabled: bool,
    created_at: f64,
) -> Result<()> {
    let cron_json = serde_json::to_string(cron).unwrap_or_else(|_| "{}".to_string());
    sqlx::query(
        "INSERT INTO digest_schedules (schedule_id, team_id, project_id, user_id, cron_json, is_enabled, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(schedule_id)
    .bind(team_id)
    .bind(project_id)
    .bind(user_id)
    .bind(cron_json)
    .bind(is_enabled as i64)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_schedules(pool: &SqlitePool) -> Result<Vec<Schedule>> {
    let rows = sqlx::query("SELECT * FROM digest_schedules")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_schedule).collect())
}

pub async fn fetch_schedule(pool: &SqlitePool, schedule_id: &str) -> Result<Option<Schedule>> {
    let row = sqlx::query("SELECT * FROM digest_schedules WHERE schedule_id = ?")
        .bind(schedule_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_schedule))
}

pub async fn fetch_delivery_by_digest(pool: &SqlitePool, digest_id: &str) -> Result<Option<Delivery>> {
    let row = sqlx::query("SELECT * FROM digest_deliveries WHERE digest_id = ?")
        .bind(digest_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_delivery))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_delivery(
    pool: &SqlitePool,
    delivery_id: &str,
    digest_id: &str,
    team_id: &str,
    user_id: &str,
    delivered_at: f64,
    status: DeliveryStatus,
    platform_message_id: Option<&str>,
    error: Option<&str>,
) -> Result<()> {
    let status_str = match status {
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Failed => "failed",
    };
    sqlx::query(
        "INSERT INTO digest_deliveries (delivery_id, digest_id, team_id, user_id, delivered_at, status, slack_ts, error) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(delivery_id)
    .bind(digest_id)
    .bind(team_id)
    .bind(user_id)
    .bind(delivered_at)
    .bind(status_str)
    .bind(platform_message_id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Latest delivery ever recorded for `(team_id, project_id, user_id)`, via
/// the digest's `project_id`. Per `db.py::fetch_latest_delivery_for_schedule`
/// this genuinely ignores the `now`/timezone it's conceptually passed —
/// see DESIGN.md's "scheduler due-time" resolution.
pub async fn fetch_latest_delivery_for_schedule(
    pool: &SqlitePool,
    team_id: &str,
    project_id: &str,
    user_id: &str,
) -> Result<Option<Delivery>> {
    let row = sqlx::query(
        r#"SELECT dd.* FROM digest_deliveries dd
            JOIN digests d ON d.digest_id = dd.digest_id
            WHERE dd.team_id = ? AND dd.user_id = ? AND d.project_id = ?
            ORDER BY dd.delivered_at DESC
            LIMIT 1"#,
    )
    .bind(team_id)
    .bind(user_id)
    .bind(project_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_delivery))
}

pub async fn upsert_workspace(
    pool: &SqlitePool,
    team_id: &str,
    access_token: &str,
    bot_user_id: &str,
    scopes: &[String],
    installed_at: f64,
) -> Result<()> {
    let scopes_json = serde_json::to_string(scopes).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"INSERT INTO slack_workspaces (team_id, access_token, bot_user_id, installed_at, scopes_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(team_id) DO UPDATE SET
                access_token=excluded.access_token,
                bot_user_id=excluded.bot_user_id,
                installed_at=excluded.installed_at,
                scopes_json=excluded.scopes_json"#,
    )
    .bind(team_id)
    .bind(access_token)
    .bind(bot_user_id)
    .bind(installed_at)
    .bind(scopes_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_workspace(pool: &SqlitePool, team_id: &str) -> Result<Option<Workspace>> {
    let row = sqlx::query("SELECT * FROM slack_workspaces WHERE team_id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_workspace))
}
