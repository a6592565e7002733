//! Role, phase, project, user, and association persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::model::{Phase, Project, Role, User};

fn row_to_role(row: &SqliteRow) -> Role {
    let vector_json: String = row
        .try_get("role_vector_json")
        .unwrap_or_else(|_| "[]".to_string());
    Role {
        role_id: row.try_get("role_id").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        description: row.try_get("description").unwrap_or_default(),
        role_vector: serde_json::from_str(&vector_json).unwrap_or_default(),
    }
}

fn row_to_phase(row: &SqliteRow) -> Phase {
    let vector_json: String = row
        .try_get("phase_vector_json")
        .unwrap_or_else(|_| "[]".to_string());
    Phase {
        phase_key: row.try_get("phase_key").unwrap_or_default(),
        description: row.try_get("description").unwrap_or_default(),
        phase_vector: serde_json::from_str(&vector_json).unwrap_or_default(),
    }
}

fn row_to_project(row: &SqliteRow) -> Project {
    Project {
        project_id: row.try_get("project_id").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        current_phase: row.try_get("current_phase").unwrap_or_default(),
    }
}

fn row_to_user(row: &SqliteRow) -> User {
    let vector_json: Option<String> = row.try_get("user_vector_json").unwrap_or(None);
    let user_vector = vector_json.and_then(|j| serde_json::from_str::<Vec<f64>>(&j).ok());
    User {
        user_id: row.try_get("user_id").unwrap_or_default(),
        name: row.try_get("name").unwrap_or_default(),
        email: row.try_get("email").unwrap_or(None),
        role_id: row.try_get("role_id").unwrap_or(None),
        user_vector,
        updated_at: row.try_get("updated_at").unwrap_or(0.0),
    }
}

pub async fn upsert_role(
    pool: &SqlitePool,
    role_id: &str,
    name: &str,
    description: &str,
    role_vector: &[f64],
    updated_at: f64,
) -> Result<()> {
    let vector_json = serde_json::to_string(role_vector).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"INSERT INTO roles (role_id, name, description, role_vector_json, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(role_id) DO UPDATE SET
                name=excluded.name,
                description=excluded.description,
                role_vector_json=excluded.role_vector_json,
                updated_at=excluded.updated_at"#,
    )
    .bind(role_id)
    .bind(name)
    .bind(description)
    .bind(vector_json)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_role(pool: &SqlitePool, role_id: &str) -> Result<Option<Role>> {
    let row = sqlx::query("SELECT * FROM roles WHERE role_id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_role))
}

pub async fn upsert_phase(
    pool: &SqlitePool,
    phase_key: &str,
    description: &str,
    phase_vector: &[f64],
    updated_at: f64,
) -> Result<()> {
    let vector_json = serde_json::to_string(phase_vector).unwrap_or_else(|_| "[]".to_string());
    sqlx::query(
        r#"INSERT INTO phases (phase_key, description, phase_vector_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(phase_key) DO UPDATE SET
                description=excluded.description,
                phase_vector_json=excluded.phase_vector_json,
                updated_at=excluded.updated_at"#,
    )
    .bind(phase_key)
    .bind(description)
    .bind(vector_json)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_phase(pool: &SqlitePool, phase_key: &str) -> Result<Option<Phase>> {
    let row = sqlx::query("SELECT * FROM phases WHERE phase_key = ?")
        .bind(phase_key)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_phase))
}

pub async fn upsert_project(
    pool: &SqlitePool,
    project_id: &str,
    name: &str,
    current_phase: &str,
    now: f64,
) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO projects (project_id, name, current_phase, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(project_id) DO UPDATE SET
                name=excluded.name,
                current_phase=excluded.current_phase,
                updated_at=excluded.updated_at"#,
    )
    .bind(project_id)
    .bind(name)
    .bind(current_phase)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_project_phase(
    pool: &SqlitePool,
    project_id: &str,
    phase_key: &str,
    updated_at: f64,
) -> Result<()> {
    sqlx::query("UPDATE projects SET current_phase = ?, updated_at = ? WHERE project_id = ?")
        .bind(phase_key)
        .bind(updated_at)
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_project(pool: &SqlitePool, project_id: &str) -> Result<Option<Project>> {
    let row = sqlx::query("SELECT * FROM projects WHERE project_id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_project))
}

pub async fn upsert_user(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    email: Option<&str>,
    role_id: Option<&str>,
    user_vector: Option<&[f64]>,
    now: f64,
) -> Result<()> {
    let vector_json = user_vector.map(|v| serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()));
    sqlx::query(
        r#"INSERT INTO users (user_id, name, email, role_id, user_vector_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                name=excluded.name,
                email=excluded.email,
                role_id=excluded.role_id,
                user_vector_json=excluded.user_vector_json,
                updated_at=excluded.updated_at"#,
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(role_id)
    .bind(vector_json)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_user_role(
    pool: &SqlitePool,
    user_id: &str,
    role_id: &str,
    user_vector: &[f64],
    updated_at: f64,
) -> Result<()> {
    let vector_json = serde_json::to_string(user_vector).unwrap_or_else(|_| "[]".to_string());
    sqlx::query("UPDATE users SET role_id = ?, user_vector_json = ?, updated_at = ? WHERE user_id = ?")
        .bind(role_id)
        .bind(vector_json)
        .bind(updated_at)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_user_vector(
    pool: &SqlitePool,
    user_id: &str,
    user_vector: &[f64],
    updated_at: f64,
) -> Result<()> {
    let vector_json = serde_json::to_string(user_vector).unwrap_or_else(|_| "[]".to_string());
    sqlx::query("UPDATE users SET user_vector_json = ?, updated_at = ? WHERE user_id = ?")
        .bind(vector_json)
        .bind(updated_at)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(row_to_user))
}

pub async fn add_user_project(pool: &SqlitePool, user_id: &str, project_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_project (user_id, project_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_user_projects(pool: &SqlitePool, user_id: &str) -> Result<Vec<Project>> {
    let rows = sqlx::query(
        r#"SELECT p.* FROM projects p
            JOIN user_project up ON up.project_id = p.project_id
            WHERE up.user_id = ?"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_project).collect())
}

pub async fn add_project_channel(pool: &SqlitePool, project_id: &str, channel_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO project_channels (project_id, channel_id) VALUES (?, ?)")
        .bind(project_id)
        .bind(channel_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_user_channel(pool: &SqlitePool, user_id: &str, channel_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_channels (user_id, channel_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(channel_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_project_channels(pool: &SqlitePool, project_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT channel_id FROM project_channels WHERE project_id = ?")
            .bind(project_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

pub async fn fetch_user_channels(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT channel_id FROM user_channels WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}
