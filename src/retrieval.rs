//! Candidate loading and cosine top-K retrieval (§4.7). Mirrors
//! `retrieval.py`.

use sqlx::SqlitePool;

use crate::error::{ProfileError, Result};
use crate::model::Entities;
use crate::store::profile_store;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub thread_ts: String,
    pub channel: String,
    pub vector: Vec<f64>,
    pub urgency: f64,
    pub labels: Vec<String>,
    pub entities: Entities,
    pub updated_at: f64,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub sim_score: f64,
}

/// A project's channel allow-list, read from the `project_channels`
/// association table (the one `POST /projects/{p}/channels` actually
/// writes to). Per §4.7, a project with no channels restricts retrieval
/// to an empty set rather than to "every channel".
async fn load_project_channels(pool: &SqlitePool, project_id: &str) -> Result<Vec<String>> {
    profile_store::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownProject(project_id.to_string()))?;
    profile_store::fetch_project_channels(pool, project_id).await
}

pub struct CandidateFilter {
    pub project_id: Option<String>,
    pub channels: Option<Vec<String>>,
    pub since_ts: Option<f64>,
    pub label_filter: Vec<String>,
}

/// Load digest items + embeddings within the retrieval window, optionally
/// scoped to a project's channels and/or a label filter.
pub async fn load_candidate_items(pool: &SqlitePool, filter: CandidateFilter, window_hours: f64, now: f64) -> Result<Vec<Candidate>> {
    let channels = match &filter.project_id {
        Some(project_id) => {
            let project_channels = load_project_channels(pool, project_id).await?;
            if project_channels.is_empty() {
                return Ok(Vec::new());
            }
            Some(project_channels)
        }
        None => filter.channels.clone(),
    };
    let since_ts = filter.since_ts.unwrap_or(now - window_hours * 3600.0);
    let label_filter: Vec<String> = filter.label_filter.iter().map(|l| l.to_uppercase()).collect();

    let rows = fetch_candidate_rows(pool, since_ts, channels.as_deref()).await?;

    let mut candidates = Vec::new();
    for row in rows {
        if !label_filter.is_empty() && !label_filter.iter().any(|l| row.labels.contains(l)) {
            continue;
        }
        candidates.push(row);
    }
    Ok(candidates)
}

async fn fetch_candidate_rows(
    pool: &SqlitePool,
    since_ts: f64,
    channels: Option<&[String]>,
) -> Result<Vec<Candidate>> {
    use sqlx::Row;

    let mut query = String::from(
        r#"SELECT di.thread_ts, di.channel, di.labels_json, di.entities_json, di.urgency,
                  di.updated_at, di.title, di.summary, e.vector_json
           FROM digest_items di
           JOIN embeddings e ON e.thread_ts = di.thread_ts
           WHERE di.updated_at >= ?"#,
    );
    if let Some(chans) = channels {
        if !chans.is_empty() {
            let placeholders = vec!["?"; chans.len()].join(",");
            query.push_str(&format!(" AND di.channel IN ({placeholders})"));
        }
    }

    let mut q = sqlx::query(&query).bind(since_ts);
    if let Some(chans) = channels {
        for c in chans {
            q = q.bind(c);
        }
    }
    let rows = q.fetch_all(pool).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let labels_json: Option<String> = row.try_get("labels_json").unwrap_or(None);
        let labels: Vec<String> = labels_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default();
        let entities_json: Option<String> = row.try_get("entities_json").unwrap_or(None);
        let entities: Entities = entities_json
            .and_then(|j| serde_json::from_str(&j).ok())
            .unwrap_or_default();
        let vector_json: String = row.try_get("vector_json").unwrap_or_else(|_| "[]".to_string());
        let vector: Vec<f64> = serde_json::from_str(&vector_json).unwrap_or_default();
        out.push(Candidate {
            thread_ts: row.try_get("thread_ts").unwrap_or_default(),
            channel: row.try_get("channel").unwrap_or_default(),
            vector,
            urgency: row.try_get("urgency").unwrap_or(0.0),
            labels,
            entities,
            updated_at: row.try_get("updated_at").unwrap_or(0.0),
            title: row.try_get("title").unwrap_or_default(),
            summary: row.try_get("summary").unwrap_or_default(),
        });
    }
    Ok(out)
}

pub fn cosine_sim(q: &[f64], v: &[f64]) -> f64 {
    q.iter().zip(v).map(|(a, b)| a * b).sum()
}

/// Score every candidate against `q` and return the top `k`, sorted by
/// `(-sim, -urgency, -updated_at, thread_ts)`.
pub fn retrieve_top_k(q: &[f64], candidates: Vec<Candidate>, k: usize) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|c| {
            let sim_score = cosine_sim(q, &c.vector);
            ScoredCandidate {
                candidate: c,
                sim_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.sim_score
            .partial_cmp(&a.sim_score)
            .unwrap()
            .then_with(|| b.candidate.urgency.partial_cmp(&a.candidate.urgency).unwrap())
            .then_with(|| {
                b.candidate
                    .updated_at
                    .partial_cmp(&a.candidate.updated_at)
                    .unwrap()
            })
            .then_with(|| a.candidate.thread_ts.cmp(&b.candidate.thread_ts))
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(thread_ts: &str, sim_vec: Vec<f64>, urgency: f64, updated_at: f64) -> Candidate {
        Candidate {
            thread_ts: thread_ts.into(),
            channel: "C1".into(),
            vector: sim_vec,
            urgency,
            labels: vec![],
            entities: Entities::default(),
            updated_at,
            title: String::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn retrieve_top_k_sorts_by_similarity_then_urgency_then_recency_then_id() {
        let q = vec![1.0, 0.0];
        let candidates = vec![
            candidate("b", vec![1.0, 0.0], 0.5, 100.0),
            candidate("a", vec![1.0, 0.0], 0.5, 100.0),
            candidate("c", vec![0.5, 0.0], 0.9, 200.0),
        ];
        let top = retrieve_top_k(&q, candidates, 10);
        assert_eq!(top[0].candidate.thread_ts, "a");
        assert_eq!(top[1].candidate.thread_ts, "b");
        assert_eq!(top[2].candidate.thread_ts, "c");
    }

    #[test]
    fn retrieve_top_k_truncates() {
        let q = vec![1.0];
        let candidates = vec![candidate("a", vec![1.0], 0.0, 0.0), candidate("b", vec![1.0], 0.0, 0.0)];
        let top = retrieve_top_k(&q, candidates, 1);
        assert_eq!(top.len(), 1);
    }

    async fn test_pool() -> SqlitePool {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await
            .unwrap();
        crate::db::initialize(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn project_with_no_channels_yields_no_candidates() {
        let pool = test_pool().await;
        profile_store::upsert_project(&pool, "p1", "Proj", "EVT", 0.0)
            .await
            .unwrap();
        let filter = CandidateFilter {
            project_id: Some("p1".to_string()),
            channels: None,
            since_ts: None,
            label_filter: Vec::new(),
        };
        let candidates = load_candidate_items(&pool, filter, 24.0, 1000.0).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn project_channels_restrict_to_the_association_table() {
        let pool = test_pool().await;
        profile_store::upsert_project(&pool, "p1", "Proj", "EVT", 0.0)
            .await
            .unwrap();
        profile_store::add_project_channel(&pool, "p1", "C1").await.unwrap();

        sqlx::query(
            r#"INSERT INTO digest_items (thread_ts, channel, title, labels_json, entities_json, urgency, summary, updated_at)
                VALUES ('t1', 'C1', 'in channel', '[]', '{}', 0.1, 's', 1000.0),
                       ('t2', 'C2', 'out of channel', '[]', '{}', 0.1, 's', 1000.0)"#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO embeddings (thread_ts, dim, vector_json, updated_at)
                VALUES ('t1', 1, '[1.0]', 1000.0), ('t2', 1, '[1.0]', 1000.0)"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let filter = CandidateFilter {
            project_id: Some("p1".to_string()),
            channels: None,
            since_ts: Some(0.0),
            label_filter: Vec::new(),
        };
        let candidates = load_candidate_items(&pool, filter, 24.0, 1000.0).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].thread_ts, "t1");
    }
}
