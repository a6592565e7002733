//! Base scoring, must-include override, and MMR diversity rerank (§4.8).
//! Mirrors `rerank.py`.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::model::Entities;
use crate::retrieval::{cosine_sim, ScoredCandidate};
use crate::store::thread_store;

#[derive(Debug, Clone)]
pub struct RankedItem {
    pub thread_ts: String,
    pub channel: String,
    pub vector: Vec<f64>,
    pub urgency: f64,
    pub labels: Vec<String>,
    pub entities: Entities,
    pub title: String,
    pub summary: String,
    pub updated_at: f64,
    pub sim_score: f64,
    pub recency: f64,
    pub ownership: f64,
    pub base_score: f64,
    pub force_included: bool,
    pub diversity_penalty: f64,
    pub final_score: f64,
}

fn recency_score(updated_at: f64, now: f64, window_seconds: f64) -> f64 {
    if window_seconds <= 0.0 {
        return 0.0;
    }
    let age = now - updated_at;
    if age <= 0.0 {
        return 1.0;
    }
    if age >= window_seconds {
        return 0.0;
    }
    1.0 - age / window_seconds
}

async fn ownership_score(pool: &SqlitePool, thread_ts: &str, user_id: &str) -> Result<f64> {
    let messages = thread_store::get_messages_for_thread(pool, thread_ts).await?;
    let mention = format!("<@{user_id}>");
    for msg in &messages {
        if msg.user.as_deref() == Some(user_id) {
            return Ok(1.0);
        }
        if msg.text.as_deref().unwrap_or("").contains(&mention) {
            return Ok(1.0);
        }
    }
    Ok(0.0)
}

fn base_score(sim: f64, urgency: f64, ownership: f64, recency: f64) -> f64 {
    0.55 * sim + 0.20 * urgency + 0.15 * ownership + 0.10 * recency
}

/// Score, must-include-override, and diversify `candidates` down to `n`
/// items for `user_id`. Mirrors `rerank.py::rerank_candidates`.
pub async fn rerank_candidates(
    pool: &SqlitePool,
    candidates: Vec<ScoredCandidate>,
    user_id: &str,
    n: usize,
    lambda_diversity: f64,
    window_hours: f64,
    now: f64,
) -> Result<Vec<RankedItem>> {
    let window_seconds = window_hours * 3600.0;

    let mut enriched = Vec::with_capacity(candidates.len());
    for c in candidates {
        let recency = recency_score(c.candidate.updated_at, now, window_seconds);
        let ownership = ownership_score(pool, &c.candidate.thread_ts, user_id).await?;
        let base = base_score(c.sim_score, c.candidate.urgency, ownership, recency);
        enriched.push(RankedItem {
            thread_ts: c.candidate.thread_ts,
            channel: c.candidate.channel,
            vector: c.candidate.vector,
            urgency: c.candidate.urgency,
            labels: c.candidate.labels,
            entities: c.candidate.entities,
            title: c.candidate.title,
            summary: c.candidate.summary,
            updated_at: c.candidate.updated_at,
            sim_score: c.sim_score,
            recency,
            ownership,
            base_score: base,
            force_included: false,
            diversity_penalty: 0.0,
            final_score: base,
        });
    }

    Ok(select(enriched, n, lambda_diversity))
}

fn select(mut enriched: Vec<RankedItem>, n: usize, lambda_diversity: f64) -> Vec<RankedItem> {
    let mut must_include: Vec<usize> = enriched
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            (c.labels.iter().any(|l| l == "BLOCKER") || c.labels.iter().any(|l| l == "DECISION"))
                && c.urgency >= 0.8
        })
        .map(|(i, _)| i)
        .collect();

    let mut selected: Vec<RankedItem> = Vec::new();
    if !must_include.is_empty() {
        must_include.sort_by(|&a, &b| {
            let (ca, cb) = (&enriched[a], &enriched[b]);
            cb.base_score
                .partial_cmp(&ca.base_score)
                .unwrap()
                .then_with(|| cb.urgency.partial_cmp(&ca.urgency).unwrap())
                .then_with(|| cb.updated_at.partial_cmp(&ca.updated_at).unwrap())
                .then_with(|| ca.thread_ts.cmp(&cb.thread_ts))
        });
        let forced_idx = must_include[0];
        enriched[forced_idx].force_included = true;
    }

    let mut remaining: Vec<RankedItem> = Vec::new();
    for item in enriched {
        if item.force_included {
            selected.push(item);
        } else {
            remaining.push(item);
        }
    }

    while !remaining.is_empty() && selected.len() < n {
        for candidate in remaining.iter_mut() {
            let max_sim = selected
                .iter()
                .map(|sel| cosine_sim(&candidate.vector, &sel.vector))
                .fold(0.0_f64, f64::max);
            let penalty = lambda_diversity * max_sim;
            candidate.diversity_penalty = penalty;
            candidate.final_score = candidate.base_score - penalty;
        }
        remaining.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap()
                .then_with(|| b.base_score.partial_cmp(&a.base_score).unwrap())
                .then_with(|| b.urgency.partial_cmp(&a.urgency).unwrap())
                .then_with(|| b.updated_at.partial_cmp(&a.updated_at).unwrap())
                .then_with(|| a.thread_ts.cmp(&b.thread_ts))
        });
        selected.push(remaining.remove(0));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(thread_ts: &str, labels: &[&str], urgency: f64, base_score: f64, vector: Vec<f64>) -> RankedItem {
        RankedItem {
            thread_ts: thread_ts.into(),
            channel: "C1".into(),
            vector,
            urgency,
            labels: labels.iter().map(|s| s.to_string()).collect(),
            entities: Entities::default(),
            title: String::new(),
            summary: String::new(),
            updated_at: 0.0,
            sim_score: 0.0,
            recency: 0.0,
            ownership: 0.0,
            base_score,
            force_included: false,
            diversity_penalty: 0.0,
            final_score: base_score,
        }
    }

    #[test]
    fn forces_single_highest_urgent_blocker_first() {
        let items = vec![
            item("a", &["BLOCKER"], 0.9, 0.5, vec![1.0, 0.0]),
            item("b", &["BLOCKER"], 0.85, 0.9, vec![0.0, 1.0]),
            item("c", &[], 0.1, 0.95, vec![1.0, 1.0]),
        ];
        let selected = select(items, 2, 0.2);
        assert_eq!(selected[0].thread_ts, "b");
        assert!(selected[0].force_included);
        assert!(!selected[1].force_included);
    }

    #[test]
    fn diversity_penalizes_similar_vectors() {
        let items = vec![
            item("a", &[], 0.1, 0.9, vec![1.0, 0.0]),
            item("b", &[], 0.1, 0.89, vec![1.0, 0.0]),
            item("c", &[], 0.1, 0.88, vec![0.0, 1.0]),
        ];
        let selected = select(items, 2, 0.5);
        assert_eq!(selected[0].thread_ts, "a");
        assert_eq!(selected[1].thread_ts, "c");
    }
}
