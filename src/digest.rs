//! Digest assembly (§4.9): compose the query vector, retrieve and rerank
//! candidates, and render `why_shown` reasons. Mirrors `digest.py`.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::{QueryWeights, RetrievalConfig};
use crate::error::Result;
use crate::model::{DigestViewItem, Entities, ScoreBreakdown};
use crate::profiles;
use crate::rerank::{self, RankedItem};
use crate::retrieval::{self, CandidateFilter};
use crate::store::{digest_store, profile_store};

const ROLE_SIGNAL_KEYWORDS: &[&str] = &["supply", "procure", "vendor", "lead time"];
const DIVERSITY_LAMBDA: f64 = 0.2;
const RETRIEVE_K: usize = 50;

/// Build the "; "-joined reason string for showing `item`, per §4.9.
fn why_shown(item: &RankedItem, entities: &Entities, role_description: &str, phase_key: Option<&str>) -> String {
    let mut reasons = Vec::new();
    if item.urgency >= 0.8 {
        reasons.push("High urgency".to_string());
    }
    let role_lower = role_description.to_lowercase();
    if ROLE_SIGNAL_KEYWORDS.iter().any(|kw| role_lower.contains(kw))
        && (!entities.vendors.is_empty() || !entities.lead_times.is_empty())
    {
        reasons.push("Role match: vendor/lead time".to_string());
    }
    if let Some(phase_key) = phase_key {
        let upper = phase_key.to_uppercase();
        if entities.phases.iter().any(|p| p.to_uppercase() == upper) {
            reasons.push(format!("Phase match: {upper}"));
        }
    }
    if reasons.is_empty() {
        reasons.push("Semantic similarity".to_string());
    }
    reasons.join("; ")
}

pub struct BuiltDigest {
    pub digest_id: String,
    pub items: Vec<DigestViewItem>,
}

/// Build a personalized digest of up to `n` threads for `user_id` within
/// `project_id`, and persist the snapshot. Mirrors `digest.py::build_digest`.
pub async fn build_digest(
    pool: &SqlitePool,
    user_id: &str,
    project_id: &str,
    n: usize,
    query_weights: QueryWeights,
    retrieval_cfg: RetrievalConfig,
    now: f64,
) -> Result<BuiltDigest> {
    let query_ctx = profiles::get_query_vector(pool, user_id, project_id, query_weights).await?;

    let filter = CandidateFilter {
        project_id: Some(project_id.to_string()),
        channels: None,
        since_ts: None,
        label_filter: Vec::new(),
    };
    let candidates = retrieval::load_candidate_items(pool, filter, retrieval_cfg.window_hours, now).await?;
    let top_k = retrieval::retrieve_top_k(&query_ctx.result.q_vector, candidates, RETRIEVE_K);
    let ranked = rerank::rerank_candidates(
        pool,
        top_k,
        user_id,
        n,
        DIVERSITY_LAMBDA,
        retrieval_cfg.window_hours,
        now,
    )
    .await?;

    let role = profile_store::fetch_role(pool, &query_ctx.role_id).await?;
    let role_description = role.map(|r| r.description).unwrap_or_default();
    let phase_key = query_ctx.phase_key.as_deref();

    let mut items = Vec::with_capacity(ranked.len());
    for item in ranked {
        let reason = why_shown(&item, &item.entities, &role_description, phase_key);
        items.push(DigestViewItem {
            thread_ts: item.thread_ts,
            title: item.title,
            summary: item.summary,
            labels: item.labels,
            entities: item.entities,
            urgency: item.urgency,
            why_shown: reason,
            score_breakdown: ScoreBreakdown {
                final_score: item.final_score,
                sim: item.sim_score,
                urgency: item.urgency,
                ownership: item.ownership,
                recency: item.recency,
                diversity_penalty: item.diversity_penalty,
            },
        });
    }

    let digest_id = format!("dig-{}", Uuid::new_v4().simple());
    digest_store::insert_digest(pool, &digest_id, user_id, project_id, &items, now).await?;

    Ok(BuiltDigest { digest_id, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn why_shown_falls_back_to_semantic_similarity() {
        let item = RankedItem {
            thread_ts: "1".into(),
            channel: "C1".into(),
            vector: vec![],
            urgency: 0.1,
            labels: vec![],
            entities: Entities::default(),
            title: String::new(),
            summary: String::new(),
            updated_at: 0.0,
            sim_score: 0.0,
            recency: 0.0,
            ownership: 0.0,
            base_score: 0.0,
            force_included: false,
            diversity_penalty: 0.0,
            final_score: 0.0,
        };
        let entities = Entities::default();
        assert_eq!(why_shown(&item, &entities, "", None), "Semantic similarity");
    }

    #[test]
    fn why_shown_orders_high_urgency_first() {
        let item = RankedItem {
            thread_ts: "1".into(),
            channel: "C1".into(),
            vector: vec![],
            urgency: 0.9,
            labels: vec![],
            entities: Entities::default(),
            title: String::new(),
            summary: String::new(),
            updated_at: 0.0,
            sim_score: 0.0,
            recency: 0.0,
            ownership: 0.0,
            base_score: 0.0,
            force_included: false,
            diversity_penalty: 0.0,
            final_score: 0.0,
        };
        let entities = Entities {
            vendors: vec!["Vendor A".into()],
            ..Default::default()
        };
        let reason = why_shown(&item, &entities, "supply chain lead", None);
        assert_eq!(reason, "High urgency; Role match: vendor/lead time");
    }
}
