//! Closed-vocabulary rule-based thread enrichment (§4.4): labels, entity
//! extraction, urgency scoring, and title/summary construction.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Entities, Message};

const LABEL_KEYWORDS: &[(&str, &[&str])] = &[
    ("DECISION", &["decision", "approve", "vote", "choose"]),
    ("RISK", &["risk", "concern", "issue", "safer"]),
    ("BLOCKER", &["blocker", "blocked", "cannot proceed"]),
    ("ACTION", &["action", "todo", "follow up", "need to"]),
    ("FYI", &["fyi", "for your info", "heads up"]),
];

const MATERIALS: &[&str] = &["carbon fiber", "aluminum", "aluminium"];
const PHASE_HINTS: &[&str] = &["evt", "dvt", "pvt"];
const VENDORS: &[&str] = &["vendor a", "vendor b"];
const DEADLINES: &[&str] = &["by friday", "by eod", "by end of day", "by monday", "by tuesday"];

static LEAD_TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s+weeks\b").expect("valid lead-time regex"));

static PHASE_WORD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PHASE_HINTS
        .iter()
        .map(|p| {
            (
                *p,
                Regex::new(&format!(r"(?i)\b{p}\b")).expect("valid phase regex"),
            )
        })
        .collect()
});

/// Labels present in `text`. Per §4.4, deduped and sorted; the Python
/// reference appends in keyword-table order without sorting, but the spec's
/// stated invariant is explicit, so that's what this returns.
pub fn classify_labels(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut labels: BTreeSet<String> = BTreeSet::new();
    for (label, keywords) in LABEL_KEYWORDS {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            labels.insert((*label).to_string());
        }
    }
    labels.into_iter().collect()
}

/// Extract materials/phases/vendors/deadlines/lead-times from `text`.
pub fn extract_entities(text: &str) -> Entities {
    let lowered = text.to_lowercase();

    let materials = MATERIALS
        .iter()
        .filter(|m| lowered.contains(*m))
        .map(|m| m.to_string())
        .collect();

    let phases = PHASE_WORD_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&lowered))
        .map(|(p, _)| p.to_uppercase())
        .collect();

    let vendors = VENDORS
        .iter()
        .filter(|v| lowered.contains(*v))
        .map(|v| title_case(v))
        .collect();

    let deadlines = DEADLINES
        .iter()
        .filter(|d| lowered.contains(*d))
        .map(|d| d.to_string())
        .collect();

    let lead_times = LEAD_TIME_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    Entities {
        materials,
        phases,
        deadlines,
        vendors,
        lead_times,
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Urgency score in `[0, 1]`, summing fixed weights for each signal present.
pub fn compute_urgency(text: &str, reactions_present: &[bool]) -> f64 {
    let lowered = text.to_lowercase();
    let mut score = 0.0;
    if DEADLINES.iter().any(|d| lowered.contains(d)) {
        score += 0.35;
    }
    if lowered.contains("urgent") || lowered.contains("blocker") || lowered.contains("blocked") {
        score += 0.25;
    }
    if lowered.contains("decision needed") || lowered.contains("decision") {
        score += 0.1;
    }
    if PHASE_HINTS.iter().any(|p| lowered.contains(p)) {
        score += 0.15;
    }
    if reactions_present.iter().any(|has| *has) {
        score += 0.2;
    }
    score.min(1.0)
}

/// Whether any message in the thread carries a `rotating_light` reaction,
/// one entry per message (mirrors the Python reference's per-message scan
/// over `reactions_json`).
pub fn rotating_light_flags(messages: &[Message]) -> Vec<bool> {
    messages
        .iter()
        .map(|m| m.reactions.iter().any(|r| r.name == "rotating_light"))
        .collect()
}

/// Construct the thread title from its extracted entities.
pub fn build_title(entities: &Entities) -> String {
    let materials: BTreeSet<String> = entities.materials.iter().map(|m| m.to_lowercase()).collect();
    let has_carbon = materials.contains("carbon fiber");
    let has_aluminum = materials.contains("aluminum") || materials.contains("aluminium");
    if has_carbon && has_aluminum {
        return "Material change proposal: aluminum -> carbon fiber".to_string();
    }
    if !materials.is_empty() {
        let joined = materials.into_iter().collect::<Vec<_>>().join(", ");
        return format!("Material discussion: {joined}");
    }
    "Thread update".to_string()
}

/// Build a thread summary from the root message plus up to five replies.
/// Deleted messages contribute no line, per §3/§4.4.
pub fn build_summary(messages: &[Message]) -> String {
    let live: Vec<&Message> = messages.iter().filter(|m| !m.is_deleted).collect();
    if live.is_empty() {
        return String::new();
    }
    let mut lines = Vec::new();
    if let Some(text) = &live[0].text {
        if !text.is_empty() {
            lines.push(format!("- {text}"));
        }
    }
    for reply in live.iter().skip(1).take(5) {
        if let Some(text) = &reply.text {
            if !text.is_empty() {
                lines.push(format!("- {text}"));
            }
        }
    }
    lines.join("\n")
}

/// The full enrichment tuple produced for a thread: title, labels,
/// entities, urgency, summary.
pub struct Enrichment {
    pub title: String,
    pub labels: Vec<String>,
    pub entities: Entities,
    pub urgency: f64,
    pub summary: String,
}

/// Enrich a thread given its text (via `thread_text`, which includes
/// deleted messages, matching `get_thread_text`) and its full message list;
/// only the summary excludes deleted messages (§4.4).
pub fn enrich_thread(thread_text: &str, messages: &[Message]) -> Enrichment {
    let labels = classify_labels(thread_text);
    let entities = extract_entities(thread_text);
    let reactions_present = rotating_light_flags(messages);
    let urgency = compute_urgency(thread_text, &reactions_present);
    let title = build_title(&entities);
    let live: Vec<Message> = messages.iter().filter(|m| !m.is_deleted).cloned().collect();
    let summary = build_summary(&live);
    Enrichment {
        title,
        labels,
        entities,
        urgency,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Reaction;

    fn msg(text: &str, deleted: bool, reactions: Vec<Reaction>) -> Message {
        Message {
            channel: "C1".into(),
            ts: "1.0".into(),
            thread_ts: "1.0".into(),
            user: Some("U1".into()),
            text: Some(text.to_string()),
            reactions,
            is_deleted: deleted,
            edited_at: None,
            created_at: 1.0,
        }
    }

    #[test]
    fn classify_labels_is_sorted_and_deduped() {
        let labels = classify_labels("This is a blocker. We cannot proceed. Need to decide.");
        assert_eq!(labels, vec!["ACTION", "BLOCKER", "DECISION"]);
    }

    #[test]
    fn extract_entities_finds_materials_and_lead_times() {
        let e = extract_entities("Switching from aluminum to carbon fiber, 8 weeks lead time");
        assert_eq!(e.materials, vec!["carbon fiber", "aluminum"]);
        assert_eq!(e.lead_times, vec!["8 weeks"]);
    }

    #[test]
    fn extract_entities_uppercases_phase_hints() {
        let e = extract_entities("EVT build is blocked");
        assert_eq!(e.phases, vec!["EVT"]);
    }

    #[test]
    fn build_title_material_change_proposal() {
        let e = extract_entities("aluminum bracket, proposing carbon fiber for rev c");
        assert_eq!(build_title(&e), "Material change proposal: aluminum -> carbon fiber");
    }

    #[test]
    fn build_summary_excludes_deleted_messages() {
        let messages = vec![
            msg("root text", false, vec![]),
            msg("deleted reply", true, vec![]),
            msg("live reply", false, vec![]),
        ];
        let summary = build_summary(&messages);
        assert_eq!(summary, "- root text\n- live reply");
    }

    #[test]
    fn compute_urgency_caps_at_one() {
        let score = compute_urgency(
            "urgent blocker decision needed by friday evt",
            &[true],
        );
        assert_eq!(score, 1.0);
    }
}
