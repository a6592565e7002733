//! Plain data structs for every entity in the system, plus the inbound
//! event envelope the chat platform sends.

use serde::{Deserialize, Serialize};

/// A reaction attached to a message, e.g. `{name: "rotating_light", count: 3}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub name: String,
    #[serde(default = "default_reaction_count")]
    pub count: i64,
}

fn default_reaction_count() -> i64 {
    1
}

/// The inner event carried by a chat-platform envelope. Kept as a single
/// struct with optional fields (mirroring the wire shape) rather than a
/// Rust enum: the platform's `(type, subtype)` pair selects behavior, and
/// several shapes (`message`, `item`, `reaction`) are mutually exclusive
/// depending on that pair. `classify()` below turns this into the
/// exhaustively-matched `InnerEventKind` the reducer actually operates on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InnerEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reactions: Option<Vec<Reaction>>,
    #[serde(default)]
    pub message: Option<Box<InnerEvent>>,
    #[serde(default)]
    pub previous_message: Option<Box<InnerEvent>>,
    #[serde(default)]
    pub item: Option<ReactionTarget>,
    #[serde(default)]
    pub reaction: Option<String>,
    #[serde(default)]
    pub event_ts: Option<String>,
}

/// The `item` field of a `reaction_added`/`reaction_removed` event: points
/// at the message the reaction landed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionTarget {
    pub channel: String,
    pub ts: String,
}

/// The full envelope posted to `/slack/events`, `/backfill`, and `/sim/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_id: String,
    #[serde(default)]
    pub event_time: Option<i64>,
    #[serde(default)]
    pub event_ts: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub event: InnerEvent,
}

/// The exhaustively-matched event kind the thread reducer operates on
/// (§4.3). Produced from the wire-shaped `InnerEvent` by `classify()`.
#[derive(Clone)]
pub enum ThreadEvent {
    Message {
        channel: String,
        ts: String,
        thread_ts: String,
        user: Option<String>,
        text: Option<String>,
        reactions: Option<Vec<Reaction>>,
    },
    MessageChanged {
        channel: String,
        ts: String,
        thread_ts: String,
        text: Option<String>,
    },
    MessageDeleted {
        channel: String,
        ts: String,
    },
    ReactionAdded {
        channel: String,
        ts: String,
        name: String,
    },
    ReactionRemoved {
        channel: String,
        ts: String,
        name: String,
    },
    /// Missing both a channel and a resolvable target; discarded by the
    /// reducer per §4.3.
    Unrecognized,
}

impl InnerEvent {
    /// Turn the wire-shaped event into the reducer's sum type.
    pub fn classify(&self) -> ThreadEvent {
        match (self.kind.as_str(), self.subtype.as_deref()) {
            ("message", None) => match (&self.channel, &self.ts) {
                (Some(channel), Some(ts)) => ThreadEvent::Message {
                    channel: channel.clone(),
                    ts: ts.clone(),
                    thread_ts: self.thread_ts.clone().unwrap_or_else(|| ts.clone()),
                    user: self.user.clone(),
                    text: self.text.clone(),
                    reactions: self.reactions.clone(),
                },
                _ => ThreadEvent::Unrecognized,
            },
            ("message", Some("message_changed")) => {
                let msg = self.message.as_deref();
                let channel = self
                    .channel
                    .clone()
                    .or_else(|| msg.and_then(|m| m.channel.clone()));
                let ts = msg.and_then(|m| m.ts.clone());
                match (channel, ts) {
                    (Some(channel), Some(ts)) => ThreadEvent::MessageChanged {
                        thread_ts: msg
                            .and_then(|m| m.thread_ts.clone())
                            .unwrap_or_else(|| ts.clone()),
                        channel,
                        ts,
                        text: msg.and_then(|m| m.text.clone()),
                    },
                    _ => ThreadEvent::Unrecognized,
                }
            }
            ("message", Some("message_deleted")) => {
                let msg = self
                    .previous_message
                    .as_deref()
                    .or(self.message.as_deref());
                let channel = self
                    .channel
                    .clone()
                    .or_else(|| msg.and_then(|m| m.channel.clone()));
                let ts = msg.and_then(|m| m.ts.clone());
                match (channel, ts) {
                    (Some(channel), Some(ts)) => ThreadEvent::MessageDeleted { channel, ts },
                    _ => ThreadEvent::Unrecognized,
                }
            }
            ("reaction_added", _) => match (&self.item, &self.reaction) {
                (Some(item), Some(name)) => ThreadEvent::ReactionAdded {
                    channel: item.channel.clone(),
                    ts: item.ts.clone(),
                    name: name.clone(),
                },
                _ => ThreadEvent::Unrecognized,
            },
            ("reaction_removed", _) => match (&self.item, &self.reaction) {
                (Some(item), Some(name)) => ThreadEvent::ReactionRemoved {
                    channel: item.channel.clone(),
                    ts: item.ts.clone(),
                    name: name.clone(),
                },
                _ => ThreadEvent::Unrecognized,
            },
            _ => ThreadEvent::Unrecognized,
        }
    }
}

/// A stored chat message, keyed by `(channel, ts)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub ts: String,
    pub thread_ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub reactions: Vec<Reaction>,
    pub is_deleted: bool,
    pub edited_at: Option<f64>,
    pub created_at: f64,
}

/// Derived per-thread aggregate, keyed by `thread_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub thread_ts: String,
    pub channel: String,
    pub root_ts: String,
    pub created_at: f64,
    pub last_activity: f64,
    pub reply_count: i64,
    pub reaction_count: i64,
    pub participants: Vec<String>,
}

/// Five closed-vocabulary entity lists extracted from a thread's text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    pub materials: Vec<String>,
    pub phases: Vec<String>,
    pub deadlines: Vec<String>,
    pub vendors: Vec<String>,
    pub lead_times: Vec<String>,
}

/// The enriched per-thread ranking unit, keyed by `thread_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItem {
    pub thread_ts: String,
    pub channel: String,
    pub title: String,
    pub labels: Vec<String>,
    pub entities: Entities,
    pub urgency: f64,
    pub summary: String,
    pub updated_at: f64,
}

/// A unit-norm bag-of-hashes embedding, keyed by `thread_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub thread_ts: String,
    pub dim: usize,
    pub vector: Vec<f64>,
    pub updated_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub role_id: String,
    pub name: String,
    pub description: String,
    pub role_vector: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub phase_key: String,
    pub description: String,
    pub phase_vector: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub current_phase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role_id: Option<String>,
    pub user_vector: Option<Vec<f64>>,
    pub updated_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub digest_id: String,
    pub user_id: String,
    pub project_id: String,
    pub created_at: f64,
    pub items: Vec<DigestViewItem>,
}

/// An action a user took on a shown digest item (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackAction {
    Click,
    Save,
    ThumbsUp,
    ThumbsDown,
    Dismiss,
}

impl FeedbackAction {
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            FeedbackAction::Click | FeedbackAction::Save | FeedbackAction::ThumbsUp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackAction::Click => "click",
            FeedbackAction::Save => "save",
            FeedbackAction::ThumbsUp => "thumbs_up",
            FeedbackAction::ThumbsDown => "thumbs_down",
            FeedbackAction::Dismiss => "dismiss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "click" => Some(Self::Click),
            "save" => Some(Self::Save),
            "thumbs_up" => Some(Self::ThumbsUp),
            "thumbs_down" => Some(Self::ThumbsDown),
            "dismiss" => Some(Self::Dismiss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: String,
    pub user_id: String,
    pub project_id: String,
    pub thread_ts: String,
    pub action: FeedbackAction,
    pub created_at: f64,
}

/// A schedule's `{time_of_day, timezone}` pair, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleCron {
    pub time_of_day: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,
    pub team_id: String,
    pub project_id: String,
    pub user_id: String,
    pub cron: ScheduleCron,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub delivery_id: String,
    pub digest_id: String,
    pub team_id: String,
    pub user_id: String,
    pub delivered_at: f64,
    pub status: DeliveryStatus,
    pub platform_message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub team_id: String,
    pub access_token: String,
    pub bot_user_id: String,
    pub installed_at: f64,
    pub scopes: Vec<String>,
}

/// The rendered item inside a `Digest`'s snapshot and the `/digest` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestViewItem {
    pub thread_ts: String,
    pub title: String,
    pub summary: String,
    pub labels: Vec<String>,
    pub entities: Entities,
    pub urgency: f64,
    pub why_shown: String,
    pub score_breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub final_score: f64,
    pub sim: f64,
    pub urgency: f64,
    pub ownership: f64,
    pub recency: f64,
    pub diversity_penalty: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_plain_message_defaults_thread_ts_to_ts() {
        let inner = InnerEvent {
            kind: "message".into(),
            channel: Some("C1".into()),
            ts: Some("100.0".into()),
            ..Default::default()
        };
        match inner.classify() {
            ThreadEvent::Message { thread_ts, ts, .. } => assert_eq!(thread_ts, ts),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn classify_missing_channel_and_target_is_discarded() {
        let inner = InnerEvent {
            kind: "message".into(),
            ..Default::default()
        };
        assert!(matches!(inner.classify(), ThreadEvent::Unrecognized));
    }

    #[test]
    fn classify_reaction_added_reads_item_and_reaction() {
        let inner = InnerEvent {
            kind: "reaction_added".into(),
            item: Some(ReactionTarget {
                channel: "C1".into(),
                ts: "100.0".into(),
            }),
            reaction: Some("rotating_light".into()),
            ..Default::default()
        };
        match inner.classify() {
            ThreadEvent::ReactionAdded { name, .. } => assert_eq!(name, "rotating_light"),
            other => panic!("expected ReactionAdded, got {other:?}"),
        }
    }
}

impl std::fmt::Debug for ThreadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadEvent::Message { ts, .. } => write!(f, "Message(ts={ts})"),
            ThreadEvent::MessageChanged { ts, .. } => write!(f, "MessageChanged(ts={ts})"),
            ThreadEvent::MessageDeleted { ts, .. } => write!(f, "MessageDeleted(ts={ts})"),
            ThreadEvent::ReactionAdded { ts, name, .. } => {
                write!(f, "ReactionAdded(ts={ts}, name={name})")
            }
            ThreadEvent::ReactionRemoved { ts, name, .. } => {
                write!(f, "ReactionRemoved(ts={ts}, name={name})")
            }
            ThreadEvent::Unrecognized => write!(f, "Unrecognized"),
        }
    }
}
