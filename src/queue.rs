//! Priority queues (§4.2): hot/standard/backfill, each an unbounded FIFO
//! channel with exactly one consumer.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::model::EventPayload;

/// Substrings that route an event to the hot queue regardless of which
/// queue it would otherwise land in, plus a standalone `rotating_light`
/// reaction check. Mirrors `queueing.py::HOT_SIGNALS` verbatim, including
/// the otherwise-unexplained `"evt"` entry.
pub const HOT_SIGNALS: &[&str] = &["decision needed", "by friday", "blocker", "urgent", "evt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Hot,
    Standard,
    Backfill,
}

impl QueueName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Hot => "hot",
            QueueName::Standard => "standard",
            QueueName::Backfill => "backfill",
        }
    }
}

/// In-memory depth counters for `/queues/status`: incremented when an
/// event is routed in, decremented once a worker finishes it. An unbounded
/// `mpsc` channel exposes no length query of its own, so this is the only
/// way to report queue size.
pub struct QueueDepths {
    pub hot: Arc<AtomicI64>,
    pub standard: Arc<AtomicI64>,
    pub backfill: Arc<AtomicI64>,
}

impl Default for QueueDepths {
    fn default() -> Self {
        QueueDepths {
            hot: Arc::new(AtomicI64::new(0)),
            standard: Arc::new(AtomicI64::new(0)),
            backfill: Arc::new(AtomicI64::new(0)),
        }
    }
}

/// The three queue senders, cloned cheaply into every task that needs to
/// route an event, plus the one set of receivers the workers consume from.
#[derive(Clone)]
pub struct QueueHandles {
    pub hot: mpsc::UnboundedSender<EventPayload>,
    pub standard: mpsc::UnboundedSender<EventPayload>,
    pub backfill: mpsc::UnboundedSender<EventPayload>,
    pub depths: Arc<QueueDepths>,
}

pub struct QueueReceivers {
    pub hot: mpsc::UnboundedReceiver<EventPayload>,
    pub standard: mpsc::UnboundedReceiver<EventPayload>,
    pub backfill: mpsc::UnboundedReceiver<EventPayload>,
}

pub fn new_queues() -> (QueueHandles, QueueReceivers) {
    let (hot_tx, hot_rx) = mpsc::unbounded_channel();
    let (standard_tx, standard_rx) = mpsc::unbounded_channel();
    let (backfill_tx, backfill_rx) = mpsc::unbounded_channel();
    (
        QueueHandles {
            hot: hot_tx,
            standard: standard_tx,
            backfill: backfill_tx,
            depths: Arc::new(QueueDepths::default()),
        },
        QueueReceivers {
            hot: hot_rx,
            standard: standard_rx,
            backfill: backfill_rx,
        },
    )
}

fn has_rotating_light(payload: &EventPayload) -> bool {
    payload
        .event
        .reactions
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .any(|r| r.name == "rotating_light")
}

/// Route a freshly-ingested event to hot or standard, mirroring
/// `queueing.py::route_job`. Backfill is a separate explicit entry point
/// (`enqueue_backfill`), never chosen by this routing logic.
pub fn route(handles: &QueueHandles, payload: EventPayload) -> QueueName {
    let text = payload.event.text.as_deref().unwrap_or("").to_lowercase();
    let is_hot = HOT_SIGNALS.iter().any(|s| text.contains(s)) || has_rotating_light(&payload);
    if is_hot {
        if handles.hot.send(payload).is_ok() {
            handles.depths.hot.fetch_add(1, Ordering::SeqCst);
        }
        QueueName::Hot
    } else {
        if handles.standard.send(payload).is_ok() {
            handles.depths.standard.fetch_add(1, Ordering::SeqCst);
        }
        QueueName::Standard
    }
}

pub fn enqueue_backfill(handles: &QueueHandles, payload: EventPayload) {
    if handles.backfill.send(payload).is_ok() {
        handles.depths.backfill.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventPayload, InnerEvent, Reaction};

    fn payload(text: &str, reactions: Option<Vec<Reaction>>) -> EventPayload {
        EventPayload {
            event_id: "e1".into(),
            event_time: None,
            event_ts: None,
            team_id: None,
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "message".into(),
                channel: Some("C1".into()),
                ts: Some("1.0".into()),
                text: Some(text.into()),
                reactions,
                ..Default::default()
            },
        }
    }

    #[test]
    fn routes_blocker_text_to_hot() {
        let (handles, mut receivers) = new_queues();
        let routed = route(&handles, payload("This is a blocker", None));
        assert_eq!(routed, QueueName::Hot);
        assert!(receivers.hot.try_recv().is_ok());
    }

    #[test]
    fn routes_rotating_light_to_hot_even_without_keyword() {
        let (handles, _) = new_queues();
        let routed = route(
            &handles,
            payload(
                "ordinary update",
                Some(vec![Reaction {
                    name: "rotating_light".into(),
                    count: 1,
                }]),
            ),
        );
        assert_eq!(routed, QueueName::Hot);
    }

    #[test]
    fn routes_plain_text_to_standard() {
        let (handles, _) = new_queues();
        let routed = route(&handles, payload("just chatting", None));
        assert_eq!(routed, QueueName::Standard);
    }
}
