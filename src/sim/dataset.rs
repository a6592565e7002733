//! The `carbon_fiber_demo` scripted scenario: four threads of synthetic
//! chat traffic used to exercise retrieval and delivery end to end.
//! Mirrors `original_source/app/sim/dataset.py`.

use crate::error::{IntakeError, Result};
use crate::model::{EventPayload, InnerEvent, ReactionTarget};

const DEMO_TEAM_ID: &str = "T_DEMO";

/// A monotonic fake clock, ticking by `step_seconds` on every `tick()`.
#[derive(Debug, Clone)]
pub struct SimClock {
    current: f64,
    step_seconds: f64,
}

impl SimClock {
    pub fn new(start_epoch: f64, step_seconds: f64) -> Self {
        Self {
            current: start_epoch,
            step_seconds,
        }
    }

    pub fn tick(&mut self) -> f64 {
        let value = self.current;
        self.current += self.step_seconds;
        value
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1_700_000_000.0, 1.0)
    }
}

fn event_id(prefix: &str, idx: u32) -> String {
    format!("Ev{prefix}{idx:04}")
}

struct Emitter<'a> {
    clock: &'a mut SimClock,
    idx: u32,
    events: Vec<EventPayload>,
}

impl<'a> Emitter<'a> {
    fn new(clock: &'a mut SimClock) -> Self {
        Self {
            clock,
            idx: 0,
            events: Vec::new(),
        }
    }

    fn message(&mut self, channel: &str, user: &str, text: &str, thread_ts: f64) {
        let ts = self.clock.tick();
        self.events.push(EventPayload {
            event_id: event_id("M", self.idx),
            event_time: Some(ts as i64),
            event_ts: None,
            team_id: Some(DEMO_TEAM_ID.to_string()),
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "message".into(),
                channel: Some(channel.to_string()),
                user: Some(user.to_string()),
                text: Some(text.to_string()),
                ts: Some(format!("{ts:.3}")),
                thread_ts: Some(format!("{thread_ts:.3}")),
                ..Default::default()
            },
        });
        self.idx += 1;
    }

    fn reaction(&mut self, channel: &str, reaction: &str, item_ts: f64) {
        let ts = self.clock.tick();
        self.events.push(EventPayload {
            event_id: event_id("R", self.idx),
            event_time: Some(ts as i64),
            event_ts: None,
            team_id: Some(DEMO_TEAM_ID.to_string()),
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "reaction_added".into(),
                item: Some(ReactionTarget {
                    channel: channel.to_string(),
                    ts: format!("{item_ts:.3}"),
                }),
                reaction: Some(reaction.to_string()),
                event_ts: Some(format!("{ts:.3}")),
                ..Default::default()
            },
        });
        self.idx += 1;
    }

    fn edit(&mut self, channel: &str, ts: f64, thread_ts: f64, text: &str) {
        let now = self.clock.tick();
        self.events.push(EventPayload {
            event_id: event_id("E", self.idx),
            event_time: Some(now as i64),
            event_ts: None,
            team_id: Some(DEMO_TEAM_ID.to_string()),
            kind: "event_callback".into(),
            event: InnerEvent {
                kind: "message".into(),
                subtype: Some("message_changed".into()),
                channel: Some(channel.to_string()),
                message: Some(Box::new(InnerEvent {
                    ts: Some(format!("{ts:.3}")),
                    text: Some(text.to_string()),
                    thread_ts: Some(format!("{thread_ts:.3}")),
                    channel: Some(channel.to_string()),
                    ..Default::default()
                })),
                ..Default::default()
            },
        });
        self.idx += 1;
    }
}

/// Four threads of synthetic aerospace-supply-chain chat traffic: a
/// material-change decision, a vendor lead-time/MOQ thread (later edited),
/// an RF test risk, and a build-schedule/action-items thread.
pub fn carbon_fiber_demo(clock: &mut SimClock) -> Vec<EventPayload> {
    let mut e = Emitter::new(clock);

    let thread1_ts = e.clock.tick();
    e.message(
        "C_DRONE_STRUCT",
        "U_MAYA",
        "Aluminum bracket reacts with solvent X. Proposing carbon fiber for Rev C. Decision needed by Friday or EVT build slips.",
        thread1_ts,
    );
    e.message(
        "C_DRONE_STRUCT",
        "U_MAYA",
        "ME note: carbon fiber saves 120g but tooling cost is higher.",
        thread1_ts,
    );
    e.message(
        "C_DRONE_STRUCT",
        "U_PRIYA",
        "PM: if we miss Friday, EVT build schedule slips by 2 weeks.",
        thread1_ts,
    );
    e.reaction("C_DRONE_STRUCT", "rotating_light", thread1_ts);

    let thread2_ts = e.clock.tick();
    e.message(
        "C_DRONE_SUPPLY",
        "U_SAM",
        "Supply chain: Vendor A lead time 8 weeks, MOQ 500. Vendor B can do 6 weeks but higher cost.",
        thread2_ts,
    );
    e.message(
        "C_DRONE_SUPPLY",
        "U_SAM",
        "Sourcing risk: carbon fiber fabric constrained. Alternative vendor C available.",
        thread2_ts,
    );

    let thread3_ts = e.clock.tick();
    e.message(
        "C_DRONE_STRUCT",
        "U_MAYA",
        "RF test risk: carbon fiber near antenna mount could worsen RF; need test before DVT.",
        thread3_ts,
    );

    let thread4_ts = e.clock.tick();
    e.message(
        "C_DRONE_STRUCT",
        "U_PRIYA",
        "Build schedule: decision review tomorrow 2pm; owners <@U_MAYA> and <@U_SAM>; action list pending.",
        thread4_ts,
    );
    e.message(
        "C_DRONE_STRUCT",
        "U_PRIYA",
        "Action items: update BOM, confirm vendor quotes, lock EVT build plan.",
        thread4_ts,
    );

    e.edit(
        "C_DRONE_SUPPLY",
        thread2_ts,
        thread2_ts,
        "Supply chain: Vendor A lead time 8 weeks, MOQ 600. Vendor B can do 6 weeks but higher cost.",
    );

    e.events
}

/// Dispatch to a named scenario. Only `carbon_fiber_demo` exists today.
pub fn get_scenario_events(scenario_id: &str, clock: &mut SimClock) -> Result<Vec<EventPayload>> {
    match scenario_id {
        "carbon_fiber_demo" => Ok(carbon_fiber_demo(clock)),
        other => Err(IntakeError::InvalidPayload(format!("unknown_scenario: {other}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carbon_fiber_demo_emits_ten_events() {
        let mut clock = SimClock::default();
        let events = carbon_fiber_demo(&mut clock);
        assert_eq!(events.len(), 10);
    }

    #[test]
    fn carbon_fiber_demo_event_ids_are_unique() {
        let mut clock = SimClock::default();
        let events = carbon_fiber_demo(&mut clock);
        let ids: std::collections::HashSet<_> = events.iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids.len(), events.len());
    }

    #[test]
    fn unknown_scenario_errors() {
        let mut clock = SimClock::default();
        assert!(get_scenario_events("not_a_real_scenario", &mut clock).is_err());
    }

    #[test]
    fn last_event_is_the_moq_edit() {
        let mut clock = SimClock::default();
        let events = carbon_fiber_demo(&mut clock);
        let last = events.last().unwrap();
        assert_eq!(last.event.subtype.as_deref(), Some("message_changed"));
        assert!(last
            .event
            .message
            .as_ref()
            .unwrap()
            .text
            .as_deref()
            .unwrap()
            .contains("MOQ 600"));
    }
}
