//! The pipeline: snapshot-before, apply, detect, hand back the pair.
//!
//! One pipeline instance and its accumulator form a single-writer domain.
//! `process` is synchronous and infallible; the service layer owns the
//! fan-out (per-event emissions before the aggregate update, recorder and
//! publisher invoked inline so they see every message).

use crate::accumulator::StateAccumulator;
use crate::detect;
use crate::events::Event;
use crate::state::SessionState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound message: the universal shape shared by the live feed, the
/// archive adapter, the timeline, and the JSONL recording format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// ISO-8601 UTC, fixed width.
    pub ts: String,
    pub topic: String,
    pub data: Value,
}

/// Result of processing one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Deep copy of the snapshot after the diff was applied.
    pub snapshot: SessionState,
    /// Events detected between the before and after snapshots, in fixed
    /// detector order.
    pub events: Vec<Event>,
}

/// Sequencer for one message stream, agnostic to the stream's origin.
#[derive(Debug, Default)]
pub struct Pipeline {
    accumulator: StateAccumulator,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            accumulator: StateAccumulator::new(),
        }
    }

    /// Seed the accumulator from an initial snapshot (deep copy).
    pub fn with_initial_state(state: SessionState) -> Self {
        Pipeline {
            accumulator: StateAccumulator::with_state(state),
        }
    }

    /// Current snapshot, read-only.
    pub fn state(&self) -> &SessionState {
        self.accumulator.get()
    }

    /// Apply one message and detect events across the transition.
    pub fn process(&mut self, msg: &FeedMessage) -> ProcessOutcome {
        let prev = self.accumulator.snapshot();
        self.accumulator
            .apply(&msg.topic, &msg.data, Some(&msg.ts));
        let curr = self.accumulator.get();
        let events = detect::detect(&prev, curr);
        ProcessOutcome {
            snapshot: curr.clone(),
            events,
        }
    }

    /// Apply one message without running detectors. Used by seek replay,
    /// where intermediate transitions must not emit events.
    pub fn apply_silent(&mut self, msg: &FeedMessage) {
        self.accumulator
            .apply(&msg.topic, &msg.data, Some(&msg.ts));
    }

    /// Reset the accumulator, optionally seeding it from a snapshot.
    pub fn reload(&mut self, initial_state: Option<SessionState>) {
        self.accumulator = match initial_state {
            Some(state) => StateAccumulator::with_state(state),
            None => StateAccumulator::new(),
        };
    }
}
