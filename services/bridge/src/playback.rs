//! Playback controller: drives a pipeline from a timeline.
//!
//! The controller owns its pipeline behind an `Arc<Mutex<_>>`; scheduled
//! ticks are `tokio::spawn`ed sleeps guarded by a generation counter. Any
//! control action (pause / stop / seek / set_speed / load) bumps the
//! generation, so an already-sleeping tick wakes up, observes a stale
//! generation and returns without advancing the index or emitting anything.
//!
//! Observers subscribe to a broadcast channel. For each processed entry the
//! per-event emissions precede the aggregate update, and entries are
//! strictly serialised — the lock is held from processing through emission.

use chrono::DateTime;
use pitwall_core::{Event, FeedMessage, Pipeline, SessionState, Timeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

/// Delay cap between entries, to tolerate large gaps in recorded data.
const MAX_TICK_DELAY: Duration = Duration::from_millis(5_000);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// Controller state as observed on the bus, the WS fan-out and the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_index: usize,
    pub timeline_len: usize,
    pub speed: f64,
}

/// Observer notifications, in emission order per entry: `event*`, `update`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlaybackEvent {
    Loaded {
        playback_state: PlaybackState,
    },
    StateChange {
        playback_state: PlaybackState,
    },
    Event {
        event: Event,
    },
    Update {
        snapshot: SessionState,
        events: Vec<Event>,
        entry: FeedMessage,
        playback_state: PlaybackState,
    },
    Seek {
        snapshot: SessionState,
        playback_state: PlaybackState,
    },
    Finished,
}

/// A control-surface command (REST body or bus payload).
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Stop,
    Speed(f64),
    Seek(String),
}

impl PlaybackCommand {
    /// Parse a `{"command": "...", "value": ...}` JSON payload.
    pub fn from_json(payload: &serde_json::Value) -> Option<PlaybackCommand> {
        let command = payload.get("command").and_then(|c| c.as_str())?;
        match command {
            "play" => Some(PlaybackCommand::Play),
            "pause" => Some(PlaybackCommand::Pause),
            "stop" => Some(PlaybackCommand::Stop),
            "speed" => {
                let value = payload.get("value")?;
                let speed = value.as_f64().or_else(|| value.as_str()?.parse().ok())?;
                Some(PlaybackCommand::Speed(speed))
            }
            "seek" => Some(PlaybackCommand::Seek(
                payload.get("value")?.as_str()?.to_owned(),
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

struct Inner {
    timeline: Option<Arc<Timeline>>,
    initial_state: Option<SessionState>,
    pipeline: Pipeline,
    status: PlaybackStatus,
    current_index: usize,
    speed: f64,
    /// Bumped by every control action; stale ticks check it and bail.
    generation: u64,
}

impl Inner {
    fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            current_index: self.current_index,
            timeline_len: self.timeline.as_ref().map_or(0, |t| t.len()),
            speed: self.speed,
        }
    }

    fn cancel_pending(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// Replays a timeline through the pipeline with seek, pause and variable
/// speed, emitting the same events a live run would.
pub struct PlaybackController {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackController {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        PlaybackController {
            inner: Arc::new(Mutex::new(Inner {
                timeline: None,
                initial_state: None,
                pipeline: Pipeline::new(),
                status: PlaybackStatus::Stopped,
                current_index: 0,
                speed: 1.0,
                generation: 0,
            })),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.playback_state()
    }

    /// Snapshot of the replayed session at the current index.
    pub async fn snapshot(&self) -> SessionState {
        self.inner.lock().await.pipeline.state().clone()
    }

    /// Load a timeline, replacing any current playback. The accumulator is
    /// seeded with a deep copy of `initial_state` (or defaults).
    pub async fn load(&self, timeline: Timeline, initial_state: Option<SessionState>) {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        inner.status = PlaybackStatus::Stopped;
        inner.current_index = 0;
        inner.pipeline.reload(initial_state.clone());
        inner.initial_state = initial_state;
        inner.timeline = Some(Arc::new(timeline));
        let _ = self.events.send(PlaybackEvent::Loaded {
            playback_state: inner.playback_state(),
        });
    }

    /// No-op when no timeline is loaded or already playing.
    pub async fn play(&self) {
        let mut inner = self.inner.lock().await;
        if inner.timeline.is_none() || inner.status == PlaybackStatus::Playing {
            return;
        }
        inner.status = PlaybackStatus::Playing;
        let _ = self.events.send(PlaybackEvent::StateChange {
            playback_state: inner.playback_state(),
        });
        let generation = inner.generation;
        schedule_tick(
            self.inner.clone(),
            self.events.clone(),
            generation,
            Duration::ZERO,
        );
    }

    /// Cancel the pending tick and hold position.
    pub async fn pause(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        if inner.status == PlaybackStatus::Playing {
            inner.status = PlaybackStatus::Paused;
            let _ = self.events.send(PlaybackEvent::StateChange {
                playback_state: inner.playback_state(),
            });
        }
    }

    /// Pause and rewind to the start of the timeline.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        if inner.status == PlaybackStatus::Stopped && inner.current_index == 0 {
            return;
        }
        inner.status = PlaybackStatus::Stopped;
        inner.current_index = 0;
        let _ = self.events.send(PlaybackEvent::StateChange {
            playback_state: inner.playback_state(),
        });
    }

    /// Set the speed multiplier. Zero or negative values are treated as 1.
    /// A pending tick is rescheduled at the new rate.
    pub async fn set_speed(&self, speed: f64) {
        let mut inner = self.inner.lock().await;
        inner.speed = if speed > 0.0 { speed } else { 1.0 };
        if inner.status != PlaybackStatus::Playing {
            return;
        }
        let generation = inner.cancel_pending();
        let delay = pending_delay(&inner);
        schedule_tick(self.inner.clone(), self.events.clone(), generation, delay);
    }

    /// Seek to timestamp `t`: rebuild the snapshot by silently replaying
    /// `[0, find_index(t))` from the initial state, then resume if playback
    /// was running. The `seek` emission reflects the fully replayed state.
    pub async fn seek(&self, t: &str) {
        let mut inner = self.inner.lock().await;
        let Some(timeline) = inner.timeline.clone() else {
            return;
        };
        let was_playing = inner.status == PlaybackStatus::Playing;
        inner.cancel_pending();
        if was_playing {
            inner.status = PlaybackStatus::Paused;
        }

        let initial = inner.initial_state.clone();
        inner.pipeline.reload(initial);
        let target = timeline.find_index(t);
        for i in 0..target {
            if let Some(entry) = timeline.at(i) {
                inner.pipeline.apply_silent(entry);
            }
        }
        inner.current_index = target;
        debug!(index = target, "seek complete");
        let _ = self.events.send(PlaybackEvent::Seek {
            snapshot: inner.pipeline.state().clone(),
            playback_state: inner.playback_state(),
        });

        if was_playing {
            inner.status = PlaybackStatus::Playing;
            let _ = self.events.send(PlaybackEvent::StateChange {
                playback_state: inner.playback_state(),
            });
            let generation = inner.generation;
            schedule_tick(
                self.inner.clone(),
                self.events.clone(),
                generation,
                Duration::ZERO,
            );
        }
    }

    /// Dispatch a control-surface command.
    pub async fn apply_command(&self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play => self.play().await,
            PlaybackCommand::Pause => self.pause().await,
            PlaybackCommand::Stop => self.stop().await,
            PlaybackCommand::Speed(s) => self.set_speed(s).await,
            PlaybackCommand::Seek(t) => self.seek(&t).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

fn schedule_tick(
    inner_arc: Arc<Mutex<Inner>>,
    events: broadcast::Sender<PlaybackEvent>,
    generation: u64,
    delay: Duration,
) {
    tokio::spawn(async move {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        run_tick(inner_arc, events, generation).await;
    });
}

async fn run_tick(
    inner_arc: Arc<Mutex<Inner>>,
    events: broadcast::Sender<PlaybackEvent>,
    generation: u64,
) {
    let mut inner = inner_arc.lock().await;
    if inner.generation != generation || inner.status != PlaybackStatus::Playing {
        return;
    }
    let Some(timeline) = inner.timeline.clone() else {
        return;
    };

    if inner.current_index >= timeline.len() {
        inner.status = PlaybackStatus::Stopped;
        inner.current_index = 0;
        let _ = events.send(PlaybackEvent::Finished);
        return;
    }

    let Some(entry) = timeline.at(inner.current_index).cloned() else {
        return;
    };
    let outcome = inner.pipeline.process(&entry);
    inner.current_index += 1;

    for event in &outcome.events {
        let _ = events.send(PlaybackEvent::Event {
            event: event.clone(),
        });
    }
    let _ = events.send(PlaybackEvent::Update {
        snapshot: outcome.snapshot,
        events: outcome.events,
        entry: entry.clone(),
        playback_state: inner.playback_state(),
    });

    let delay = match timeline.at(inner.current_index) {
        Some(next) => inter_entry_delay(&entry.ts, &next.ts, inner.speed),
        // Final entry processed; finalise on the next tick.
        None => Duration::ZERO,
    };
    schedule_tick(inner_arc.clone(), events.clone(), generation, delay);
}

fn pending_delay(inner: &Inner) -> Duration {
    let Some(timeline) = inner.timeline.as_ref() else {
        return Duration::ZERO;
    };
    if inner.current_index == 0 {
        return Duration::ZERO;
    }
    match (
        timeline.at(inner.current_index - 1),
        timeline.at(inner.current_index),
    ) {
        (Some(prev), Some(next)) => inter_entry_delay(&prev.ts, &next.ts, inner.speed),
        _ => Duration::ZERO,
    }
}

/// Wall-clock delay between two entries at the given speed, capped to
/// tolerate large gaps in recorded data.
pub fn inter_entry_delay(prev_ts: &str, next_ts: &str, speed: f64) -> Duration {
    let millis = match (
        DateTime::parse_from_rfc3339(prev_ts),
        DateTime::parse_from_rfc3339(next_ts),
    ) {
        (Ok(a), Ok(b)) => (b - a).num_milliseconds().max(0),
        _ => 0,
    };
    let speed = if speed > 0.0 { speed } else { 1.0 };
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = Duration::from_millis((millis as f64 / speed).round() as u64);
    scaled.min(MAX_TICK_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inter_entry_delay_scales_and_caps() {
        let a = "2026-05-24T13:00:00.000Z";
        let b = "2026-05-24T13:00:01.000Z";
        assert_eq!(inter_entry_delay(a, b, 1.0), Duration::from_millis(1000));
        assert_eq!(inter_entry_delay(a, b, 2.0), Duration::from_millis(500));

        let far = "2026-05-24T14:00:00.000Z";
        assert_eq!(inter_entry_delay(a, far, 1.0), MAX_TICK_DELAY);
        // Reversed timestamps clamp to zero rather than underflowing.
        assert_eq!(inter_entry_delay(b, a, 1.0), Duration::ZERO);
    }

    #[test]
    fn command_parsing_accepts_all_verbs() {
        assert_eq!(
            PlaybackCommand::from_json(&json!({"command": "play"})),
            Some(PlaybackCommand::Play)
        );
        assert_eq!(
            PlaybackCommand::from_json(&json!({"command": "speed", "value": 2.5})),
            Some(PlaybackCommand::Speed(2.5))
        );
        assert_eq!(
            PlaybackCommand::from_json(&json!({"command": "speed", "value": "1.5"})),
            Some(PlaybackCommand::Speed(1.5))
        );
        assert_eq!(
            PlaybackCommand::from_json(&json!({"command": "seek", "value": "2026-05-24T13:00:00Z"})),
            Some(PlaybackCommand::Seek("2026-05-24T13:00:00Z".to_owned()))
        );
        assert_eq!(PlaybackCommand::from_json(&json!({"command": "rewind"})), None);
        assert_eq!(PlaybackCommand::from_json(&json!({"value": 1})), None);
    }

    #[test]
    fn playback_state_serializes_camel_case() {
        let state = PlaybackState {
            status: PlaybackStatus::Playing,
            current_index: 3,
            timeline_len: 10,
            speed: 2.0,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "playing");
        assert_eq!(json["currentIndex"], 3);
        assert_eq!(json["timelineLen"], 10);
    }
}
