//! Record → replay equivalence.
//!
//! A recorded session, replayed through the playback controller, must emit
//! the same event multiset as the live run and converge on a structurally
//! equal final snapshot.

use bridge::playback::{PlaybackController, PlaybackEvent};
use bridge::recorder::{self, RecordingMetadata, SessionRecorder};
use pitwall_core::{Event, FeedMessage, Pipeline, TyreCompound};
use serde_json::json;

fn msg(ts: &str, topic: &str, data: serde_json::Value) -> FeedMessage {
    FeedMessage {
        ts: ts.to_owned(),
        topic: topic.to_owned(),
        data,
    }
}

fn metadata() -> RecordingMetadata {
    RecordingMetadata {
        session_key: "monaco-race".to_owned(),
        year: 2026,
        session_name: "Race".to_owned(),
        session_type: "Race".to_owned(),
        circuit: "Monaco".to_owned(),
        start_time: "2026-05-24T13:00:00Z".to_owned(),
        end_time: None,
    }
}

/// Setup applied before recording starts; baked into `subscribe.json`.
fn setup_messages() -> Vec<FeedMessage> {
    vec![
        msg(
            "2026-05-24T12:59:00Z",
            "DriverList",
            json!({
                "1": {"RacingNumber": "1", "Tla": "VER", "TeamName": "Red Bull Racing",
                      "TeamColour": "3671C6"},
                "4": {"RacingNumber": "4", "Tla": "NOR", "TeamName": "McLaren",
                      "TeamColour": "FF8000"}
            }),
        ),
        msg(
            "2026-05-24T12:59:30Z",
            "TimingData",
            json!({"Lines": {
                "1": {"Position": "1", "InPit": false},
                "4": {"Position": "2", "InPit": false}
            }}),
        ),
    ]
}

/// A 13-message race fragment: flags, laps, an overtake, a pit stop, rain.
fn race_fragment() -> Vec<FeedMessage> {
    vec![
        msg("2026-05-24T13:00:00Z", "TrackStatus", json!({"Status": "1"})),
        msg("2026-05-24T13:00:01Z", "LapCount", json!({"CurrentLap": 1, "TotalLaps": 57})),
        msg(
            "2026-05-24T13:00:02Z",
            "TimingAppData",
            json!({"Lines": {"1": {"Stints": {"0": {"Compound": "SOFT", "New": "true"}}}}}),
        ),
        msg(
            "2026-05-24T13:00:03Z",
            "WeatherData",
            json!({"AirTemp": "25.0", "Rainfall": "0"}),
        ),
        msg(
            "2026-05-24T13:00:04Z",
            "TimingData",
            json!({"Lines": {"4": {"Position": "1"}, "1": {"Position": "2"}}}),
        ),
        msg("2026-05-24T13:00:05Z", "TrackStatus", json!({"Status": "2", "Message": "YELLOW"})),
        msg("2026-05-24T13:00:06Z", "TrackStatus", json!({"Status": "1"})),
        msg("2026-05-24T13:00:07Z", "LapCount", json!({"CurrentLap": 2, "TotalLaps": 57})),
        msg(
            "2026-05-24T13:00:08Z",
            "TimingAppData",
            json!({"Lines": {"1": {"Stints": {"1": {"Compound": "HARD", "New": "true"}}}}}),
        ),
        msg("2026-05-24T13:00:09Z", "WeatherData", json!({"Rainfall": "1"})),
        msg(
            "2026-05-24T13:00:10Z",
            "TimingData",
            json!({"Lines": {"1": {"GapToLeader": "+3.100"}}}),
        ),
        msg("2026-05-24T13:00:11Z", "LapCount", json!({"CurrentLap": 3, "TotalLaps": 57})),
        msg("2026-05-24T13:00:12Z", "Heartbeat", json!({"Utc": "2026-05-24T13:00:12Z"})),
    ]
}

/// Sorted JSON encodings make multiset comparison order-insensitive.
fn multiset(events: &[Event]) -> Vec<String> {
    let mut encoded: Vec<String> = events
        .iter()
        .map(|e| serde_json::to_string(e).expect("serialize event"))
        .collect();
    encoded.sort();
    encoded
}

#[tokio::test(start_paused = true)]
async fn replay_reproduces_live_events_and_final_snapshot() {
    let base = tempfile::tempdir().expect("temp dir");

    // Live run: seed, record, process.
    let mut live = Pipeline::new();
    for setup in setup_messages() {
        live.process(&setup);
    }

    let mut recorder = SessionRecorder::new(base.path());
    recorder
        .start(metadata(), live.state())
        .expect("start recording");

    let mut live_events: Vec<Event> = Vec::new();
    for message in race_fragment() {
        recorder.write(&message);
        live_events.extend(live.process(&message).events);
    }
    recorder.stop();
    let live_final = live.state().clone();

    // Sanity: the fragment produced at least one of each event kind.
    assert!(live_events.iter().any(|e| matches!(e, Event::FlagChange { .. })));
    assert!(live_events.iter().any(|e| matches!(e, Event::Overtake { .. })));
    assert!(live_events.iter().any(|e| matches!(e, Event::PitStop { .. })));
    assert!(live_events.iter().any(|e| matches!(e, Event::WeatherChange { .. })));

    // Replay through the playback controller.
    let session = recorder::load_recording(&base.path().join("2026-monaco-race"));
    assert_eq!(session.timeline.len(), 13);

    let controller = PlaybackController::new();
    let mut rx = controller.subscribe();
    controller
        .load(session.timeline, session.initial_state)
        .await;
    controller.play().await;

    let mut replay_events: Vec<Event> = Vec::new();
    let mut replay_final = None;
    loop {
        match rx.recv().await.expect("playback event") {
            PlaybackEvent::Event { event } => replay_events.push(event),
            PlaybackEvent::Update { snapshot, .. } => replay_final = Some(snapshot),
            PlaybackEvent::Finished => break,
            _ => {}
        }
    }

    assert_eq!(multiset(&replay_events), multiset(&live_events));

    let replay_final = replay_final.expect("at least one update");
    assert_eq!(replay_final, live_final);
    assert_eq!(replay_final.timing["1"].position, Some(2));
    assert_eq!(replay_final.stints["1"].compound, TyreCompound::Hard);
    assert!(replay_final.weather.as_ref().expect("weather").rainfall);
}

#[tokio::test(start_paused = true)]
async fn replay_without_initial_state_starts_from_defaults() {
    let base = tempfile::tempdir().expect("temp dir");
    let dir = base.path().join("2026-bare");
    std::fs::create_dir_all(&dir).expect("create dir");
    let line = serde_json::to_string(&msg(
        "2026-05-24T13:00:00Z",
        "TrackStatus",
        json!({"Status": "4"}),
    ))
    .expect("serialize");
    std::fs::write(dir.join("live.jsonl"), format!("{}\n", line)).expect("write log");

    let session = recorder::load_recording(&dir);
    assert!(session.initial_state.is_none());

    let controller = PlaybackController::new();
    let mut rx = controller.subscribe();
    controller.load(session.timeline, session.initial_state).await;
    controller.play().await;

    let mut events = Vec::new();
    loop {
        match rx.recv().await.expect("playback event") {
            PlaybackEvent::Event { event } => events.push(event),
            PlaybackEvent::Finished => break,
            _ => {}
        }
    }
    // Defaults start green, so the safety car diff emits one transition.
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::FlagChange { .. }));
}
