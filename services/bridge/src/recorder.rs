//! Session recorder: the on-disk format replay reads back.
//!
//! Each recording is a directory `<base>/<year>-<sessionKey>/` holding
//! `metadata.json` (session identity + start/end timestamps),
//! `subscribe.json` (the serialised initial snapshot) and `live.jsonl`
//! (append-only, one `{"ts","topic","data"}` object per line).
//!
//! A failed `write` drops that one message with a log entry and the
//! recording continues. `stop` flushes, stamps the end timestamp and is
//! idempotent.

use chrono::Utc;
use pitwall_core::{FeedMessage, SessionState, Timeline};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub session_key: String,
    pub year: i32,
    pub session_name: String,
    pub session_type: String,
    pub circuit: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl RecordingMetadata {
    /// Directory name for this recording: `<year>-<sessionKey>`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.year, self.session_key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SessionRecorder
// ---------------------------------------------------------------------------

struct ActiveRecording {
    dir: PathBuf,
    metadata: RecordingMetadata,
    writer: BufWriter<File>,
}

/// Append-only recorder for one session at a time. Owned by the
/// single-writer pipeline task.
pub struct SessionRecorder {
    base_dir: PathBuf,
    active: Option<ActiveRecording>,
}

impl SessionRecorder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        SessionRecorder {
            base_dir: base_dir.into(),
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Begin a recording: create the directory, persist metadata and the
    /// initial snapshot, open the live log.
    ///
    /// A recording already in progress is stopped first.
    pub fn start(
        &mut self,
        metadata: RecordingMetadata,
        initial_state: &SessionState,
    ) -> Result<(), RecorderError> {
        self.stop();

        let dir = self.base_dir.join(metadata.dir_name());
        std::fs::create_dir_all(&dir)?;

        let metadata_json = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(dir.join("metadata.json"), metadata_json)?;

        let state_json = serde_json::to_string(initial_state)?;
        std::fs::write(dir.join("subscribe.json"), state_json)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("live.jsonl"))?;
        info!(dir = %dir.display(), "recording started");
        self.active = Some(ActiveRecording {
            dir,
            metadata,
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    /// Append one message to the live log.
    ///
    /// Failures drop the message and keep recording.
    pub fn write(&mut self, msg: &FeedMessage) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let result = serde_json::to_string(msg)
            .map_err(RecorderError::from)
            .and_then(|line| {
                active.writer.write_all(line.as_bytes())?;
                active.writer.write_all(b"\n")?;
                Ok(())
            });
        if let Err(e) = result {
            warn!(error = %e, "dropping recorded message");
        }
    }

    /// Flush and close the active recording, stamping its end time.
    /// Safe to call when nothing is recording.
    pub fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if let Err(e) = active.writer.flush() {
            warn!(error = %e, "flushing recording");
        }
        active.metadata.end_time = Some(Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
        match serde_json::to_string_pretty(&active.metadata) {
            Ok(json) => {
                if let Err(e) = std::fs::write(active.dir.join("metadata.json"), json) {
                    warn!(error = %e, "stamping recording end time");
                }
            }
            Err(e) => warn!(error = %e, "serializing recording metadata"),
        }
        info!(dir = %active.dir.display(), "recording stopped");
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Listing and loading
// ---------------------------------------------------------------------------

/// A recording found on disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    /// Directory name, used as the recording id in the control API.
    pub id: String,
    pub metadata: RecordingMetadata,
}

/// A fully loaded recording ready for playback.
#[derive(Debug)]
pub struct RecordedSession {
    pub metadata: Option<RecordingMetadata>,
    pub initial_state: Option<SessionState>,
    pub timeline: Timeline,
}

/// Scan immediate subdirectories of `base_dir` containing `metadata.json`.
pub fn list_recordings(base_dir: &Path) -> Vec<RecordingSummary> {
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return Vec::new();
    };
    let mut recordings: Vec<RecordingSummary> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let metadata_path = e.path().join("metadata.json");
            let json = std::fs::read_to_string(metadata_path).ok()?;
            let metadata: RecordingMetadata = serde_json::from_str(&json).ok()?;
            Some(RecordingSummary {
                id: e.file_name().to_string_lossy().into_owned(),
                metadata,
            })
        })
        .collect();
    recordings.sort_by(|a, b| a.id.cmp(&b.id));
    recordings
}

/// Load one recording directory. Missing files are tolerated: no
/// `subscribe.json` means no initial state, no `live.jsonl` means an empty
/// timeline. Unparseable log lines are skipped with a warning.
pub fn load_recording(dir: &Path) -> RecordedSession {
    let metadata = std::fs::read_to_string(dir.join("metadata.json"))
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok());
    let initial_state = std::fs::read_to_string(dir.join("subscribe.json"))
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok());

    let mut entries = Vec::new();
    if let Ok(log) = std::fs::read_to_string(dir.join("live.jsonl")) {
        for line in log.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedMessage>(line) {
                Ok(msg) => entries.push(msg),
                Err(e) => warn!(error = %e, "skipping unparseable log line"),
            }
        }
    }

    RecordedSession {
        metadata,
        initial_state,
        timeline: Timeline::new(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

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

    fn msg(ts: &str) -> FeedMessage {
        FeedMessage {
            ts: ts.to_owned(),
            topic: "TrackStatus".to_owned(),
            data: json!({"Status": "1"}),
        }
    }

    #[test]
    fn start_write_stop_produces_all_three_files() {
        let base = tempfile::tempdir().expect("temp dir");
        let mut recorder = SessionRecorder::new(base.path());

        recorder
            .start(metadata(), &SessionState::default())
            .expect("start");
        recorder.write(&msg("2026-05-24T13:00:00Z"));
        recorder.write(&msg("2026-05-24T13:00:01Z"));
        recorder.stop();

        let dir = base.path().join("2026-monaco-race");
        assert!(dir.join("metadata.json").is_file());
        assert!(dir.join("subscribe.json").is_file());
        let log = std::fs::read_to_string(dir.join("live.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn stop_stamps_end_time_and_is_idempotent() {
        let base = tempfile::tempdir().expect("temp dir");
        let mut recorder = SessionRecorder::new(base.path());
        recorder
            .start(metadata(), &SessionState::default())
            .expect("start");
        recorder.stop();
        recorder.stop();

        let json =
            std::fs::read_to_string(base.path().join("2026-monaco-race/metadata.json")).unwrap();
        let loaded: RecordingMetadata = serde_json::from_str(&json).unwrap();
        assert!(loaded.end_time.is_some());
    }

    #[test]
    fn write_without_active_recording_is_a_no_op() {
        let base = tempfile::tempdir().expect("temp dir");
        let mut recorder = SessionRecorder::new(base.path());
        recorder.write(&msg("2026-05-24T13:00:00Z"));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn listing_skips_directories_without_metadata() {
        let base = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(base.path().join("not-a-recording")).unwrap();

        let mut recorder = SessionRecorder::new(base.path());
        recorder
            .start(metadata(), &SessionState::default())
            .expect("start");
        recorder.stop();

        let listed = list_recordings(base.path());
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "2026-monaco-race");
    }

    #[test]
    fn load_tolerates_missing_files() {
        let base = tempfile::tempdir().expect("temp dir");
        let dir = base.path().join("2026-empty");
        std::fs::create_dir_all(&dir).unwrap();

        let session = load_recording(&dir);
        assert!(session.metadata.is_none());
        assert!(session.initial_state.is_none());
        assert!(session.timeline.is_empty());
    }

    #[test]
    fn recorded_messages_round_trip() {
        let base = tempfile::tempdir().expect("temp dir");
        let mut recorder = SessionRecorder::new(base.path());
        recorder
            .start(metadata(), &SessionState::default())
            .expect("start");
        let original = msg("2026-05-24T13:00:00Z");
        recorder.write(&original);
        recorder.stop();

        let session = load_recording(&base.path().join("2026-monaco-race"));
        assert_eq!(session.timeline.len(), 1);
        assert_eq!(session.timeline.at(0), Some(&original));
    }
}
