//! Data sources: iterators over `(timestamp, topic, data)` entries.
//!
//! A source yields its entries as an async stream spaced by wall-clock
//! delays proportional to the inter-entry time divided by the speed
//! multiplier. Dropping the stream cancels it; there is nothing to await.

use crate::playback::inter_entry_delay;
use crate::recorder::{self, RecordedSession};
use futures_util::stream::BoxStream;
use pitwall_core::{FeedMessage, SessionState, Timeline};
use std::path::Path;

/// Common contract for replayable entry sources.
pub trait DataSource {
    /// Snapshot to seed the accumulator with, when the source has one.
    fn initial_state(&self) -> Option<SessionState>;

    /// First and last entry timestamps.
    fn time_range(&self) -> Option<(String, String)>;

    /// Stream entries from `from` (or the beginning) at the given speed.
    fn stream(&self, from: Option<&str>, speed: f64) -> BoxStream<'static, FeedMessage>;

    /// Release any held resources. Default: nothing to do.
    fn close(&mut self) {}
}

/// Turn a timeline slice into a delay-spaced stream.
fn stream_entries(
    entries: Vec<FeedMessage>,
    speed: f64,
) -> BoxStream<'static, FeedMessage> {
    Box::pin(async_stream::stream! {
        let mut prev_ts: Option<String> = None;
        for entry in entries {
            if let Some(prev) = &prev_ts {
                let delay = inter_entry_delay(prev, &entry.ts, speed);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            prev_ts = Some(entry.ts.clone());
            yield entry;
        }
    })
}

fn entries_from(timeline: &Timeline, from: Option<&str>) -> Vec<FeedMessage> {
    let start = from.map_or(0, |t| timeline.find_index(t));
    timeline.entries()[start..].to_vec()
}

// ---------------------------------------------------------------------------
// RecordedSource
// ---------------------------------------------------------------------------

/// Replays a recording directory.
pub struct RecordedSource {
    session: RecordedSession,
}

impl RecordedSource {
    /// Load a recording directory. Missing files yield an empty timeline /
    /// no initial state rather than an error.
    pub fn open(dir: &Path) -> Self {
        RecordedSource {
            session: recorder::load_recording(dir),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.session.timeline
    }

    pub fn into_session(self) -> RecordedSession {
        self.session
    }
}

impl DataSource for RecordedSource {
    fn initial_state(&self) -> Option<SessionState> {
        self.session.initial_state.clone()
    }

    fn time_range(&self) -> Option<(String, String)> {
        self.session
            .timeline
            .time_range()
            .map(|(a, b)| (a.to_owned(), b.to_owned()))
    }

    fn stream(&self, from: Option<&str>, speed: f64) -> BoxStream<'static, FeedMessage> {
        stream_entries(entries_from(&self.session.timeline, from), speed)
    }
}

// ---------------------------------------------------------------------------
// ArchiveSource
// ---------------------------------------------------------------------------

/// Replays a timeline shaped from the historical REST archive.
///
/// The archive has no initial snapshot — every entry is a diff, so replay
/// starts from defaults.
pub struct ArchiveSource {
    timeline: Timeline,
}

impl ArchiveSource {
    pub fn new(timeline: Timeline) -> Self {
        ArchiveSource { timeline }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}

impl DataSource for ArchiveSource {
    fn initial_state(&self) -> Option<SessionState> {
        None
    }

    fn time_range(&self) -> Option<(String, String)> {
        self.timeline
            .time_range()
            .map(|(a, b)| (a.to_owned(), b.to_owned()))
    }

    fn stream(&self, from: Option<&str>, speed: f64) -> BoxStream<'static, FeedMessage> {
        stream_entries(entries_from(&self.timeline, from), speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn entry(ts: &str) -> FeedMessage {
        FeedMessage {
            ts: ts.to_owned(),
            topic: "TrackStatus".to_owned(),
            data: json!({"Status": "1"}),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stream_spaces_entries_by_scaled_delay() {
        let timeline = Timeline::new(vec![
            entry("2026-05-24T13:00:00.000Z"),
            entry("2026-05-24T13:00:02.000Z"),
        ]);
        let source = ArchiveSource::new(timeline);

        let start = tokio::time::Instant::now();
        let entries: Vec<FeedMessage> = source.stream(None, 2.0).collect().await;
        assert_eq!(entries.len(), 2);
        // 2 s gap at 2x speed: one second of (paused, auto-advanced) time.
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stream_from_skips_earlier_entries() {
        let timeline = Timeline::new(vec![
            entry("2026-05-24T13:00:00Z"),
            entry("2026-05-24T13:00:01Z"),
            entry("2026-05-24T13:00:02Z"),
        ]);
        let source = ArchiveSource::new(timeline);

        let entries: Vec<FeedMessage> = source
            .stream(Some("2026-05-24T13:00:01Z"), 1000.0)
            .collect()
            .await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].ts, "2026-05-24T13:00:01Z");
    }

    #[tokio::test]
    async fn recorded_source_tolerates_missing_directory() {
        let base = tempfile::tempdir().expect("temp dir");
        let source = RecordedSource::open(&base.path().join("nope"));
        assert!(source.initial_state().is_none());
        assert!(source.time_range().is_none());
        let entries: Vec<FeedMessage> = source.stream(None, 1.0).collect().await;
        assert!(entries.is_empty());
    }
}
