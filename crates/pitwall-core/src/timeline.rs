//! Immutable, sorted, binary-searchable timeline of feed messages.
//!
//! Timestamps are fixed-width ISO-8601 UTC strings, so lexicographic
//! ordering equals chronological ordering and the binary search needs no
//! date parsing.

use crate::pipeline::FeedMessage;

/// A sorted entry vector. Never mutated after construction; the playback
/// controller reloads a fresh timeline instead.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<FeedMessage>,
}

impl Timeline {
    /// Build a timeline, stable-sorting entries by timestamp.
    pub fn new(mut entries: Vec<FeedMessage>) -> Self {
        entries.sort_by(|a, b| a.ts.cmp(&b.ts));
        Timeline { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&FeedMessage> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FeedMessage] {
        &self.entries
    }

    /// Index of the first entry with `ts >= t`.
    ///
    /// Returns `len()` when `t` is past the end and 0 when it is before the
    /// start (or the timeline is empty).
    pub fn find_index(&self, t: &str) -> usize {
        self.entries.partition_point(|e| e.ts.as_str() < t)
    }

    /// All entries with `a <= ts <= b`, inclusive on both ends.
    pub fn range(&self, a: &str, b: &str) -> &[FeedMessage] {
        let start = self.find_index(a);
        let end = self.entries.partition_point(|e| e.ts.as_str() <= b);
        &self.entries[start..end]
    }

    /// First and last timestamps, when the timeline is non-empty.
    pub fn time_range(&self) -> Option<(&str, &str)> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        Some((&first.ts, &last.ts))
    }
}
