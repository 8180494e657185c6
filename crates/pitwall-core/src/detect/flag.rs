//! Flag transition detector.

use crate::events::Event;
use crate::state::SessionState;

/// Emit one `flag_change` when the flag value differs between snapshots.
/// The message comes from the current snapshot only.
pub fn detect_flag_change(prev: &SessionState, curr: &SessionState) -> Vec<Event> {
    if prev.track_status.flag == curr.track_status.flag {
        return Vec::new();
    }
    vec![Event::FlagChange {
        previous_flag: prev.track_status.flag,
        new_flag: curr.track_status.flag,
        message: curr.track_status.message.clone(),
    }]
}
