//! Event detectors: pure comparisons of two snapshots.
//!
//! Every detector is a pure function of `(prev, curr)` — no I/O, no
//! randomness, no retained state — so the same pair always yields the same
//! event sequence. The aggregator runs them in fixed order: flag, overtake,
//! pit, weather.

mod flag;
mod overtake;
mod pit;
mod weather;

pub use flag::detect_flag_change;
pub use overtake::detect_overtakes;
pub use pit::detect_pit_stops;
pub use weather::detect_weather_change;

use crate::events::Event;
use crate::state::SessionState;

/// Run all detectors and concatenate their events.
pub fn detect(prev: &SessionState, curr: &SessionState) -> Vec<Event> {
    let mut events = Vec::new();
    events.extend(detect_flag_change(prev, curr));
    events.extend(detect_overtakes(prev, curr));
    events.extend(detect_pit_stops(prev, curr));
    events.extend(detect_weather_change(prev, curr));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Flag, Stint, TyreCompound};

    #[test]
    fn detectors_are_deterministic_across_invocations() {
        let prev = SessionState::default();
        let mut curr = SessionState::default();
        curr.track_status.flag = Flag::Yellow;
        curr.stints.insert(
            "1".to_owned(),
            Stint {
                stint_number: 1,
                compound: TyreCompound::Hard,
                tyre_age: None,
                is_new: None,
            },
        );

        let first = detect(&prev, &curr);
        let second = detect(&prev, &curr);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn aggregator_orders_flag_before_pit() {
        let prev = SessionState::default();
        let mut curr = SessionState::default();
        curr.track_status.flag = Flag::Red;
        curr.stints.insert(
            "1".to_owned(),
            Stint {
                stint_number: 2,
                compound: TyreCompound::Soft,
                tyre_age: None,
                is_new: None,
            },
        );

        let events = detect(&prev, &curr);
        assert!(matches!(events[0], Event::FlagChange { .. }));
        assert!(matches!(events[1], Event::PitStop { .. }));
    }
}
