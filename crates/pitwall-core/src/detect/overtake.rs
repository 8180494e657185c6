//! Overtake detector.
//!
//! For every driver whose position strictly improved, find the drivers that
//! slipped behind them. Position swaps under safety-car, VSC, VSC-ending and
//! red flags are not overtakes; neither are swaps against cars in the pit
//! lane or retired cars.
//!
//! The passed-car predicate keeps the equality-permitting lower bound
//! (`prev[other] >= curr[driver]`) so that multi-place jumps credit every
//! car actually passed.

use crate::events::Event;
use crate::state::SessionState;

pub fn detect_overtakes(prev: &SessionState, curr: &SessionState) -> Vec<Event> {
    if curr.track_status.flag.suppresses_overtakes() {
        return Vec::new();
    }

    let mut events = Vec::new();
    for (driver, curr_line) in &curr.timing {
        let (Some(curr_pos), Some(prev_pos)) = (
            curr_line.position,
            prev.timing.get(driver).and_then(|l| l.position),
        ) else {
            continue;
        };
        if curr_pos >= prev_pos || curr_line.in_pit {
            continue;
        }

        for (other, other_curr) in &curr.timing {
            if other == driver {
                continue;
            }
            let (Some(other_curr_pos), Some(other_prev)) =
                (other_curr.position, prev.timing.get(other))
            else {
                continue;
            };
            let Some(other_prev_pos) = other_prev.position else {
                continue;
            };
            let passed = other_prev_pos < prev_pos
                && other_curr_pos > curr_pos
                && other_prev_pos >= curr_pos;
            if !passed || other_prev.in_pit || other_curr.in_pit || other_curr.retired {
                continue;
            }

            let overtaking = curr.drivers.get(driver);
            let overtaken = curr.drivers.get(other);
            events.push(Event::Overtake {
                overtaking_driver: driver.clone(),
                overtaken_driver: other.clone(),
                new_position: curr_pos,
                overtaking_abbreviation: overtaking.and_then(|d| d.abbreviation.clone()),
                overtaken_abbreviation: overtaken.and_then(|d| d.abbreviation.clone()),
                overtaking_team_color: overtaking.and_then(|d| d.team_color.clone()),
                overtaken_team_color: overtaken.and_then(|d| d.team_color.clone()),
            });
        }
    }
    events
}
