//! Pit stop detector.
//!
//! A completed pit stop shows up as a stint-number increase. Stint 0 is the
//! starting tyre set, so a driver appearing for the first time only counts
//! when their stint number is already past zero (e.g. joining mid-session
//! after a stop).

use crate::events::Event;
use crate::state::SessionState;

pub fn detect_pit_stops(prev: &SessionState, curr: &SessionState) -> Vec<Event> {
    let mut events = Vec::new();
    for (driver, stint) in &curr.stints {
        let stopped = match prev.stints.get(driver) {
            Some(prior) => stint.stint_number > prior.stint_number,
            None => stint.stint_number > 0,
        };
        if !stopped {
            continue;
        }
        let info = curr.drivers.get(driver);
        events.push(Event::PitStop {
            driver_number: driver.clone(),
            abbreviation: info.and_then(|d| d.abbreviation.clone()),
            team_color: info.and_then(|d| d.team_color.clone()),
            new_compound: stint.compound,
            stint_number: stint.stint_number,
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Stint, TyreCompound};

    fn stint(number: u32, compound: TyreCompound) -> Stint {
        Stint {
            stint_number: number,
            compound,
            tyre_age: None,
            is_new: None,
        }
    }

    #[test]
    fn stint_increment_emits_pit_stop() {
        let mut prev = SessionState::default();
        prev.stints
            .insert("1".to_owned(), stint(0, TyreCompound::Soft));
        let mut curr = SessionState::default();
        curr.stints
            .insert("1".to_owned(), stint(1, TyreCompound::Hard));

        let events = detect_pit_stops(&prev, &curr);
        assert_eq!(
            events,
            vec![Event::PitStop {
                driver_number: "1".to_owned(),
                abbreviation: None,
                team_color: None,
                new_compound: TyreCompound::Hard,
                stint_number: 1,
            }]
        );
    }

    #[test]
    fn initial_stint_is_silent() {
        let prev = SessionState::default();
        let mut curr = SessionState::default();
        curr.stints
            .insert("1".to_owned(), stint(0, TyreCompound::Medium));
        assert!(detect_pit_stops(&prev, &curr).is_empty());
    }

    #[test]
    fn first_sighting_past_stint_zero_counts() {
        let prev = SessionState::default();
        let mut curr = SessionState::default();
        curr.stints
            .insert("1".to_owned(), stint(2, TyreCompound::Soft));
        assert_eq!(detect_pit_stops(&prev, &curr).len(), 1);
    }

    #[test]
    fn same_stint_number_is_silent() {
        let mut prev = SessionState::default();
        prev.stints
            .insert("1".to_owned(), stint(1, TyreCompound::Hard));
        let mut curr = SessionState::default();
        // Tyre age ticking up within a stint is not a pit stop.
        curr.stints.insert(
            "1".to_owned(),
            Stint {
                tyre_age: Some(5),
                ..stint(1, TyreCompound::Hard)
            },
        );
        assert!(detect_pit_stops(&prev, &curr).is_empty());
    }
}
