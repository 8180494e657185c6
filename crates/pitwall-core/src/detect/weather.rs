//! Weather change detector.

use crate::events::Event;
use crate::state::SessionState;

/// Emit `weather_change` when the rainfall boolean flips. A missing prior
/// weather record counts as dry.
pub fn detect_weather_change(prev: &SessionState, curr: &SessionState) -> Vec<Event> {
    let Some(weather) = &curr.weather else {
        return Vec::new();
    };
    let previous_rainfall = prev.weather.as_ref().is_some_and(|w| w.rainfall);
    if weather.rainfall == previous_rainfall {
        return Vec::new();
    }
    vec![Event::WeatherChange {
        previous_rainfall,
        new_rainfall: weather.rainfall,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Weather;

    fn wet(rainfall: bool) -> Option<Weather> {
        Some(Weather {
            rainfall,
            ..Weather::default()
        })
    }

    #[test]
    fn rain_starting_emits() {
        let mut prev = SessionState::default();
        prev.weather = wet(false);
        let mut curr = SessionState::default();
        curr.weather = wet(true);

        assert_eq!(
            detect_weather_change(&prev, &curr),
            vec![Event::WeatherChange {
                previous_rainfall: false,
                new_rainfall: true,
            }]
        );
    }

    #[test]
    fn missing_prior_weather_counts_as_dry() {
        let prev = SessionState::default();
        let mut curr = SessionState::default();
        curr.weather = wet(true);
        assert_eq!(detect_weather_change(&prev, &curr).len(), 1);
    }

    #[test]
    fn silent_when_current_weather_missing() {
        let mut prev = SessionState::default();
        prev.weather = wet(true);
        let curr = SessionState::default();
        assert!(detect_weather_change(&prev, &curr).is_empty());
    }

    #[test]
    fn silent_when_rainfall_unchanged() {
        let mut prev = SessionState::default();
        prev.weather = wet(true);
        let mut curr = SessionState::default();
        curr.weather = wet(true);
        assert!(detect_weather_change(&prev, &curr).is_empty());
    }
}
