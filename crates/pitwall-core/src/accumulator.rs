//! State accumulator: folds raw topic diffs into the session snapshot.
//!
//! `apply` never fails. Unknown topics and malformed payloads update only
//! the snapshot timestamp; recognised topics merge exactly what the diff
//! carries, preserving every field the diff does not mention.

use crate::parse;
use crate::parse::top_three::TopThreeUpdate;
use crate::state::{DriverInfo, SessionState, TimingLine, Weather};
use crate::team_colors;
use serde_json::Value;

/// Owns the canonical session snapshot and applies per-topic merge rules.
///
/// Exactly one driver (pipeline or playback controller) applies diffs to an
/// accumulator at a time; readers take copies via [`snapshot`].
///
/// [`snapshot`]: StateAccumulator::snapshot
#[derive(Debug, Default)]
pub struct StateAccumulator {
    state: SessionState,
}

impl StateAccumulator {
    pub fn new() -> Self {
        StateAccumulator {
            state: SessionState::default(),
        }
    }

    /// Start from an existing snapshot (playback seeds a deep copy of the
    /// recorded initial state).
    pub fn with_state(state: SessionState) -> Self {
        StateAccumulator { state }
    }

    /// Read-only view of the current snapshot.
    pub fn get(&self) -> &SessionState {
        &self.state
    }

    /// Deep, fully independent copy of the current snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    /// Re-initialise to defaults.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
    }

    /// Merge one topic diff into the snapshot.
    ///
    /// Unknown topics are a no-op apart from the timestamp update.
    pub fn apply(&mut self, topic: &str, data: &Value, timestamp: Option<&str>) {
        match topic {
            "TrackStatus" => {
                if let Some(status) = parse::track_status::parse_track_status(data) {
                    self.state.track_status = status;
                }
            }
            "DriverList" => self.apply_driver_list(data),
            "TimingData" => self.apply_timing_data(data),
            "TimingAppData" => {
                for update in parse::stints::parse_timing_app_data(data) {
                    self.state.stints.insert(update.driver_number, update.stint);
                }
            }
            "SessionInfo" => {
                if let Some(info) = parse::session::parse_session_info(data) {
                    self.state.session_info = Some(info);
                }
            }
            "LapCount" => {
                if let Some(lap_count) = parse::session::parse_lap_count(data) {
                    self.state.lap_count = lap_count;
                }
            }
            "WeatherData" => self.apply_weather(data),
            "PitLaneTimeCollection" => {
                for (number, entry) in parse::race_control::parse_pit_lane_times(data) {
                    self.state.pit_lane_times.insert(number, entry);
                }
            }
            "TopThree" => match parse::top_three::parse_top_three(data) {
                Some(TopThreeUpdate::Withheld) => self.state.top_three.clear(),
                Some(TopThreeUpdate::Lines(lines)) => self.state.top_three = lines,
                None => {}
            },
            "RaceControlMessages" => {
                if let Some(msg) = parse::race_control::parse_race_control(data) {
                    self.state.latest_race_control_message = Some(msg);
                }
            }
            _ => {
                tracing::trace!(topic, "no merge rule for topic");
            }
        }
        if let Some(ts) = timestamp {
            self.state.timestamp = Some(ts.to_owned());
        }
    }

    fn apply_driver_list(&mut self, data: &Value) {
        for patch in parse::driver_list::parse_driver_list(data) {
            let entry = self
                .state
                .drivers
                .entry(patch.driver_number.clone())
                .or_insert_with(|| DriverInfo {
                    driver_number: patch.driver_number.clone(),
                    ..DriverInfo::default()
                });
            merge_opt(&mut entry.abbreviation, patch.abbreviation);
            merge_opt(&mut entry.first_name, patch.first_name);
            merge_opt(&mut entry.last_name, patch.last_name);
            merge_opt(&mut entry.team_name, patch.team_name);
            merge_opt(&mut entry.team_color, patch.team_color);
            merge_opt(&mut entry.country_code, patch.country_code);
            if entry.team_color.is_none() {
                if let Some(team) = &entry.team_name {
                    entry.team_color =
                        team_colors::color_for_team(team).map(ToOwned::to_owned);
                }
            }
        }
    }

    fn apply_timing_data(&mut self, data: &Value) {
        for patch in parse::timing::parse_timing_data(data) {
            let line = self
                .state
                .timing
                .entry(patch.driver_number)
                .or_insert_with(TimingLine::default);
            merge_opt(&mut line.position, patch.position);
            merge_opt(&mut line.gap_to_leader, patch.gap_to_leader);
            merge_opt(&mut line.interval, patch.interval);
            merge_opt(&mut line.last_lap_time, patch.last_lap_time);
            merge_opt(&mut line.best_lap_time, patch.best_lap_time);
            merge_opt(&mut line.sector1, patch.sector1);
            merge_opt(&mut line.sector2, patch.sector2);
            merge_opt(&mut line.sector3, patch.sector3);
            if let Some(in_pit) = patch.in_pit {
                line.in_pit = in_pit;
            }
            if let Some(retired) = patch.retired {
                line.retired = retired;
            }
            if let Some(stopped) = patch.stopped {
                line.stopped = stopped;
            }
        }
    }

    fn apply_weather(&mut self, data: &Value) {
        let Some(patch) = parse::weather::parse_weather(data) else {
            return;
        };
        let weather = self.state.weather.get_or_insert_with(Weather::default);
        merge_opt(&mut weather.air_temp, patch.air_temp);
        merge_opt(&mut weather.track_temp, patch.track_temp);
        merge_opt(&mut weather.humidity, patch.humidity);
        merge_opt(&mut weather.wind_speed, patch.wind_speed);
        merge_opt(&mut weather.wind_direction, patch.wind_direction);
        merge_opt(&mut weather.pressure, patch.pressure);
        if let Some(rainfall) = patch.rainfall {
            weather.rainfall = rainfall;
        }
    }
}

/// Overwrite `target` only when the patch carries a value.
fn merge_opt<T>(target: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *target = patch;
    }
}
