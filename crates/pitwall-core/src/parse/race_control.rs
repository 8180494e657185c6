//! `RaceControlMessages` and `PitLaneTimeCollection` topic decoding.

use crate::state::{PitLaneTime, RaceControlMessage, RaceControlScope};
use serde_json::Value;

/// Decode a `RaceControlMessages` diff.
///
/// The highest-keyed entry wins; it is only returned when it carries a
/// message, so empty diffs preserve the prior value.
pub fn parse_race_control(data: &Value) -> Option<RaceControlMessage> {
    let messages = data.get("Messages")?;
    let (_, latest) = super::indexed_entries(messages).into_iter().last()?;
    let message = super::string_field(latest, "Message")?;
    Some(RaceControlMessage {
        utc: super::string_field(latest, "Utc").unwrap_or_default(),
        message,
        category: super::string_field(latest, "Category"),
        flag: super::string_field(latest, "Flag"),
        scope: super::string_field(latest, "Scope").and_then(|s| parse_scope(&s)),
        sector: super::u32_field(latest, "Sector"),
        racing_number: super::string_field(latest, "RacingNumber"),
    })
}

fn parse_scope(s: &str) -> Option<RaceControlScope> {
    match s {
        "Track" => Some(RaceControlScope::Track),
        "Sector" => Some(RaceControlScope::Sector),
        "Driver" => Some(RaceControlScope::Driver),
        _ => None,
    }
}

/// Decode a `PitLaneTimeCollection` diff. Entries lacking a duration are
/// skipped.
pub fn parse_pit_lane_times(data: &Value) -> Vec<(String, PitLaneTime)> {
    let Some(times) = data.get("PitTimes").and_then(Value::as_object) else {
        return Vec::new();
    };
    times
        .iter()
        .filter_map(|(number, entry)| {
            let duration = super::string_field(entry, "Duration")?;
            Some((
                number.clone(),
                PitLaneTime {
                    duration,
                    lap: super::u32_field(entry, "Lap"),
                },
            ))
        })
        .collect()
}
