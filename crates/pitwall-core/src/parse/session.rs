//! `SessionInfo` and `LapCount` topic decoding.

use crate::state::{LapCount, SessionInfo, SessionType};
use serde_json::Value;

/// Decode a `SessionInfo` payload. Replace semantics: the whole record is
/// rebuilt from the diff.
pub fn parse_session_info(data: &Value) -> Option<SessionInfo> {
    if !data.is_object() {
        return None;
    }
    let session_type = super::string_field(data, "Type")
        .map_or(SessionType::Practice, |t| SessionType::from_upstream(&t));
    let meeting = data.get("Meeting");
    let circuit = meeting
        .and_then(|m| m.get("Circuit"))
        .and_then(|c| super::string_field(c, "ShortName"))
        .unwrap_or_default();
    let country = meeting
        .and_then(|m| m.get("Country"))
        .and_then(|c| super::string_field(c, "Name"))
        .unwrap_or_default();
    Some(SessionInfo {
        name: super::string_field(data, "Name").unwrap_or_default(),
        session_type,
        circuit,
        country,
        start_time: super::string_field(data, "StartDate"),
        end_time: super::string_field(data, "EndDate"),
    })
}

/// Decode a `LapCount` payload. Replace semantics, missing side defaults
/// to 0.
pub fn parse_lap_count(data: &Value) -> Option<LapCount> {
    if !data.is_object() {
        return None;
    }
    Some(LapCount {
        current: super::u32_field(data, "CurrentLap").unwrap_or(0),
        total: super::u32_field(data, "TotalLaps").unwrap_or(0),
    })
}
