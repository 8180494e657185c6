//! `TopThree` topic decoding.

use crate::state::TopThreeLine;
use serde_json::Value;

/// Outcome of a `TopThree` diff.
#[derive(Debug, Clone, PartialEq)]
pub enum TopThreeUpdate {
    /// Upstream signalled the projection is withheld; clear it.
    Withheld,
    /// Full replacement list, sorted by position, at most three entries.
    Lines(Vec<TopThreeLine>),
}

pub fn parse_top_three(data: &Value) -> Option<TopThreeUpdate> {
    if data.get("Withheld").and_then(Value::as_bool) == Some(true) {
        return Some(TopThreeUpdate::Withheld);
    }
    let lines_value = data.get("Lines")?;

    let mut lines: Vec<TopThreeLine> = super::indexed_entries(lines_value)
        .into_iter()
        .filter_map(|(idx, line)| {
            let driver_number = super::string_field(line, "RacingNumber")?;
            Some(TopThreeLine {
                position: super::u32_field(line, "Position").unwrap_or(idx + 1),
                driver_number,
                abbreviation: super::string_field(line, "Tla"),
                team_color: super::string_field(line, "TeamColour"),
                lap_time: super::string_field(line, "LapTime"),
                gap_to_leader: super::string_field(line, "DiffToLeader"),
            })
        })
        .collect();
    lines.sort_by_key(|l| l.position);
    lines.truncate(3);
    Some(TopThreeUpdate::Lines(lines))
}
