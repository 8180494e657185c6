//! `TimingData` topic decoding.

use serde_json::Value;

/// Partial update to one driver's timing row.
///
/// Every field is optional: a diff that mentions only `Position` must not
/// disturb gaps, lap times or pit state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingPatch {
    pub driver_number: String,
    pub position: Option<u32>,
    pub gap_to_leader: Option<String>,
    pub interval: Option<String>,
    pub last_lap_time: Option<String>,
    pub best_lap_time: Option<String>,
    pub sector1: Option<String>,
    pub sector2: Option<String>,
    pub sector3: Option<String>,
    pub in_pit: Option<bool>,
    pub retired: Option<bool>,
    pub stopped: Option<bool>,
}

/// Decode a `TimingData` diff (`Lines` keyed by racing number).
pub fn parse_timing_data(data: &Value) -> Vec<TimingPatch> {
    let Some(lines) = data.get("Lines").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut patches = Vec::new();
    for (number, line) in lines {
        if !line.is_object() {
            continue;
        }
        let mut patch = TimingPatch {
            driver_number: number.clone(),
            position: super::u32_field(line, "Position"),
            gap_to_leader: super::string_field(line, "GapToLeader"),
            interval: super::time_field(line, "IntervalToPositionAhead"),
            last_lap_time: super::time_field(line, "LastLapTime"),
            best_lap_time: super::time_field(line, "BestLapTime"),
            in_pit: super::bool_field(line, "InPit"),
            retired: super::bool_field(line, "Retired"),
            stopped: super::bool_field(line, "Stopped"),
            ..TimingPatch::default()
        };
        if let Some(sectors) = line.get("Sectors") {
            for (idx, sector) in super::indexed_entries(sectors) {
                let value = sector_value(sector);
                match idx {
                    0 => patch.sector1 = value,
                    1 => patch.sector2 = value,
                    2 => patch.sector3 = value,
                    _ => {}
                }
            }
        }
        patches.push(patch);
    }
    patches
}

fn sector_value(sector: &Value) -> Option<String> {
    let s = match sector {
        Value::String(s) => s,
        Value::Object(_) => match sector.get("Value") {
            Some(Value::String(s)) => s,
            _ => return None,
        },
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s.clone()) }
}
