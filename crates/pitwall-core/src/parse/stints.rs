//! `TimingAppData` topic decoding (stints).

use crate::state::{Stint, TyreCompound};
use serde_json::Value;

/// Replacement stint entry for one driver.
#[derive(Debug, Clone, PartialEq)]
pub struct StintUpdate {
    pub driver_number: String,
    pub stint: Stint,
}

/// Decode a `TimingAppData` diff.
///
/// For each driver the stint with the highest key wins; its key is the
/// 0-based stint number. The decoded entry replaces the driver's current
/// stint wholesale.
pub fn parse_timing_app_data(data: &Value) -> Vec<StintUpdate> {
    let Some(lines) = data.get("Lines").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut updates = Vec::new();
    for (number, line) in lines {
        let Some(stints) = line.get("Stints") else {
            continue;
        };
        let Some((stint_number, latest)) = super::indexed_entries(stints).into_iter().last()
        else {
            continue;
        };
        if !latest.is_object() {
            continue;
        }
        let compound = super::string_field(latest, "Compound")
            .map_or(TyreCompound::Unknown, |c| TyreCompound::from_upstream(&c));
        updates.push(StintUpdate {
            driver_number: number.clone(),
            stint: Stint {
                stint_number,
                compound,
                tyre_age: super::u32_field(latest, "TotalLaps"),
                is_new: super::bool_field(latest, "New"),
            },
        });
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn highest_keyed_stint_wins() {
        let data = json!({
            "Lines": {
                "1": {
                    "Stints": {
                        "0": {"Compound": "SOFT", "New": "true", "TotalLaps": 14},
                        "1": {"Compound": "HARD", "New": "true", "TotalLaps": 2}
                    }
                }
            }
        });
        let updates = parse_timing_app_data(&data);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].stint.stint_number, 1);
        assert_eq!(updates[0].stint.compound, TyreCompound::Hard);
        assert_eq!(updates[0].stint.tyre_age, Some(2));
        assert_eq!(updates[0].stint.is_new, Some(true));
    }

    #[test]
    fn array_snapshot_uses_positional_numbers() {
        let data = json!({
            "Lines": {
                "4": {"Stints": [{"Compound": "MEDIUM", "TotalLaps": 1}]}
            }
        });
        let updates = parse_timing_app_data(&data);
        assert_eq!(updates[0].stint.stint_number, 0);
        assert_eq!(updates[0].stint.compound, TyreCompound::Medium);
    }

    #[test]
    fn unknown_compound_maps_to_unknown() {
        let data = json!({
            "Lines": {"4": {"Stints": {"2": {"Compound": "SUPERGRIP"}}}}
        });
        let updates = parse_timing_app_data(&data);
        assert_eq!(updates[0].stint.compound, TyreCompound::Unknown);
    }

    #[test]
    fn line_without_stints_is_skipped() {
        let data = json!({"Lines": {"4": {"GridPos": "3"}}});
        assert!(parse_timing_app_data(&data).is_empty());
    }
}
