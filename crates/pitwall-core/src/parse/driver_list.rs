//! `DriverList` topic decoding.

use serde_json::Value;

/// Partial update to one driver's identity record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverPatch {
    pub driver_number: String,
    pub abbreviation: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub team_name: Option<String>,
    pub team_color: Option<String>,
    pub country_code: Option<String>,
}

/// Decode a `DriverList` diff into per-driver patches.
///
/// Entries lacking both a racing number and an abbreviation are skipped
/// (the feed interleaves bookkeeping keys such as `_kf` with driver rows).
pub fn parse_driver_list(data: &Value) -> Vec<DriverPatch> {
    let Some(map) = data.as_object() else {
        return Vec::new();
    };

    let mut patches = Vec::new();
    for (key, entry) in map {
        if !entry.is_object() {
            continue;
        }
        let racing_number =
            super::string_field(entry, "RacingNumber").or_else(|| numeric_key(key));
        let abbreviation = super::string_field(entry, "Tla");
        if racing_number.is_none() && abbreviation.is_none() {
            continue;
        }
        patches.push(DriverPatch {
            driver_number: racing_number.unwrap_or_else(|| key.clone()),
            abbreviation,
            first_name: super::string_field(entry, "FirstName"),
            last_name: super::string_field(entry, "LastName"),
            team_name: super::string_field(entry, "TeamName"),
            team_color: super::string_field(entry, "TeamColour"),
            country_code: super::string_field(entry, "CountryCode"),
        });
    }
    patches
}

fn numeric_key(key: &str) -> Option<String> {
    key.parse::<u32>().ok().map(|_| key.to_owned())
}
