//! Season team-colour lookup.
//!
//! Fallback for `DriverList` diffs that carry a team name but no colour.
//! Colours are six-digit hex without a leading `#`.

/// Look up the hex colour for a team name.
///
/// Matching is case-insensitive on a normalised prefix, so "Red Bull
/// Racing" and "Oracle Red Bull Racing" resolve to the same colour.
pub fn color_for_team(team_name: &str) -> Option<&'static str> {
    let name = team_name.to_ascii_lowercase();
    let color = if name.contains("red bull") && !name.contains("racing bulls") {
        "3671C6"
    } else if name.contains("ferrari") {
        "E8002D"
    } else if name.contains("mercedes") {
        "27F4D2"
    } else if name.contains("mclaren") {
        "FF8000"
    } else if name.contains("aston martin") {
        "229971"
    } else if name.contains("alpine") {
        "0093CC"
    } else if name.contains("williams") {
        "64C4FF"
    } else if name.contains("racing bulls") || name.contains("alphatauri") {
        "6692FF"
    } else if name.contains("sauber") || name.contains("alfa romeo") {
        "52E252"
    } else if name.contains("haas") {
        "B6BABD"
    } else {
        return None;
    };
    Some(color)
}
