//! Canonical session snapshot types.
//!
//! `SessionState` is an owned value: `Clone` produces a fully independent
//! deep copy, which is what the pipeline hands to detectors and observers.
//! All driver-keyed maps are `BTreeMap<String, _>` keyed by the string form
//! of the racing number, so iteration order (and therefore detector emission
//! order) is deterministic.
//!
//! JSON field names are camelCase — this is the shape persisted in
//! `subscribe.json` and published on the bus.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

/// Global track safety status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Green,
    Yellow,
    #[serde(rename = "sc")]
    SafetyCar,
    #[serde(rename = "vsc")]
    VirtualSafetyCar,
    VscEnding,
    Red,
    Chequered,
}

impl Flag {
    /// Decode an upstream `TrackStatus.Status` code.
    ///
    /// Returns `None` for unrecognised codes — the accumulator leaves the
    /// track status untouched in that case.
    pub fn from_status_code(code: &str) -> Option<Flag> {
        match code {
            "1" => Some(Flag::Green),
            "2" => Some(Flag::Yellow),
            "4" => Some(Flag::SafetyCar),
            "5" => Some(Flag::Red),
            "6" => Some(Flag::VirtualSafetyCar),
            "7" => Some(Flag::VscEnding),
            _ => None,
        }
    }

    /// Whether overtake detection is suppressed under this flag.
    pub fn suppresses_overtakes(self) -> bool {
        matches!(
            self,
            Flag::SafetyCar | Flag::VirtualSafetyCar | Flag::VscEnding | Flag::Red
        )
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Flag::Green => "green",
            Flag::Yellow => "yellow",
            Flag::SafetyCar => "sc",
            Flag::VirtualSafetyCar => "vsc",
            Flag::VscEnding => "vsc_ending",
            Flag::Red => "red",
            Flag::Chequered => "chequered",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// SessionType
// ---------------------------------------------------------------------------

/// Kind of session described by `SessionInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Race,
    Qualifying,
    Practice,
    Sprint,
    SprintQualifying,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionType::Race => "Race",
            SessionType::Qualifying => "Qualifying",
            SessionType::Practice => "Practice",
            SessionType::Sprint => "Sprint",
            SessionType::SprintQualifying => "SprintQualifying",
        };
        write!(f, "{}", s)
    }
}

impl SessionType {
    /// Map an upstream session-type string.
    ///
    /// "Sprint Shootout" is the feed's historical name for sprint
    /// qualifying. Unknown values fall back to `Practice`.
    pub fn from_upstream(s: &str) -> SessionType {
        match s {
            "Race" => SessionType::Race,
            "Qualifying" => SessionType::Qualifying,
            "Sprint" => SessionType::Sprint,
            "Sprint Shootout" | "Sprint Qualifying" => SessionType::SprintQualifying,
            _ => SessionType::Practice,
        }
    }
}

// ---------------------------------------------------------------------------
// TyreCompound
// ---------------------------------------------------------------------------

/// Tyre compound of a stint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TyreCompound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    Unknown,
}

impl TyreCompound {
    pub fn from_upstream(s: &str) -> TyreCompound {
        match s.to_ascii_uppercase().as_str() {
            "SOFT" => TyreCompound::Soft,
            "MEDIUM" => TyreCompound::Medium,
            "HARD" => TyreCompound::Hard,
            "INTERMEDIATE" => TyreCompound::Intermediate,
            "WET" => TyreCompound::Wet,
            _ => TyreCompound::Unknown,
        }
    }
}

impl fmt::Display for TyreCompound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TyreCompound::Soft => "SOFT",
            TyreCompound::Medium => "MEDIUM",
            TyreCompound::Hard => "HARD",
            TyreCompound::Intermediate => "INTERMEDIATE",
            TyreCompound::Wet => "WET",
            TyreCompound::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Snapshot records
// ---------------------------------------------------------------------------

/// Session identity, set once per session by the `SessionInfo` topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub circuit: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        SessionInfo {
            name: String::new(),
            session_type: SessionType::Practice,
            circuit: String::new(),
            country: String::new(),
            start_time: None,
            end_time: None,
        }
    }
}

/// Current track status. Defaults to green with no message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackStatus {
    pub flag: Flag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for TrackStatus {
    fn default() -> Self {
        TrackStatus {
            flag: Flag::Green,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LapCount {
    pub current: u32,
    pub total: u32,
}

/// Weather conditions. Individual readings are optional so that a partial
/// update is distinguishable from a reading of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Weather {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    pub rainfall: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

/// Static driver identity. Identity = racing number (the map key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverInfo {
    pub driver_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    /// Six-digit hex colour, no leading `#`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// Live timing row for one driver. Partial updates never clear fields that
/// the diff does not mention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_to_leader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_lap_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_lap_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector3: Option<String>,
    pub in_pit: bool,
    pub retired: bool,
    pub stopped: bool,
}

/// Current stint for one driver. `stint_number` is 0-based; stint 0 is the
/// starting tyre set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stint {
    pub stint_number: u32,
    pub compound: TyreCompound,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tyre_age: Option<u32>,
    #[serde(rename = "new", skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
}

impl Default for Stint {
    fn default() -> Self {
        Stint {
            stint_number: 0,
            compound: TyreCompound::Unknown,
            tyre_age: None,
            is_new: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PitLaneTime {
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lap: Option<u32>,
}

/// One row of the podium projection. At most three, sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopThreeLine {
    pub position: u32,
    pub driver_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lap_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_to_leader: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceControlScope {
    Track,
    Sector,
    Driver,
}

/// Most recent race-control message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RaceControlMessage {
    pub utc: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<RaceControlScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub racing_number: Option<String>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The entire observable session at a point in time.
///
/// Cloning yields a fully independent snapshot — mutating the original
/// never affects a copy that was taken earlier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_info: Option<SessionInfo>,
    pub track_status: TrackStatus,
    pub lap_count: LapCount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    pub drivers: BTreeMap<String, DriverInfo>,
    pub timing: BTreeMap<String, TimingLine>,
    pub stints: BTreeMap<String, Stint>,
    pub pit_lane_times: BTreeMap<String, PitLaneTime>,
    pub top_three: Vec<TopThreeLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_race_control_message: Option<RaceControlMessage>,
    /// Timestamp of the last applied message (ISO-8601 UTC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SessionState {
    /// The driver currently running first, if timing data has one.
    pub fn leader(&self) -> Option<(&String, &TimingLine)> {
        self.timing.iter().find(|(_, t)| t.position == Some(1))
    }
}
