//! Semantic events derived from snapshot pairs.

use crate::state::{Flag, TyreCompound};
use serde::{Deserialize, Serialize};

/// An event detected between two consecutive snapshots.
///
/// Serialised with a top-level `type` tag; payload fields are camelCase to
/// match the bus and on-disk shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Event {
    FlagChange {
        previous_flag: Flag,
        new_flag: Flag,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Overtake {
        overtaking_driver: String,
        overtaken_driver: String,
        new_position: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        overtaking_abbreviation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        overtaken_abbreviation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        overtaking_team_color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        overtaken_team_color: Option<String>,
    },
    PitStop {
        driver_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        abbreviation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        team_color: Option<String>,
        new_compound: TyreCompound,
        stint_number: u32,
    },
    WeatherChange {
        previous_rainfall: bool,
        new_rainfall: bool,
    },
}

impl Event {
    /// Short name used as the event-topic leaf on the bus.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FlagChange { .. } => "flag",
            Event::Overtake { .. } => "overtake",
            Event::PitStop { .. } => "pit_stop",
            Event::WeatherChange { .. } => "weather",
        }
    }
}
