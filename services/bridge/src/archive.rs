//! Historical archive adapter.
//!
//! Shapes the REST archive's per-concern endpoints into the same
//! `(ts, topic, data)` triples the live feed produces, using the canonical
//! topic names (`TrackStatus`, `TimingData`, `TimingAppData`, `DriverList`),
//! sorted by timestamp. The shaping functions are pure; only `load_session`
//! touches the network.

use pitwall_core::{FeedMessage, Timeline};
use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("archive returned no data for session {0}")]
    EmptySession(String),
}

/// Client for the historical REST archive.
pub struct HistoricalArchive {
    base_url: String,
    client: reqwest::Client,
}

impl HistoricalArchive {
    pub fn new(base_url: impl Into<String>) -> Self {
        HistoricalArchive {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch one session and shape it into a sorted timeline.
    pub async fn load_session(&self, session_key: &str) -> Result<Timeline, ArchiveError> {
        let sessions = self.fetch("sessions", session_key).await?;
        let drivers = self.fetch("drivers", session_key).await?;
        let positions = self.fetch("position", session_key).await?;
        let stints = self.fetch("stints", session_key).await?;
        let race_control = self.fetch("race_control", session_key).await?;

        let mut entries = Vec::new();
        // Session identity and the driver list are static; date them at the
        // earliest known entry so they exist before the first timing diff.
        let first_ts = earliest_date(&[&sessions, &positions, &stints, &race_control]);
        let first_ts = first_ts.as_deref().unwrap_or_default();
        if let Some(msg) = shape_session_info(&sessions, first_ts) {
            entries.push(msg);
        }
        if let Some(msg) = shape_drivers(&drivers, first_ts) {
            entries.push(msg);
        }
        entries.extend(shape_positions(&positions));
        entries.extend(shape_stints(&stints));
        entries.extend(shape_race_control(&race_control));

        if entries.is_empty() {
            return Err(ArchiveError::EmptySession(session_key.to_owned()));
        }
        Ok(Timeline::new(entries))
    }

    async fn fetch(&self, endpoint: &str, session_key: &str) -> Result<Value, ArchiveError> {
        let url = format!(
            "{}/{}?session_key={}",
            self.base_url, endpoint, session_key
        );
        let response = self.client.get(&url).send().await?;
        match response.error_for_status() {
            Ok(ok) => Ok(ok.json().await?),
            Err(e) => {
                warn!(endpoint, error = %e, "archive endpoint failed, continuing without it");
                Ok(Value::Array(Vec::new()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shaping
// ---------------------------------------------------------------------------

fn rows(value: &Value) -> &[Value] {
    value.as_array().map_or(&[], Vec::as_slice)
}

fn row_date(row: &Value) -> Option<String> {
    row.get("date")
        .or_else(|| row.get("date_start"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn row_driver_number(row: &Value) -> Option<String> {
    match row.get("driver_number")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn earliest_date(sources: &[&Value]) -> Option<String> {
    sources
        .iter()
        .flat_map(|v| rows(v).iter().filter_map(row_date))
        .min()
}

/// One `SessionInfo` message from the first session row, so the replayed
/// snapshot carries session identity.
pub fn shape_session_info(value: &Value, ts: &str) -> Option<FeedMessage> {
    let row = rows(value).first()?;
    let name = row.get("session_name").and_then(Value::as_str)?;
    let data = json!({
        "Name": name,
        "Type": row.get("session_type").cloned().unwrap_or(Value::Null),
        "StartDate": row.get("date_start").cloned().unwrap_or(Value::Null),
        "EndDate": row.get("date_end").cloned().unwrap_or(Value::Null),
        "Meeting": {
            "Circuit": {
                "ShortName": row.get("circuit_short_name").cloned().unwrap_or(Value::Null),
            },
            "Country": {
                "Name": row.get("country_name").cloned().unwrap_or(Value::Null),
            },
        },
    });
    // The session's own start date beats the earliest diff timestamp.
    let ts = row
        .get("date_start")
        .and_then(Value::as_str)
        .unwrap_or(ts)
        .to_owned();
    Some(FeedMessage {
        ts,
        topic: "SessionInfo".to_owned(),
        data,
    })
}

/// One `DriverList` message carrying the whole field.
pub fn shape_drivers(value: &Value, ts: &str) -> Option<FeedMessage> {
    let mut lines = serde_json::Map::new();
    for row in rows(value) {
        let Some(number) = row_driver_number(row) else {
            continue;
        };
        lines.insert(
            number.clone(),
            json!({
                "RacingNumber": number,
                "Tla": row.get("name_acronym").cloned().unwrap_or(Value::Null),
                "FirstName": row.get("first_name").cloned().unwrap_or(Value::Null),
                "LastName": row.get("last_name").cloned().unwrap_or(Value::Null),
                "TeamName": row.get("team_name").cloned().unwrap_or(Value::Null),
                "TeamColour": row.get("team_colour").cloned().unwrap_or(Value::Null),
                "CountryCode": row.get("country_code").cloned().unwrap_or(Value::Null),
            }),
        );
    }
    if lines.is_empty() {
        return None;
    }
    Some(FeedMessage {
        ts: ts.to_owned(),
        topic: "DriverList".to_owned(),
        data: Value::Object(lines),
    })
}

/// One `TimingData` message per position row.
pub fn shape_positions(value: &Value) -> Vec<FeedMessage> {
    rows(value)
        .iter()
        .filter_map(|row| {
            let ts = row_date(row)?;
            let number = row_driver_number(row)?;
            let position = row.get("position")?.as_u64()?;
            Some(FeedMessage {
                ts,
                topic: "TimingData".to_owned(),
                data: json!({"Lines": {number: {"Position": position.to_string()}}}),
            })
        })
        .collect()
}

/// One `TimingAppData` message per stint row.
///
/// The archive numbers stints from 1; the canonical shape is 0-based.
pub fn shape_stints(value: &Value) -> Vec<FeedMessage> {
    rows(value)
        .iter()
        .filter_map(|row| {
            let ts = row_date(row)?;
            let number = row_driver_number(row)?;
            let archive_stint = row.get("stint_number")?.as_u64()?;
            let stint = archive_stint.saturating_sub(1).to_string();
            let compound = row
                .get("compound")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            let mut stint_obj = json!({"Compound": compound});
            if let Some(age) = row.get("tyre_age_at_start").and_then(Value::as_u64) {
                stint_obj["TotalLaps"] = json!(age);
            }
            Some(FeedMessage {
                ts,
                topic: "TimingAppData".to_owned(),
                data: json!({"Lines": {number: {"Stints": {stint: stint_obj}}}}),
            })
        })
        .collect()
}

/// `TrackStatus` messages from race-control flag rows.
pub fn shape_race_control(value: &Value) -> Vec<FeedMessage> {
    rows(value)
        .iter()
        .filter_map(|row| {
            let ts = row_date(row)?;
            let status = status_code_for_row(row)?;
            let mut data = json!({"Status": status});
            if let Some(message) = row.get("message").and_then(Value::as_str) {
                data["Message"] = json!(message);
            }
            Some(FeedMessage {
                ts,
                topic: "TrackStatus".to_owned(),
                data,
            })
        })
        .collect()
}

fn status_code_for_row(row: &Value) -> Option<&'static str> {
    let message = row.get("message").and_then(Value::as_str).unwrap_or("");
    if message.contains("VIRTUAL SAFETY CAR ENDING") {
        return Some("7");
    }
    if message.contains("VIRTUAL SAFETY CAR") {
        return Some("6");
    }
    if message.contains("SAFETY CAR") {
        return Some("4");
    }
    match row.get("flag").and_then(Value::as_str)? {
        "GREEN" | "CLEAR" => Some("1"),
        "YELLOW" | "DOUBLE YELLOW" => Some("2"),
        "RED" => Some("5"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_row_shapes_into_session_info() {
        let rows = json!([{
            "session_key": 9161,
            "session_name": "Race",
            "session_type": "Race",
            "date_start": "2026-05-24T13:00:00Z",
            "date_end": "2026-05-24T15:00:00Z",
            "circuit_short_name": "Monaco",
            "country_name": "Monaco"
        }]);
        let msg = shape_session_info(&rows, "2026-05-24T13:05:00Z").unwrap();
        assert_eq!(msg.topic, "SessionInfo");
        // Dated at the session start, not the earliest diff.
        assert_eq!(msg.ts, "2026-05-24T13:00:00Z");
        assert_eq!(msg.data["Name"], "Race");
        assert_eq!(msg.data["Meeting"]["Circuit"]["ShortName"], "Monaco");
        assert_eq!(msg.data["EndDate"], "2026-05-24T15:00:00Z");
    }

    #[test]
    fn session_info_requires_a_session_row() {
        assert!(shape_session_info(&json!([]), "t").is_none());
        assert!(shape_session_info(&json!([{"session_key": 1}]), "t").is_none());
    }

    #[test]
    fn drivers_shape_into_one_driver_list() {
        let rows = json!([
            {"driver_number": 1, "name_acronym": "VER", "team_name": "Red Bull Racing",
             "team_colour": "3671C6"},
            {"driver_number": 4, "name_acronym": "NOR", "team_name": "McLaren",
             "team_colour": "FF8000"}
        ]);
        let msg = shape_drivers(&rows, "2026-05-24T13:00:00Z").unwrap();
        assert_eq!(msg.topic, "DriverList");
        assert_eq!(msg.data["1"]["Tla"], "VER");
        assert_eq!(msg.data["4"]["TeamColour"], "FF8000");
    }

    #[test]
    fn positions_shape_into_timing_diffs() {
        let rows = json!([
            {"date": "2026-05-24T13:01:00Z", "driver_number": 4, "position": 1}
        ]);
        let messages = shape_positions(&rows);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "TimingData");
        assert_eq!(messages[0].data["Lines"]["4"]["Position"], "1");
    }

    #[test]
    fn stints_renumber_to_zero_based() {
        let rows = json!([
            {"date_start": "2026-05-24T13:20:00Z", "driver_number": 1,
             "stint_number": 2, "compound": "HARD", "tyre_age_at_start": 0}
        ]);
        let messages = shape_stints(&rows);
        assert_eq!(messages[0].topic, "TimingAppData");
        assert_eq!(
            messages[0].data["Lines"]["1"]["Stints"]["1"]["Compound"],
            "HARD"
        );
    }

    #[test]
    fn race_control_maps_flags_to_status_codes() {
        let rows = json!([
            {"date": "t1", "flag": "YELLOW", "message": "YELLOW IN SECTOR 3"},
            {"date": "t2", "flag": null, "message": "SAFETY CAR DEPLOYED"},
            {"date": "t3", "flag": "CHEQUERED", "message": "CHEQUERED FLAG"},
            {"date": "t4", "flag": "GREEN", "message": "TRACK CLEAR"}
        ]);
        let messages = shape_race_control(&rows);
        // Chequered has no upstream status code; that row is dropped.
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].data["Status"], "2");
        assert_eq!(messages[1].data["Status"], "4");
        assert_eq!(messages[2].data["Status"], "1");
    }

    #[test]
    fn vsc_ending_is_distinguished_from_vsc() {
        let rows = json!([
            {"date": "t1", "message": "VIRTUAL SAFETY CAR DEPLOYED"},
            {"date": "t2", "message": "VIRTUAL SAFETY CAR ENDING"}
        ]);
        let messages = shape_race_control(&rows);
        assert_eq!(messages[0].data["Status"], "6");
        assert_eq!(messages[1].data["Status"], "7");
    }
}
