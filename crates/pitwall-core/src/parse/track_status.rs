//! `TrackStatus` topic decoding.

use crate::state::{Flag, TrackStatus};
use serde_json::Value;

/// Decode a `TrackStatus` diff.
///
/// Returns `None` when the status code is missing or unrecognised — the
/// accumulator leaves the existing track status in place.
pub fn parse_track_status(data: &Value) -> Option<TrackStatus> {
    let code = super::string_field(data, "Status")?;
    let flag = Flag::from_status_code(&code)?;
    let message = data
        .get("Message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);
    Some(TrackStatus { flag, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_status() {
        let ts = parse_track_status(&json!({"Status": "4", "Message": "SAFETY CAR DEPLOYED"}))
            .unwrap();
        assert_eq!(ts.flag, Flag::SafetyCar);
        assert_eq!(ts.message.as_deref(), Some("SAFETY CAR DEPLOYED"));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(parse_track_status(&json!({"Status": "99"})).is_none());
        assert!(parse_track_status(&json!({"Message": "no status"})).is_none());
    }

    #[test]
    fn missing_message_stays_absent() {
        let ts = parse_track_status(&json!({"Status": "1"})).unwrap();
        assert_eq!(ts.flag, Flag::Green);
        assert!(ts.message.is_none());
    }
}
