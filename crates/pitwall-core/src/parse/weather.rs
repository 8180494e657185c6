//! `WeatherData` topic decoding.

use serde_json::Value;

/// Partial update to the weather record. All readings arrive as strings
/// from the feed; `Rainfall` is `"1"` / `"0"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherPatch {
    pub air_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub rainfall: Option<bool>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub pressure: Option<f64>,
}

pub fn parse_weather(data: &Value) -> Option<WeatherPatch> {
    if !data.is_object() {
        return None;
    }
    Some(WeatherPatch {
        air_temp: super::f64_field(data, "AirTemp"),
        track_temp: super::f64_field(data, "TrackTemp"),
        humidity: super::f64_field(data, "Humidity"),
        rainfall: rainfall_field(data),
        wind_speed: super::f64_field(data, "WindSpeed"),
        wind_direction: super::f64_field(data, "WindDirection"),
        pressure: super::f64_field(data, "Pressure"),
    })
}

fn rainfall_field(data: &Value) -> Option<bool> {
    match data.get("Rainfall")? {
        Value::String(s) => match s.as_str() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}
