//! Upstream feed client.
//!
//! Connects to the hub, subscribes to the topic set, and turns hub frames
//! into [`FeedMessage`]s for the pipeline task.
//!
//! # Protocol
//! 1. GET `<negotiate_url>/negotiate` — returns a connection token and a
//!    session cookie
//! 2. WebSocket connect to the derived `/connect` URL (cookie attached)
//! 3. Send the Subscribe invocation for all topics
//! 4. The subscribe reply (`R`) carries a full reference snapshot per topic;
//!    subsequent frames (`M`) carry `[topic, diff, timestamp]` entries
//!
//! Topics ending in `.z` are base64 + raw-deflate compressed JSON; the
//! suffix is stripped before the message reaches the pipeline.
//!
//! Reconnects use a fixed backoff; the pipeline tolerates the gap.

use crate::config::FeedConfig;
use base64::Engine;
use chrono::Utc;
use flate2::read::DeflateDecoder;
use futures_util::{SinkExt, StreamExt};
use pitwall_core::FeedMessage;
use serde_json::Value;
use std::io::Read;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

/// Topics subscribed on connect.
pub const SUBSCRIBED_TOPICS: &[&str] = &[
    "TimingData",
    "TrackStatus",
    "DriverList",
    "RaceControlMessages",
    "SessionInfo",
    "SessionData",
    "LapCount",
    "WeatherData",
    "TimingAppData",
    "ExtrapolatedClock",
    "Heartbeat",
    "CarData.z",
    "Position.z",
];

/// `[{"name":"Streaming"}]`, percent-encoded for query-string use.
const CONNECTION_DATA_ENCODED: &str = "%5B%7B%22name%22%3A%22Streaming%22%7D%5D";

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// What the feed task reports to the pipeline task.
#[derive(Debug, Clone)]
pub enum FeedSignal {
    Connected,
    Disconnected { error: Option<String> },
    Message(FeedMessage),
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WS: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("negotiate: {0}")]
    Negotiate(String),
    #[error("connection closed: {0}")]
    Closed(String),
}

// ---------------------------------------------------------------------------
// Frame decoding (pure)
// ---------------------------------------------------------------------------

/// Decode one topic payload: inflate `.z` topics and strip the suffix.
pub fn decode_topic_payload(topic: &str, data: &Value) -> Option<(String, Value)> {
    let Some(stripped) = topic.strip_suffix(".z") else {
        return Some((topic.to_owned(), data.clone()));
    };
    let encoded = data.as_str()?;
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let mut inflated = String::new();
    DeflateDecoder::new(compressed.as_slice())
        .read_to_string(&mut inflated)
        .ok()?;
    let value = serde_json::from_str(&inflated).ok()?;
    Some((stripped.to_owned(), value))
}

/// Decode one hub frame into feed messages.
///
/// `fallback_ts` stamps reference-snapshot topics and feed entries that
/// omit their timestamp.
pub fn parse_frame(text: &str, fallback_ts: &str) -> Vec<FeedMessage> {
    let Ok(frame) = serde_json::from_str::<Value>(text) else {
        return Vec::new();
    };
    let mut messages = Vec::new();

    // Subscribe reply: one reference snapshot per topic.
    if let Some(reference) = frame.get("R").and_then(Value::as_object) {
        for (topic, data) in reference {
            if let Some((topic, data)) = decode_topic_payload(topic, data) {
                messages.push(FeedMessage {
                    ts: fallback_ts.to_owned(),
                    topic,
                    data,
                });
            }
        }
    }

    // Feed entries: A = [topic, diff, timestamp].
    if let Some(entries) = frame.get("M").and_then(Value::as_array) {
        for entry in entries {
            let Some(args) = entry.get("A").and_then(Value::as_array) else {
                continue;
            };
            let (Some(topic), Some(data)) = (args.first().and_then(Value::as_str), args.get(1))
            else {
                continue;
            };
            let ts = args
                .get(2)
                .and_then(Value::as_str)
                .unwrap_or(fallback_ts)
                .to_owned();
            if let Some((topic, data)) = decode_topic_payload(topic, data) {
                messages.push(FeedMessage { ts, topic, data });
            }
        }
    }

    messages
}

/// Percent-encode a query-string component.
fn url_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

struct Negotiation {
    token: String,
    cookie: Option<String>,
}

/// The upstream hub client. `run` owns the reconnect loop.
pub struct FeedClient {
    cfg: FeedConfig,
    http: reqwest::Client,
}

impl FeedClient {
    pub fn new(cfg: FeedConfig) -> Self {
        FeedClient {
            cfg,
            http: reqwest::Client::new(),
        }
    }

    /// Connect, subscribe and pump messages until shutdown. Reconnects on
    /// failure with a fixed backoff.
    pub async fn run(self, tx: mpsc::Sender<FeedSignal>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.run_session(&tx, &mut shutdown).await {
                Ok(()) => {
                    // Clean shutdown requested.
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "feed session ended");
                    let _ = tx
                        .send(FeedSignal::Disconnected {
                            error: Some(e.to_string()),
                        })
                        .await;
                }
            }
            let backoff = Duration::from_secs(self.cfg.reconnect_secs);
            tokio::select! {
                _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
                () = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn run_session(
        &self,
        tx: &mpsc::Sender<FeedSignal>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), FeedError> {
        let negotiation = self.negotiate().await?;
        let ws_url = self.connect_url(&negotiation.token);

        let mut request = ws_url.as_str().into_client_request()?;
        if let Some(cookie) = &negotiation.cookie {
            if let Ok(value) = HeaderValue::from_str(cookie) {
                request.headers_mut().insert("Cookie", value);
            }
        }
        let (mut ws, _response) = connect_async(request).await?;

        let subscribe = serde_json::json!({
            "H": "Streaming",
            "M": "Subscribe",
            "A": [SUBSCRIBED_TOPICS],
            "I": 1,
        });
        ws.send(Message::Text(subscribe.to_string().into())).await?;
        info!(topics = SUBSCRIBED_TOPICS.len(), "feed subscribed");
        let _ = tx.send(FeedSignal::Connected).await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = ws.close(None).await;
                        return Ok(());
                    }
                }
                msg = ws.next() => {
                    match msg {
                        None => {
                            return Err(FeedError::Closed("stream ended".to_owned()));
                        }
                        Some(Err(e)) => return Err(FeedError::Ws(e)),
                        Some(Ok(Message::Text(text))) => {
                            let now = now_iso();
                            for message in parse_frame(&text, &now) {
                                debug!(topic = %message.topic, "feed message");
                                let _ = tx.send(FeedSignal::Message(message)).await;
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Err(FeedError::Closed("server closed".to_owned()));
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    async fn negotiate(&self) -> Result<Negotiation, FeedError> {
        let url = format!(
            "{}/negotiate?connectionData={}&clientProtocol=1.5",
            self.cfg.negotiate_url, CONNECTION_DATA_ENCODED
        );
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let cookie = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .collect::<Vec<_>>()
            .join("; ");
        let body: Value = response.json().await?;
        let token = body
            .get("ConnectionToken")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::Negotiate("no ConnectionToken in reply".to_owned()))?
            .to_owned();
        Ok(Negotiation {
            token,
            cookie: if cookie.is_empty() { None } else { Some(cookie) },
        })
    }

    fn connect_url(&self, token: &str) -> String {
        let ws_base = self
            .cfg
            .negotiate_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!(
            "{}/connect?transport=webSockets&connectionToken={}&connectionData={}&clientProtocol=1.5",
            ws_base,
            url_encode(token),
            CONNECTION_DATA_ENCODED
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn feed_entries_decode_with_their_own_timestamp() {
        let frame = json!({
            "C": "d-1",
            "M": [
                {"H": "Streaming", "M": "feed",
                 "A": ["TrackStatus", {"Status": "4"}, "2026-05-24T13:00:05Z"]}
            ]
        });
        let messages = parse_frame(&frame.to_string(), "fallback");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "TrackStatus");
        assert_eq!(messages[0].ts, "2026-05-24T13:00:05Z");
        assert_eq!(messages[0].data["Status"], "4");
    }

    #[test]
    fn reference_snapshot_decodes_per_topic() {
        let frame = json!({
            "R": {
                "TrackStatus": {"Status": "1"},
                "LapCount": {"CurrentLap": 1, "TotalLaps": 57}
            },
            "I": "1"
        });
        let mut messages = parse_frame(&frame.to_string(), "2026-05-24T13:00:00Z");
        messages.sort_by(|a, b| a.topic.cmp(&b.topic));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].topic, "LapCount");
        assert_eq!(messages[1].ts, "2026-05-24T13:00:00Z");
    }

    #[test]
    fn compressed_topic_is_inflated_and_renamed() {
        let payload = json!({"Entries": [1, 2, 3]}).to_string();
        let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);

        let (topic, data) = decode_topic_payload("CarData.z", &json!(encoded)).unwrap();
        assert_eq!(topic, "CarData");
        assert_eq!(data["Entries"][1], 2);
    }

    #[test]
    fn garbage_frames_decode_to_nothing() {
        assert!(parse_frame("not json", "t").is_empty());
        assert!(parse_frame("{}", "t").is_empty());
        assert!(decode_topic_payload("CarData.z", &json!("!!notbase64!!")).is_none());
    }

    #[test]
    fn url_encode_escapes_token_characters() {
        assert_eq!(url_encode("a+b/c="), "a%2Bb%2Fc%3D");
        assert_eq!(url_encode("plain-text_1.0~x"), "plain-text_1.0~x");
    }
}
