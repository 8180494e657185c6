//! Bridge configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/pitwall/bridge.toml`.
//!
//! # Required fields
//! - `schema_version = 1`
//! - `mqtt.host`
//!
//! Everything else has a default.

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (deserialized from TOML)
// ---------------------------------------------------------------------------

/// Top-level bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub schema_version: u32,
    pub mqtt: MqttConfig,
    pub feed: FeedConfig,
    pub recordings: RecordingsConfig,
    pub archive: ArchiveConfig,
    pub http: HttpConfig,
    pub notifier: NotifierConfig,
    /// Racing numbers of favourite drivers; each gets its own bus entities.
    pub favourite_drivers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// Root of the published topic tree.
    pub topic_prefix: String,
    /// Root of the auto-discovery topic tree.
    pub discovery_prefix: String,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Hub negotiate URL (HTTP; the WS URL is derived from it).
    pub negotiate_url: String,
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RecordingsConfig {
    pub dir: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind: String,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub enabled: bool,
    /// Base topic of the LED-matrix device, e.g. `awtrix_abc123`.
    pub base_topic: String,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (with Option for optional fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    mqtt: Option<RawMqttConfig>,
    feed: Option<RawFeedConfig>,
    recordings: Option<RawRecordingsConfig>,
    archive: Option<RawArchiveConfig>,
    http: Option<RawHttpConfig>,
    notifier: Option<RawNotifierConfig>,
    favourite_drivers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawMqttConfig {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    topic_prefix: Option<String>,
    discovery_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFeedConfig {
    negotiate_url: Option<String>,
    reconnect_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRecordingsConfig {
    dir: Option<String>,
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawArchiveConfig {
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHttpConfig {
    bind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNotifierConfig {
    enabled: Option<bool>,
    base_topic: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load bridge config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load bridge config from the default path `/etc/pitwall/bridge.toml`.
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/pitwall/bridge.toml"))
}

/// Load bridge config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<BridgeConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    // Validate schema_version
    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {}",
            schema_version
        )));
    }

    // Validate mqtt
    let raw_mqtt = raw
        .mqtt
        .ok_or_else(|| ConfigError::MissingField("mqtt".to_owned()))?;
    let host = raw_mqtt
        .host
        .ok_or_else(|| ConfigError::MissingField("mqtt.host".to_owned()))?;
    let mqtt = MqttConfig {
        host,
        port: raw_mqtt.port.unwrap_or(1883),
        username: raw_mqtt.username,
        password: raw_mqtt.password,
        client_id: raw_mqtt.client_id.unwrap_or_else(|| "pitwall-bridge".to_owned()),
        topic_prefix: raw_mqtt.topic_prefix.unwrap_or_else(|| "f12mqtt".to_owned()),
        discovery_prefix: raw_mqtt
            .discovery_prefix
            .unwrap_or_else(|| "homeassistant".to_owned()),
    };

    // Feed defaults
    let feed = match raw.feed {
        Some(f) => FeedConfig {
            negotiate_url: f
                .negotiate_url
                .unwrap_or_else(|| "https://livetiming.formula1.com/signalr".to_owned()),
            reconnect_secs: f.reconnect_secs.unwrap_or(2),
        },
        None => FeedConfig {
            negotiate_url: "https://livetiming.formula1.com/signalr".to_owned(),
            reconnect_secs: 2,
        },
    };

    // Recordings defaults
    let recordings = match raw.recordings {
        Some(r) => RecordingsConfig {
            dir: r
                .dir
                .unwrap_or_else(|| "/var/lib/pitwall/recordings".to_owned()),
            enabled: r.enabled.unwrap_or(true),
        },
        None => RecordingsConfig {
            dir: "/var/lib/pitwall/recordings".to_owned(),
            enabled: true,
        },
    };

    // Archive defaults
    let archive = ArchiveConfig {
        base_url: raw
            .archive
            .and_then(|a| a.base_url)
            .unwrap_or_else(|| "https://api.openf1.org/v1".to_owned()),
    };

    // HTTP defaults
    let http = HttpConfig {
        bind: raw
            .http
            .and_then(|h| h.bind)
            .unwrap_or_else(|| "0.0.0.0:8099".to_owned()),
    };

    // Notifier defaults
    let notifier = match raw.notifier {
        Some(n) => NotifierConfig {
            enabled: n.enabled.unwrap_or(false),
            base_topic: n.base_topic.unwrap_or_else(|| "awtrix".to_owned()),
        },
        None => NotifierConfig {
            enabled: false,
            base_topic: "awtrix".to_owned(),
        },
    };

    Ok(BridgeConfig {
        schema_version,
        mqtt,
        feed,
        recordings,
        archive,
        http,
        notifier,
        favourite_drivers: raw.favourite_drivers.unwrap_or_default(),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
