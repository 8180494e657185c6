//! Config loading: required fields, defaults, validation errors.

use bridge::config::{ConfigError, load_config_from_str};

const MINIMAL: &str = r#"
schema_version = 1

[mqtt]
host = "broker.local"
"#;

#[test]
fn minimal_config_gets_defaults() {
    let cfg = load_config_from_str(MINIMAL).expect("load");
    assert_eq!(cfg.mqtt.host, "broker.local");
    assert_eq!(cfg.mqtt.port, 1883);
    assert_eq!(cfg.mqtt.topic_prefix, "f12mqtt");
    assert_eq!(cfg.mqtt.discovery_prefix, "homeassistant");
    assert_eq!(cfg.feed.reconnect_secs, 2);
    assert!(cfg.recordings.enabled);
    assert_eq!(cfg.recordings.dir, "/var/lib/pitwall/recordings");
    assert_eq!(cfg.http.bind, "0.0.0.0:8099");
    assert!(!cfg.notifier.enabled);
    assert!(cfg.favourite_drivers.is_empty());
}

#[test]
fn full_config_round_trips() {
    let toml = r#"
schema_version = 1
favourite_drivers = ["1", "4", "16"]

[mqtt]
host = "10.0.0.2"
port = 8883
username = "bridge"
password = "secret"
client_id = "pitwall-test"
topic_prefix = "paddock"
discovery_prefix = "ha"

[feed]
negotiate_url = "https://feed.example.com/signalr"
reconnect_secs = 5

[recordings]
dir = "/tmp/recordings"
enabled = false

[archive]
base_url = "https://archive.example.com/v1"

[http]
bind = "127.0.0.1:9000"

[notifier]
enabled = true
base_topic = "awtrix_b00794"
"#;
    let cfg = load_config_from_str(toml).expect("load");
    assert_eq!(cfg.mqtt.port, 8883);
    assert_eq!(cfg.mqtt.username.as_deref(), Some("bridge"));
    assert_eq!(cfg.mqtt.topic_prefix, "paddock");
    assert_eq!(cfg.feed.reconnect_secs, 5);
    assert!(!cfg.recordings.enabled);
    assert_eq!(cfg.archive.base_url, "https://archive.example.com/v1");
    assert!(cfg.notifier.enabled);
    assert_eq!(cfg.notifier.base_topic, "awtrix_b00794");
    assert_eq!(cfg.favourite_drivers, vec!["1", "4", "16"]);
}

#[test]
fn missing_schema_version_is_rejected() {
    let err = load_config_from_str("[mqtt]\nhost = \"x\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingField(f) if f == "schema_version"));
}

#[test]
fn wrong_schema_version_is_rejected() {
    let err = load_config_from_str("schema_version = 2\n[mqtt]\nhost = \"x\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(_)));
}

#[test]
fn missing_mqtt_host_is_rejected() {
    let err = load_config_from_str("schema_version = 1\n[mqtt]\nport = 1883\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingField(f) if f == "mqtt.host"));
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let err = load_config_from_str("schema_version = =").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn config_file_from_disk_loads() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("bridge.toml");
    std::fs::write(&path, MINIMAL).expect("write config");
    let cfg = bridge::config::load_config_from_path(&path).expect("load");
    assert_eq!(cfg.mqtt.host, "broker.local");

    let err = bridge::config::load_config_from_path(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
