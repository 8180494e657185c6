// bridge: daemon bridging the live telemetry feed onto the MQTT bus, with
// on-disk session recording and deterministic playback.

pub mod archive;
pub mod config;
pub mod control;
pub mod feed;
pub mod playback;
pub mod publisher;
pub mod recorder;
pub mod sources;
