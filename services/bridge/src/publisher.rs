//! MQTT publisher: projects snapshots and events onto the topic tree.
//!
//! # Topic tree (under the configured prefix, retained unless noted)
//! - `status` — "online" / "offline" (Last-Will = offline)
//! - `session/status` — "active" / "finished"
//! - `session/{info,flag,leader,lap,weather,race_control}`
//! - `driver/{n}/{position,gap,tyre,status}`
//! - `event/{flag,overtake,pit_stop,weather}` — NOT retained
//! - `standings/{last_winner,drivers_leader,constructors_leader}`,
//!   `schedule/next_race` — persistent
//! - `playback/{state,command}`
//!
//! Discovery configs are retained under the discovery prefix; session-scoped
//! ones are remembered and cleared (empty retained payload) on deregister.
//! When the broker is unreachable every publish degrades to a warn-logged
//! no-op — nothing queues at this layer.

use crate::config::{MqttConfig, NotifierConfig};
use crate::playback::PlaybackState;
use pitwall_core::state::TimingLine;
use pitwall_core::{Event, Flag, SessionState};
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Flag appearance
// ---------------------------------------------------------------------------

/// How a flag is rendered on the LED matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagAppearance {
    /// Background colour, six-digit hex.
    pub background: &'static str,
    pub text: &'static str,
    pub effect: Option<&'static str>,
    /// Light backgrounds need dark text.
    pub dark_text: bool,
}

pub fn flag_appearance(flag: Flag) -> FlagAppearance {
    match flag {
        Flag::Green => FlagAppearance {
            background: "00FF00",
            text: "GREEN",
            effect: None,
            dark_text: false,
        },
        Flag::Yellow => FlagAppearance {
            background: "FFFF00",
            text: "YELLOW",
            effect: None,
            dark_text: true,
        },
        Flag::Red => FlagAppearance {
            background: "FF0000",
            text: "RED FLAG",
            effect: Some("Pulse"),
            dark_text: false,
        },
        Flag::SafetyCar => FlagAppearance {
            background: "FFA500",
            text: "SAFETY CAR",
            effect: Some("Pulse"),
            dark_text: false,
        },
        Flag::VirtualSafetyCar => FlagAppearance {
            background: "FFA500",
            text: "VSC",
            effect: None,
            dark_text: false,
        },
        Flag::VscEnding => FlagAppearance {
            background: "00FF00",
            text: "VSC END",
            effect: None,
            dark_text: false,
        },
        Flag::Chequered => FlagAppearance {
            background: "FFFFFF",
            text: "CHEQUERED",
            effect: None,
            dark_text: true,
        },
    }
}

fn text_color(appearance: &FlagAppearance) -> &'static str {
    if appearance.dark_text { "#000000" } else { "#FFFFFF" }
}

// ---------------------------------------------------------------------------
// Pure payload builders
// ---------------------------------------------------------------------------

/// Driver status leaf: racing | pit | retired.
pub fn driver_status(line: &TimingLine) -> &'static str {
    if line.retired {
        "retired"
    } else if line.in_pit {
        "pit"
    } else {
        "racing"
    }
}

/// Notifier payload for one event (LED-matrix notify topic).
pub fn notification_payload(event: &Event) -> Value {
    match event {
        Event::FlagChange { new_flag, .. } => {
            let appearance = flag_appearance(*new_flag);
            let mut payload = json!({
                "text": appearance.text,
                "color": text_color(&appearance),
                "background": format!("#{}", appearance.background),
                "duration": 10,
                "wakeup": true,
            });
            if let Some(effect) = appearance.effect {
                payload["effect"] = json!(effect);
            }
            payload
        }
        Event::Overtake {
            overtaking_driver,
            new_position,
            overtaking_abbreviation,
            overtaking_team_color,
            ..
        } => json!({
            "text": format!(
                "{} P{}",
                overtaking_abbreviation.as_deref().unwrap_or(overtaking_driver),
                new_position
            ),
            "color": hex_or_white(overtaking_team_color.as_deref()),
            "duration": 8,
            "wakeup": true,
        }),
        Event::PitStop {
            driver_number,
            abbreviation,
            team_color,
            new_compound,
            ..
        } => json!({
            "text": format!(
                "{} BOX {}",
                abbreviation.as_deref().unwrap_or(driver_number),
                new_compound
            ),
            "color": hex_or_white(team_color.as_deref()),
            "duration": 8,
            "wakeup": true,
        }),
        Event::WeatherChange { new_rainfall, .. } => json!({
            "text": if *new_rainfall { "RAIN" } else { "DRY" },
            "color": if *new_rainfall { "#4488FF" } else { "#FFFFFF" },
            "duration": 10,
            "wakeup": true,
        }),
    }
}

fn hex_or_white(color: Option<&str>) -> String {
    match color {
        Some(c) => format!("#{}", c),
        None => "#FFFFFF".to_owned(),
    }
}

/// Retained auto-discovery config for one sensor entity.
pub fn discovery_payload(prefix: &str, object_id: &str, name: &str, state_topic: &str) -> Value {
    json!({
        "name": name,
        "unique_id": format!("pitwall_{}", object_id),
        "state_topic": state_topic,
        "availability_topic": format!("{}/status", prefix),
        "payload_available": "online",
        "payload_not_available": "offline",
        "device": {
            "identifiers": ["pitwall"],
            "name": "Pitwall F1 Bridge",
            "manufacturer": "pitwall",
        },
    })
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Owns the MQTT client half; the event loop is polled by a separate task.
pub struct Publisher {
    client: AsyncClient,
    prefix: String,
    discovery_prefix: String,
    notifier: NotifierConfig,
    favourites: Vec<String>,
    session_active: bool,
    /// Discovery topics of session-scoped entities, cleared on deregister.
    ephemeral_topics: Vec<String>,
}

impl Publisher {
    /// Build the client with a retained offline Last-Will. The returned
    /// event loop must be polled for the connection to make progress.
    pub fn connect(
        mqtt: &MqttConfig,
        notifier: NotifierConfig,
        favourites: Vec<String>,
    ) -> (Publisher, EventLoop) {
        let mut options = MqttOptions::new(&mqtt.client_id, &mqtt.host, mqtt.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            format!("{}/status", mqtt.topic_prefix),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        if let (Some(username), Some(password)) = (&mqtt.username, &mqtt.password) {
            options.set_credentials(username, password);
        }
        let (client, event_loop) = AsyncClient::new(options, 64);
        (
            Publisher {
                client,
                prefix: mqtt.topic_prefix.clone(),
                discovery_prefix: mqtt.discovery_prefix.clone(),
                notifier,
                favourites,
                session_active: false,
                ephemeral_topics: Vec::new(),
            },
            event_loop,
        )
    }

    pub fn command_topic(&self) -> String {
        format!("{}/playback/command", self.prefix)
    }

    /// Bridge availability: `status` = "online" / "offline", retained.
    /// Published on broker connect and on upstream connect/disconnect.
    pub fn set_status(&self, online: bool) {
        self.publish_retained(
            &format!("{}/status", self.prefix),
            if online { "online" } else { "offline" },
        );
    }

    /// Called on (re)connect: mark online and subscribe to the command
    /// topic.
    pub fn announce_online(&self) {
        self.set_status(true);
        if let Err(e) = self
            .client
            .try_subscribe(self.command_topic(), QoS::AtLeastOnce)
        {
            warn!(error = %e, "subscribing to playback command topic");
        }
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    /// Publish discovery configs for season-long entities. Called once at
    /// startup; these outlive sessions and are never cleared.
    pub fn register_persistent_entities(&self) {
        for (object_id, name, leaf) in [
            ("last_winner", "Last Race Winner", "standings/last_winner"),
            (
                "drivers_leader",
                "Drivers Championship Leader",
                "standings/drivers_leader",
            ),
            (
                "constructors_leader",
                "Constructors Championship Leader",
                "standings/constructors_leader",
            ),
            ("next_race", "Next Race", "schedule/next_race"),
        ] {
            let (topic, payload) = self.discovery_config(object_id, name, leaf);
            self.publish_retained(&topic, payload);
        }
    }

    /// Publish discovery configs for session-scoped entities, remember
    /// them, and enable state publication.
    pub fn register_session_entities(&mut self) {
        let mut entities = vec![
            ("session_flag".to_owned(), "Track Flag".to_owned(), "session/flag".to_owned()),
            ("session_lap".to_owned(), "Lap".to_owned(), "session/lap".to_owned()),
            ("session_leader".to_owned(), "Race Leader".to_owned(), "session/leader".to_owned()),
            ("session_weather".to_owned(), "Weather".to_owned(), "session/weather".to_owned()),
            (
                "race_control".to_owned(),
                "Race Control".to_owned(),
                "session/race_control".to_owned(),
            ),
            (
                "playback_state".to_owned(),
                "Playback".to_owned(),
                "playback/state".to_owned(),
            ),
        ];
        for number in &self.favourites {
            entities.push((
                format!("driver_{}_position", number),
                format!("Driver {} Position", number),
                format!("driver/{}/position", number),
            ));
            entities.push((
                format!("driver_{}_gap", number),
                format!("Driver {} Gap", number),
                format!("driver/{}/gap", number),
            ));
            entities.push((
                format!("driver_{}_tyre", number),
                format!("Driver {} Tyre", number),
                format!("driver/{}/tyre", number),
            ));
        }

        self.ephemeral_topics.clear();
        for (object_id, name, leaf) in &entities {
            let (topic, payload) = self.discovery_config(object_id, name, leaf);
            self.publish_retained(&topic, payload);
            self.ephemeral_topics.push(topic);
        }
        self.publish_retained(&format!("{}/session/status", self.prefix), "active");
        self.session_active = true;
        debug!(entities = self.ephemeral_topics.len(), "session entities registered");
    }

    /// Clear every remembered discovery topic (empty retained payload =
    /// removal), mark the session finished and disable state publication.
    pub fn deregister_session_entities(&mut self) {
        for topic in std::mem::take(&mut self.ephemeral_topics) {
            self.publish_retained(&topic, "");
        }
        self.publish_retained(&format!("{}/session/status", self.prefix), "finished");
        self.session_active = false;
    }

    pub fn session_active(&self) -> bool {
        self.session_active
    }

    // -----------------------------------------------------------------------
    // State projection
    // -----------------------------------------------------------------------

    /// Project a snapshot onto the state topics. Short-circuits when no
    /// session is active.
    pub fn publish_state(&self, state: &SessionState) {
        if !self.session_active {
            return;
        }

        self.publish_retained(
            &format!("{}/session/flag", self.prefix),
            state.track_status.flag.to_string(),
        );
        if state.lap_count.total > 0 {
            self.publish_retained(
                &format!("{}/session/lap", self.prefix),
                format!("{}/{}", state.lap_count.current, state.lap_count.total),
            );
        }
        if let Some(weather) = &state.weather {
            self.publish_json(&format!("{}/session/weather", self.prefix), weather);
        }
        if let Some(info) = &state.session_info {
            self.publish_json(&format!("{}/session/info", self.prefix), info);
        }
        if let Some(rcm) = &state.latest_race_control_message {
            self.publish_json(&format!("{}/session/race_control", self.prefix), rcm);
        }
        if let Some((number, _)) = state.leader() {
            let info = state.drivers.get(number);
            self.publish_json(
                &format!("{}/session/leader", self.prefix),
                &json!({
                    "driverNumber": number,
                    "abbreviation": info.and_then(|d| d.abbreviation.clone()),
                    "teamColor": info.and_then(|d| d.team_color.clone()),
                }),
            );
        }

        for number in &self.favourites {
            let Some(line) = state.timing.get(number) else {
                continue;
            };
            let base = format!("{}/driver/{}", self.prefix, number);
            if let Some(position) = line.position {
                self.publish_retained(&format!("{}/position", base), position.to_string());
                let gap = if position == 1 {
                    "LEADER".to_owned()
                } else {
                    line.gap_to_leader.clone().unwrap_or_default()
                };
                self.publish_retained(&format!("{}/gap", base), gap);
            }
            if let Some(stint) = state.stints.get(number) {
                self.publish_retained(&format!("{}/tyre", base), stint.compound.to_string());
            }
            self.publish_retained(&format!("{}/status", base), driver_status(line));
        }

        if self.notifier.enabled {
            self.publish_notifier_apps(state);
        }
    }

    fn publish_notifier_apps(&self, state: &SessionState) {
        let appearance = flag_appearance(state.track_status.flag);
        self.publish_app(
            "flag",
            &json!({
                "text": appearance.text,
                "color": text_color(&appearance),
                "background": format!("#{}", appearance.background),
            }),
        );
        if state.lap_count.total > 0 {
            self.publish_app(
                "lap",
                &json!({
                    "text": format!(
                        "LAP {}/{}",
                        state.lap_count.current, state.lap_count.total
                    ),
                }),
            );
        }
        for number in self.favourites.iter().take(3) {
            let Some(position) = state.timing.get(number).and_then(|l| l.position) else {
                continue;
            };
            let info = state.drivers.get(number);
            let label = info
                .and_then(|d| d.abbreviation.as_deref())
                .unwrap_or(number);
            self.publish_app(
                &format!("driver_{}", number),
                &json!({
                    "text": format!("{} P{}", label, position),
                    "color": hex_or_white(info.and_then(|d| d.team_color.as_deref())),
                }),
            );
        }
        if !state.top_three.is_empty() {
            let text = state
                .top_three
                .iter()
                .map(|line| {
                    format!(
                        "{} {}",
                        line.position,
                        line.abbreviation.as_deref().unwrap_or(&line.driver_number)
                    )
                })
                .collect::<Vec<_>>()
                .join("  ");
            self.publish_app("top_three", &json!({"text": text}));
        }
    }

    // -----------------------------------------------------------------------
    // Event projection
    // -----------------------------------------------------------------------

    /// Publish each event unretained on its event topic; when the notifier
    /// is enabled, also push the decorated notification.
    pub fn publish_events(&self, events: &[Event]) {
        for event in events {
            let topic = format!("{}/event/{}", self.prefix, event.kind());
            match serde_json::to_string(event) {
                Ok(payload) => self.publish_transient(&topic, payload),
                Err(e) => warn!(error = %e, "serializing event"),
            }
            if self.notifier.enabled {
                let notify_topic = format!("{}/notify", self.notifier.base_topic);
                self.publish_transient(&notify_topic, notification_payload(event).to_string());
            }
        }
    }

    /// Mirror the playback controller's state, retained.
    pub fn publish_playback_state(&self, state: &PlaybackState) {
        self.publish_json(&format!("{}/playback/state", self.prefix), state);
    }

    /// Season-long standings topics, retained.
    pub fn publish_standings(
        &self,
        last_winner: Option<&str>,
        drivers_leader: Option<&str>,
        constructors_leader: Option<&str>,
    ) {
        if let Some(winner) = last_winner {
            self.publish_retained(&format!("{}/standings/last_winner", self.prefix), winner);
        }
        if let Some(leader) = drivers_leader {
            self.publish_retained(&format!("{}/standings/drivers_leader", self.prefix), leader);
        }
        if let Some(leader) = constructors_leader {
            self.publish_retained(
                &format!("{}/standings/constructors_leader", self.prefix),
                leader,
            );
        }
    }

    pub fn publish_next_race(&self, next_race: &str) {
        self.publish_retained(&format!("{}/schedule/next_race", self.prefix), next_race);
    }

    // -----------------------------------------------------------------------
    // Low-level publish helpers
    // -----------------------------------------------------------------------

    fn discovery_config(&self, object_id: &str, name: &str, leaf: &str) -> (String, String) {
        let topic = format!("{}/sensor/pitwall_{}/config", self.discovery_prefix, object_id);
        let state_topic = format!("{}/{}", self.prefix, leaf);
        let payload = discovery_payload(&self.prefix, object_id, name, &state_topic);
        (topic, payload.to_string())
    }

    fn publish_app(&self, app: &str, payload: &Value) {
        let topic = format!("{}/custom/{}", self.notifier.base_topic, app);
        self.publish_transient(&topic, payload.to_string());
    }

    fn publish_json<T: serde::Serialize>(&self, topic: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => self.publish_retained(topic, payload),
            Err(e) => warn!(topic, error = %e, "serializing payload"),
        }
    }

    fn publish_retained(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtLeastOnce, true, payload)
        {
            warn!(topic, error = %e, "publish dropped");
        }
    }

    fn publish_transient(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
        {
            warn!(topic, error = %e, "publish dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_core::TyreCompound;

    #[test]
    fn appearance_table_matches_flag_semantics() {
        let red = flag_appearance(Flag::Red);
        assert_eq!(red.background, "FF0000");
        assert_eq!(red.text, "RED FLAG");
        assert_eq!(red.effect, Some("Pulse"));
        assert!(!red.dark_text);

        let yellow = flag_appearance(Flag::Yellow);
        assert!(yellow.dark_text);
        assert_eq!(yellow.effect, None);

        let sc = flag_appearance(Flag::SafetyCar);
        assert_eq!(sc.background, "FFA500");
        assert_eq!(sc.effect, Some("Pulse"));

        let chequered = flag_appearance(Flag::Chequered);
        assert_eq!(chequered.background, "FFFFFF");
        assert!(chequered.dark_text);
    }

    #[test]
    fn driver_status_prefers_retired_over_pit() {
        let mut line = TimingLine::default();
        assert_eq!(driver_status(&line), "racing");
        line.in_pit = true;
        assert_eq!(driver_status(&line), "pit");
        line.retired = true;
        assert_eq!(driver_status(&line), "retired");
    }

    #[test]
    fn flag_notification_carries_effect_and_wakeup() {
        let event = Event::FlagChange {
            previous_flag: Flag::Green,
            new_flag: Flag::SafetyCar,
            message: None,
        };
        let payload = notification_payload(&event);
        assert_eq!(payload["text"], "SAFETY CAR");
        assert_eq!(payload["background"], "#FFA500");
        assert_eq!(payload["effect"], "Pulse");
        assert_eq!(payload["wakeup"], true);
    }

    #[test]
    fn green_notification_has_no_effect_field() {
        let event = Event::FlagChange {
            previous_flag: Flag::SafetyCar,
            new_flag: Flag::Green,
            message: None,
        };
        let payload = notification_payload(&event);
        assert!(payload.get("effect").is_none());
    }

    #[test]
    fn pit_stop_notification_names_compound() {
        let event = Event::PitStop {
            driver_number: "1".to_owned(),
            abbreviation: Some("VER".to_owned()),
            team_color: Some("3671C6".to_owned()),
            new_compound: TyreCompound::Hard,
            stint_number: 2,
        };
        let payload = notification_payload(&event);
        assert_eq!(payload["text"], "VER BOX HARD");
        assert_eq!(payload["color"], "#3671C6");
    }

    #[test]
    fn discovery_payload_points_at_state_and_availability() {
        let payload = discovery_payload("f12mqtt", "session_flag", "Track Flag", "f12mqtt/session/flag");
        assert_eq!(payload["unique_id"], "pitwall_session_flag");
        assert_eq!(payload["state_topic"], "f12mqtt/session/flag");
        assert_eq!(payload["availability_topic"], "f12mqtt/status");
        assert_eq!(payload["device"]["identifiers"][0], "pitwall");
    }
}
