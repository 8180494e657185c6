// bridge: bridges the live telemetry feed onto the MQTT bus, records
// sessions to disk, and replays them through the same pipeline.

use bridge::config::{self, BridgeConfig};
use bridge::control::{self, AppState};
use bridge::feed::{FeedClient, FeedSignal};
use bridge::playback::{PlaybackCommand, PlaybackController, PlaybackEvent};
use bridge::publisher::Publisher;
use bridge::recorder::{RecordingMetadata, SessionRecorder};
use chrono::{Datelike, Utc};
use clap::Parser;
use pitwall_core::state::SessionInfo;
use pitwall_core::{Pipeline, SessionState};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bridge", about = "Telemetry feed to MQTT bridge with record/replay")]
struct Args {
    /// Path to the TOML config file (default: /etc/pitwall/bridge.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for structured logging to stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "bridge starting");

    let args = Args::parse();
    let cfg: BridgeConfig = {
        let loaded = match &args.config {
            Some(path) => config::load_config_from_path(path),
            None => config::load_config(),
        };
        match loaded {
            Ok(cfg) => {
                info!(
                    broker = %cfg.mqtt.host,
                    prefix = %cfg.mqtt.topic_prefix,
                    favourites = cfg.favourite_drivers.len(),
                    "config loaded"
                );
                cfg
            }
            Err(e) => {
                eprintln!("FATAL: failed to load config: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (mut publisher, event_loop) = Publisher::connect(
        &cfg.mqtt,
        cfg.notifier.clone(),
        cfg.favourite_drivers.clone(),
    );
    publisher.register_persistent_entities();
    let publisher = Arc::new(Mutex::new(publisher));

    let controller = Arc::new(PlaybackController::new());
    let (live_tx, _) = broadcast::channel(256);
    let live_state: Arc<RwLock<Option<SessionState>>> = Arc::new(RwLock::new(None));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Control server binds first: a bad bind address is a startup failure.
    let listener = match tokio::net::TcpListener::bind(&cfg.http.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("FATAL: failed to bind {}: {}", cfg.http.bind, e);
            std::process::exit(1);
        }
    };
    let app_state = Arc::new(AppState {
        controller: controller.clone(),
        recordings_dir: PathBuf::from(&cfg.recordings.dir),
        live_tx: live_tx.clone(),
        live_state: live_state.clone(),
    });
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, control::router(app_state)).await {
            warn!(error = %e, "control server exited");
        }
    });

    // MQTT event loop: connection progress, reconnects, inbound commands.
    tokio::spawn(run_mqtt(
        event_loop,
        publisher.clone(),
        controller.clone(),
        shutdown_rx.clone(),
    ));

    // Upstream feed with fixed-backoff reconnect.
    let (feed_tx, feed_rx) = mpsc::channel::<FeedSignal>(1000);
    tokio::spawn(FeedClient::new(cfg.feed.clone()).run(feed_tx, shutdown_rx.clone()));

    // Playback events mirrored onto the bus.
    tokio::spawn(run_playback_mirror(
        controller.clone(),
        publisher.clone(),
        shutdown_rx.clone(),
    ));

    // The single-writer live pipeline; joined on shutdown so the recorder
    // and session entities are closed out cleanly.
    let recorder = SessionRecorder::new(&cfg.recordings.dir);
    let pipeline_task = tokio::spawn(run_pipeline(
        feed_rx,
        publisher.clone(),
        recorder,
        cfg.recordings.enabled,
        live_tx,
        live_state,
        shutdown_rx,
    ));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = pipeline_task.await;
    info!("bridge stopped");
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn run_mqtt(
    mut event_loop: rumqttc::EventLoop,
    publisher: Arc<Mutex<Publisher>>,
    controller: Arc<PlaybackController>,
    mut shutdown: watch::Receiver<bool>,
) {
    use rumqttc::{Event, Packet};

    let command_topic = publisher.lock().await.command_topic();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected");
                    publisher.lock().await.announce_online();
                }
                Ok(Event::Incoming(Packet::Publish(publish)))
                    if publish.topic == command_topic =>
                {
                    match serde_json::from_slice::<serde_json::Value>(&publish.payload) {
                        Ok(payload) => match PlaybackCommand::from_json(&payload) {
                            Some(command) => controller.apply_command(command).await,
                            None => warn!("unrecognised playback command"),
                        },
                        Err(e) => warn!(error = %e, "bad playback command payload"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt connection error");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}

async fn run_playback_mirror(
    controller: Arc<PlaybackController>,
    publisher: Arc<Mutex<Publisher>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut rx = controller.subscribe();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
            event = rx.recv() => match event {
                Ok(PlaybackEvent::Event { event }) => {
                    publisher.lock().await.publish_events(&[event]);
                }
                Ok(PlaybackEvent::Update { snapshot, playback_state, .. }) => {
                    let publisher = publisher.lock().await;
                    publisher.publish_state(&snapshot);
                    publisher.publish_playback_state(&playback_state);
                }
                Ok(PlaybackEvent::Seek { snapshot, playback_state }) => {
                    let publisher = publisher.lock().await;
                    publisher.publish_state(&snapshot);
                    publisher.publish_playback_state(&playback_state);
                }
                Ok(PlaybackEvent::Loaded { playback_state })
                | Ok(PlaybackEvent::StateChange { playback_state }) => {
                    publisher.lock().await.publish_playback_state(&playback_state);
                }
                Ok(PlaybackEvent::Finished) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "playback mirror lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

async fn run_pipeline(
    mut feed_rx: mpsc::Receiver<FeedSignal>,
    publisher: Arc<Mutex<Publisher>>,
    mut recorder: SessionRecorder,
    recordings_enabled: bool,
    live_tx: broadcast::Sender<serde_json::Value>,
    live_state: Arc<RwLock<Option<SessionState>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut pipeline = Pipeline::new();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
            signal = feed_rx.recv() => {
                let Some(signal) = signal else { break; };
                match signal {
                    FeedSignal::Connected => publisher.lock().await.set_status(true),
                    FeedSignal::Disconnected { error } => {
                        if let Some(error) = error {
                            warn!(error = %error, "feed disconnected");
                        }
                        publisher.lock().await.set_status(false);
                    }
                    FeedSignal::Message(msg) => {
                        let outcome = pipeline.process(&msg);
                        recorder.write(&msg);

                        let mut publisher = publisher.lock().await;
                        if !publisher.session_active() {
                            if let Some(info) = &outcome.snapshot.session_info {
                                publisher.register_session_entities();
                                if recordings_enabled {
                                    if let Err(e) = recorder
                                        .start(metadata_for(info), &outcome.snapshot)
                                    {
                                        warn!(error = %e, "starting recording");
                                    }
                                }
                            }
                        }
                        publisher.publish_events(&outcome.events);
                        publisher.publish_state(&outcome.snapshot);
                        drop(publisher);

                        *live_state.write().await = Some(outcome.snapshot.clone());
                        for event in &outcome.events {
                            let _ = live_tx.send(json!({"type": "event", "event": event}));
                        }
                        let _ = live_tx.send(json!({
                            "type": "update",
                            "snapshot": outcome.snapshot,
                            "events": outcome.events,
                            "entry": msg,
                        }));
                    }
                }
            }
        }
    }

    // Close out the session on shutdown.
    recorder.stop();
    let mut publisher = publisher.lock().await;
    if publisher.session_active() {
        publisher.deregister_session_entities();
    }
    publisher.set_status(false);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn metadata_for(info: &SessionInfo) -> RecordingMetadata {
    let year = info
        .start_time
        .as_deref()
        .and_then(|t| t.get(..4))
        .and_then(|y| y.parse().ok())
        .unwrap_or_else(|| Utc::now().year());
    RecordingMetadata {
        session_key: slug(&format!("{}-{}", info.circuit, info.name)),
        year,
        session_name: info.name.clone(),
        session_type: info.session_type.to_string(),
        circuit: info.circuit.clone(),
        start_time: info
            .start_time
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        end_time: None,
    }
}

/// Lowercase alphanumerics, everything else collapsed to single dashes.
fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "installing SIGTERM handler; falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
