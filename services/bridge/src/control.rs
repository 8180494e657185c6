//! HTTP control surface for the bridge.
//!
//! Routes:
//!   GET  /api/v1/recordings        - list recordings on disk
//!   GET  /api/v1/state             - current live session snapshot
//!   GET  /api/v1/playback          - playback controller state
//!   POST /api/v1/playback/load     - load a recording (async, 202)
//!   POST /api/v1/playback/play     - play()
//!   POST /api/v1/playback/pause    - pause()
//!   POST /api/v1/playback/stop     - stop()
//!   POST /api/v1/playback/speed    - setSpeed(value)
//!   POST /api/v1/playback/seek     - seek(to)
//!   GET  /api/v1/ws                - WebSocket fan-out of live updates and
//!                                    playback events

use crate::playback::{PlaybackCommand, PlaybackController, PlaybackState};
use crate::recorder::{self, RecordingSummary};
use crate::sources::RecordedSource;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use pitwall_core::SessionState;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tower_http::cors::CorsLayer;
use tracing::debug;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub controller: Arc<PlaybackController>,
    pub recordings_dir: PathBuf,
    /// Live pipeline fan-out, mirrored onto connected WebSockets.
    pub live_tx: broadcast::Sender<serde_json::Value>,
    /// Latest live snapshot, written by the pipeline task after every
    /// message. None until the first message arrives.
    pub live_state: Arc<RwLock<Option<SessionState>>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/recordings", get(list_recordings))
        .route("/api/v1/state", get(live_snapshot))
        .route("/api/v1/playback", get(playback_state))
        .route("/api/v1/playback/load", post(load_recording))
        .route("/api/v1/playback/play", post(play))
        .route("/api/v1/playback/pause", post(pause))
        .route("/api/v1/playback/stop", post(stop))
        .route("/api/v1/playback/speed", post(set_speed))
        .route("/api/v1/playback/seek", post(seek))
        .route("/api/v1/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_recordings(State(state): State<Arc<AppState>>) -> Json<Vec<RecordingSummary>> {
    Json(recorder::list_recordings(&state.recordings_dir))
}

async fn live_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.live_state.read().await.clone() {
        Some(snapshot) => (StatusCode::OK, Json(serde_json::json!(snapshot))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no live session data yet"})),
        ),
    }
}

async fn playback_state(State(state): State<Arc<AppState>>) -> Json<PlaybackState> {
    Json(state.controller.state().await)
}

#[derive(Debug, Deserialize)]
struct LoadRequest {
    recording: String,
}

async fn load_recording(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadRequest>,
) -> impl IntoResponse {
    // Recording ids are directory names; reject anything path-like.
    if req.recording.contains('/') || req.recording.contains("..") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid recording id"})),
        );
    }
    let dir = state.recordings_dir.join(&req.recording);
    if !dir.is_dir() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "recording not found"})),
        );
    }
    let source = RecordedSource::open(&dir);
    let session = source.into_session();
    let entries = session.timeline.len();
    state
        .controller
        .load(session.timeline, session.initial_state)
        .await;
    (
        StatusCode::ACCEPTED,
        Json(json!({"loaded": req.recording, "entries": entries})),
    )
}

async fn play(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.apply_command(PlaybackCommand::Play).await;
    StatusCode::ACCEPTED
}

async fn pause(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.apply_command(PlaybackCommand::Pause).await;
    StatusCode::ACCEPTED
}

async fn stop(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.apply_command(PlaybackCommand::Stop).await;
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
struct SpeedRequest {
    value: f64,
}

async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeedRequest>,
) -> impl IntoResponse {
    if req.value <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "speed must be positive"})),
        );
    }
    state
        .controller
        .apply_command(PlaybackCommand::Speed(req.value))
        .await;
    (StatusCode::ACCEPTED, Json(json!({"speed": req.value})))
}

#[derive(Debug, Deserialize)]
struct SeekRequest {
    to: String,
}

async fn seek(State(state): State<Arc<AppState>>, Json(req): Json<SeekRequest>) -> StatusCode {
    state
        .controller
        .apply_command(PlaybackCommand::Seek(req.to))
        .await;
    StatusCode::ACCEPTED
}

// ---------------------------------------------------------------------------
// WebSocket fan-out
// ---------------------------------------------------------------------------

async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws_session(socket, state))
}

/// Forward live updates and playback events to one client. UI fan-out may
/// lag and skip; it never backpressures the pipeline.
async fn ws_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut live_rx = state.live_tx.subscribe();
    let mut playback_rx = state.controller.subscribe();
    loop {
        let text = tokio::select! {
            live = live_rx.recv() => match live {
                Ok(value) => value.to_string(),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "ws client lagged on live updates");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            playback = playback_rx.recv() => match playback {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(_) => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "ws client lagged on playback events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // Drain client frames; any close ends the session.
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            },
        };
        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
