use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::ServeDir;

use super::{log_requests, metrics, state::*};
use crate::audio::AudioResolver;
use crate::cache::{playlist_key, KEY_MOODS_LIST};
use crate::catalog_store::{Energy, ListenEvent, ListenEventKind, StoreError, Track};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const MOODS_MAX_AGE_SEC: u32 = 300;
const PLAYLIST_MAX_AGE_SEC: u32 = 60;

/// The fixed mood set with client-facing display names.
const MOODS: &[(&str, &str)] = &[
    ("focus", "Focus"),
    ("calm", "Calm"),
    ("late_night", "Late Night"),
    ("energize", "Energize"),
];

fn is_known_mood(mood: &str) -> bool {
    MOODS.iter().any(|(name, _)| *name == mood)
}

fn mood_display_name(mood: &str) -> &str {
    MOODS
        .iter()
        .find(|(name, _)| *name == mood)
        .map(|(_, display)| *display)
        .unwrap_or(mood)
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

fn json_response(value: &Value, x_cache: &str, max_age_sec: u32) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, format!("public, max-age={}", max_age_sec))
        .header("X-Cache", x_cache)
        .body(Body::from(serde_json::to_vec(value).unwrap_or_default()))
        .unwrap()
}

// =============================================================================
// Status and probe handlers
// =============================================================================

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
    pub cache: crate::cache::CacheStats,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: VERSION.to_string(),
        cache: state.cache.stats(),
    };
    Json(stats)
}

async fn health() -> String {
    format!("ok {}", VERSION)
}

async fn ready(State(store): State<GuardedCatalogStore>) -> Response {
    match store.ping() {
        Ok(()) => (StatusCode::OK, "ready").into_response(),
        Err(err) => {
            error!("Readiness check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
        }
    }
}

// =============================================================================
// Mood list
// =============================================================================

#[derive(Serialize)]
struct MoodInfo {
    name: String,
    display_name: String,
    track_count: i64,
    total_minutes: f64,
}

async fn list_moods(State(state): State<ServerState>) -> Response {
    if let Some(cached) = state.cache.get(KEY_MOODS_LIST) {
        return json_response(&cached, "HIT", MOODS_MAX_AGE_SEC);
    }

    let stats = match state.catalog_store.get_mood_stats() {
        Ok(stats) => stats,
        Err(err) => {
            error!("Error fetching moods: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let result: Vec<MoodInfo> = stats
        .into_iter()
        .map(|s| MoodInfo {
            display_name: mood_display_name(&s.mood).to_string(),
            name: s.mood,
            track_count: s.track_count,
            total_minutes: s.total_duration_seconds as f64 / 60.0,
        })
        .collect();

    let value = match serde_json::to_value(&result) {
        Ok(value) => value,
        Err(err) => {
            error!("Error encoding moods: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state.cache.set(KEY_MOODS_LIST, value.clone());
    json_response(&value, "MISS", MOODS_MAX_AGE_SEC)
}

// =============================================================================
// Playlist
// =============================================================================

/// Slim track view for playlist responses; the client only consumes these
/// fields, and dropping the rest keeps the payload small.
#[derive(Serialize)]
struct PlaylistTrack {
    id: i64,
    file_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    energy: Energy,
    #[serde(skip_serializing_if = "Option::is_none")]
    intensity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lyrics: Option<String>,
}

fn to_playlist_tracks(tracks: &[Track], resolver: &dyn AudioResolver) -> Vec<PlaylistTrack> {
    tracks
        .iter()
        .map(|track| {
            // A track without a playable URL is still listed.
            let audio_url = match resolver.resolve_url(&track.file_path) {
                Ok(url) => url,
                Err(err) => {
                    warn!("Failed to resolve audio URL for track {}: {}", track.id, err);
                    String::new()
                }
            };
            PlaylistTrack {
                id: track.id,
                file_path: track.file_path.clone(),
                audio_url,
                title: track.title.clone(),
                artist: track.artist.clone(),
                energy: track.energy,
                intensity: track.intensity,
                lyrics: track.lyrics.clone(),
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct PlaylistQuery {
    #[serde(default)]
    instrumental: bool,
}

async fn get_playlist(
    State(state): State<ServerState>,
    Path(mood): Path<String>,
    Query(query): Query<PlaylistQuery>,
) -> Response {
    if !is_known_mood(&mood) {
        return (StatusCode::NOT_FOUND, "Unknown mood").into_response();
    }

    let cache_key = playlist_key(&mood, query.instrumental);
    if let Some(cached) = state.cache.get(&cache_key) {
        return json_response(&cached, "HIT", PLAYLIST_MAX_AGE_SEC);
    }

    let tracks = match state.radio_manager.get_playlist(&mood, query.instrumental) {
        Ok(tracks) => tracks,
        Err(err) => {
            error!("Error fetching playlist for mood {}: {}", mood, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let playlist = to_playlist_tracks(&tracks, state.audio_resolver.as_ref());
    let value = match serde_json::to_value(&playlist) {
        Ok(value) => value,
        Err(err) => {
            error!("Error encoding playlist: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !playlist.is_empty() {
        state.cache.set(&cache_key, value.clone());
    }
    json_response(&value, "MISS", PLAYLIST_MAX_AGE_SEC)
}

// =============================================================================
// Play reporting
// =============================================================================

#[derive(Deserialize, Default)]
struct PlayReportBody {
    event: Option<String>,
    #[serde(default)]
    listen_seconds: i64,
    mood: Option<String>,
    position: Option<i64>,
}

async fn report_play(
    State(state): State<ServerState>,
    Path(track_id): Path<i64>,
    body: Bytes,
) -> Response {
    // A missing or malformed body is treated as a bare play event rather
    // than rejected; fire-and-forget clients are the norm here.
    let report: PlayReportBody = if body.is_empty() {
        PlayReportBody::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };

    let kind = match report.event.as_deref() {
        None => ListenEventKind::Play,
        Some(raw) => match ListenEventKind::parse(raw) {
            Some(kind) => kind,
            None => return (StatusCode::BAD_REQUEST, "invalid event type").into_response(),
        },
    };

    // Resolve the track to learn its mood; failure here degrades the
    // mood-dependent side effects instead of failing the report.
    let track = match state.catalog_store.get_by_id(track_id) {
        Ok(track) => track,
        Err(err) => {
            warn!("Failed to get track {} for radio update: {}", track_id, err);
            None
        }
    };

    let mood = report
        .mood
        .filter(|m| !m.is_empty())
        .or_else(|| track.as_ref().map(|t| t.mood.clone()));

    let event = mood.as_ref().map(|mood| ListenEvent {
        track_id,
        mood: mood.clone(),
        kind,
        listen_seconds: report.listen_seconds.max(0),
        playlist_position: report.position,
    });

    // One transaction for the statistic update and the listen event; a
    // failure in either rolls both back.
    let tx_result = state.catalog_store.with_play_tx(&mut |tx| {
        if kind != ListenEventKind::Skip {
            tx.update_play_stats(track_id)?;
        }
        if let Some(event) = &event {
            tx.record_listen_event(event)?;
        }
        Ok(())
    });

    if let Err(err) = tx_result {
        if matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::TrackNotFound(_))
        ) {
            return (StatusCode::NOT_FOUND, "Unknown track").into_response();
        }
        error!("Error recording play for track {}: {}", track_id, err);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to record play",
        )
            .into_response();
    }

    // In-memory state only moves after the durable commit. Skips never
    // count as recently played.
    if kind != ListenEventKind::Skip {
        metrics::record_play();
        if let Some(track) = &track {
            state.radio_manager.record_play(&track.mood, track_id);
        }
    }

    (StatusCode::OK, "ok").into_response()
}

// =============================================================================
// Router assembly
// =============================================================================

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/moods", get(list_moods))
        .route("/moods/{mood}/playlist", get(get_playlist))
        .route("/tracks/{id}/play", post(report_play))
        .with_state(state.clone());

    let probe_routes: Router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state.clone());

    let home_router: Router = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .merge(probe_routes)
        .nest("/api", api_routes)
        .nest_service("/audio", ServeDir::new(&state.config.audio_dir));

    app.layer(middleware::from_fn_with_state(
        state.config.requests_logging_level.clone(),
        log_requests,
    ))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down...");
    }
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    Ok(axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?)
}
