#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::interval;
use tower_http::trace::TraceLayer;

use crate::client::ApiClient;
use crate::config::Config;
use crate::downloader;
use crate::roster::{RosterDedup, RosterEntry};
use crate::session::Session;
use crate::stream::{StreamSnapshot, StreamSync};

pub struct AppState {
    config: Config,
    client: ApiClient,
    stream: Mutex<StreamSync>,
    roster: Mutex<RosterDedup>,
    session: Mutex<Option<Session>>,
}

#[derive(Serialize)]
struct DashboardState {
    stream: StreamSnapshot,
    roster: Vec<RosterEntry>,
    session: Option<Session>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct ActionResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct ExportResponse {
    status: String,
    file: Option<String>,
}

impl ActionResponse {
    fn ok() -> Self {
        ActionResponse {
            status: "ok".to_string(),
            message: None,
        }
    }

    fn error(message: String) -> Self {
        ActionResponse {
            status: "error".to_string(),
            message: Some(message),
        }
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::new(&config.api_base_url);
    let stream = StreamSync::new(client.feed_base(), config.video_retry_backoff);

    // Setup app state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        client,
        stream: Mutex::new(stream),
        roster: Mutex::new(RosterDedup::new()),
        session: Mutex::new(None),
    });

    // Background poll loops, cancelled on teardown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let status_task = tokio::spawn(status_poll_loop(app_state.clone(), shutdown_rx.clone()));
    let roster_task = tokio::spawn(roster_poll_loop(app_state.clone(), shutdown_rx));

    // Build router
    let app = Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/state", get(get_dashboard_state))
        .route("/api/stream/start", post(start_stream))
        .route("/api/stream/stop", post(stop_stream))
        .route("/api/video/error", post(video_load_error))
        .route("/api/video/loaded", post(video_load_success))
        .route("/api/roster/:index", delete(remove_roster_entry))
        .route("/api/roster/export", post(export_roster))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("Dashboard listening on http://{}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the timers before returning so no callback outlives the host
    let _ = shutdown_tx.send(true);
    status_task.await?;
    roster_task.await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Poll `/stream_status` on a fixed interval, first tick immediately
///
/// Each tick dispatches its fetch on its own task, so a hung request never
/// blocks later ticks; the sequence token keeps a late response from
/// overwriting a newer one.
async fn status_poll_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(state.config.status_poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seq = {
                    let mut stream = state.stream.lock().unwrap();
                    // On the tick schedule, not behind the in-flight fetch.
                    stream.apply_pending_retry(Instant::now());
                    stream.begin_poll()
                };

                let task_state = Arc::clone(&state);
                tokio::spawn(async move {
                    let outcome = task_state.client.stream_status().await;

                    // One lock scope: the whole update lands atomically.
                    let mut stream = task_state.stream.lock().unwrap();
                    match outcome {
                        Ok(payload) => stream.apply_poll(seq, Some(&payload)),
                        Err(e) => {
                            log::warn!("stream status poll failed: {e}");
                            stream.apply_poll(seq, None);
                        }
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Poll `/who-sleeping` on a fixed interval, first tick immediately
async fn roster_poll_loop(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(state.config.roster_poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seq = state.roster.lock().unwrap().begin_refresh();
                let task_state = Arc::clone(&state);
                tokio::spawn(async move {
                    match task_state.client.sleeping_list().await {
                        Ok(list) => task_state.roster.lock().unwrap().apply_refresh(seq, list),
                        // Keep the previous roster; the next tick retries anyway.
                        Err(e) => log::warn!("roster poll failed: {e}"),
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn get_dashboard_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.stream.lock().unwrap().snapshot();
    let roster = state.roster.lock().unwrap().entries().to_vec();
    let session = state.session.lock().unwrap().clone();

    Json(DashboardState {
        stream: snapshot,
        roster,
        session,
    })
}

async fn start_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = match state.client.start_stream().await {
        Ok(()) => true,
        Err(e) => {
            log::error!("start_stream failed: {e}");
            false
        }
    };

    let mut stream = state.stream.lock().unwrap();
    stream.apply_start(ok);
    Json(stream.snapshot())
}

async fn stop_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = match state.client.stop_stream().await {
        Ok(()) => true,
        // No optimistic stop: log and leave the state as it was.
        Err(e) => {
            log::error!("stop_stream failed: {e}");
            false
        }
    };

    let mut stream = state.stream.lock().unwrap();
    stream.apply_stop(ok);
    Json(stream.snapshot())
}

async fn video_load_error(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut stream = state.stream.lock().unwrap();
    stream.on_video_load_error(Instant::now());
    Json(stream.snapshot())
}

async fn video_load_success(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut stream = state.stream.lock().unwrap();
    stream.on_video_load_success();
    Json(stream.snapshot())
}

async fn remove_roster_entry(
    Path(index): Path<usize>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let removed = state.roster.lock().unwrap().remove(index);

    match removed {
        Some(name) => {
            // Optimistic: the entry is already gone locally. A failed delete
            // is logged and reconciled by the next refresh tick.
            if let Err(e) = state.client.delete_sleeping(&name).await {
                log::error!("delete of roster entry '{name}' failed: {e}");
            }
            Json(ActionResponse::ok())
        }
        None => Json(ActionResponse::error(format!("no roster entry at {index}"))),
    }
}

async fn export_roster(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let entries = state.roster.lock().unwrap().entries().to_vec();

    match downloader::write_export(&state.config.export_dir, &entries, chrono::Utc::now()) {
        Ok(path) => Json(ExportResponse {
            status: "ok".to_string(),
            file: path.map(|p| p.display().to_string()),
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ActionResponse::error(e.to_string())),
        )
            .into_response(),
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.client.login(&payload.username, &payload.password).await {
        Ok(session) => {
            *state.session.lock().unwrap() = Some(session.clone());
            Json(session).into_response()
        }
        Err(e) => {
            log::warn!("login failed for '{}': {e}", payload.username);
            (
                StatusCode::UNAUTHORIZED,
                Json(ActionResponse::error("invalid credentials".to_string())),
            )
                .into_response()
        }
    }
}

async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    *state.session.lock().unwrap() = None;
    Json(ActionResponse::ok())
}
