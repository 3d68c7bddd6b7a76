//! HTTP routes.

use super::AppState;
use crate::capture::CameraInfo;
use crate::stream::{StreamSession, STREAM_CONTENT_TYPE};
use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;

/// Bytes buffered between a session and its HTTP body.
const STREAM_BUFFER: usize = 64 * 1024;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(stream_handler))
        .route("/switch/:id", put(switch_handler))
        .route("/cameras", get(list_cameras))
        .route("/cameras/:id", get(get_camera))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct CameraView {
    #[serde(flatten)]
    info: CameraInfo,
    active: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn not_found(error: impl ToString) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Streams the active camera as `multipart/x-mixed-replace`.
///
/// The session subscribes before the response head goes out, so no frame
/// published after the client sees the headers is missed.
async fn stream_handler(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let mut session = StreamSession::new(
        state.switchboard.clone(),
        state.shutdown.clone(),
        state.metrics.clone(),
    );
    if let Some(ConnectInfo(peer)) = connect {
        tracing::info!(peer = %peer, "received stream request");
        session = session.with_peer(peer);
    }

    let (reader, writer) = tokio::io::duplex(STREAM_BUFFER);
    tokio::spawn(async move {
        // Failures are logged by the session.
        let _ = session.run(writer).await;
    });

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}

async fn switch_handler(State(state): State<AppState>, Path(id): Path<usize>) -> Response {
    match state.switchboard.switch_to(id) {
        Ok(previous) => {
            state.metrics.camera_switched(id);
            tracing::info!(from = previous, to = id, "switched camera");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected camera switch");
            not_found(e)
        }
    }
}

async fn list_cameras(State(state): State<AppState>) -> Json<Vec<CameraView>> {
    let active = state.switchboard.active();
    Json(
        state
            .cameras
            .iter()
            .map(|info| CameraView {
                info: info.clone(),
                active: info.id == active,
            })
            .collect(),
    )
}

async fn get_camera(State(state): State<AppState>, Path(id): Path<usize>) -> Response {
    match state.cameras.get(id) {
        Some(info) => Json(CameraView {
            info: info.clone(),
            active: state.switchboard.active() == id,
        })
        .into_response(),
        None => not_found(format!("no camera with id {id}")),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
