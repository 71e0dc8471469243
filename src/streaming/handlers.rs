use crate::camera::HealthStatus;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{info, warn};

use super::server::ServerState;

/// Longest verification session a client may request, in seconds
pub(crate) const MAX_VERIFY_SECONDS: f64 = 60.0;

pub(crate) const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Handler for MJPEG streaming endpoint
pub(crate) async fn mjpeg_stream_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let stream = state.publisher.clone().frames().map(Ok::<_, Infallible>);

    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}

/// Handler for health check endpoint
pub(crate) async fn health_handler(State(state): State<ServerState>) -> Response {
    let stream = state.publisher.stats().snapshot();
    let verifier_ready = state.verifier.is_some();

    let Some(camera) = state.camera.as_ref() else {
        let body = serde_json::json!({
            "status": "unhealthy",
            "camera": null,
            "stream": stream,
            "verifier": verifier_ready,
        });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    };

    let health = camera.health_check();
    let latest_frame_id = health.stats.latest_frame_id;
    let code = if health.status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = serde_json::json!({
        "status": health.status.clone(),
        "camera": health,
        "latest_frame_id": latest_frame_id,
        "stream": stream,
        "verifier": verifier_ready,
    });

    (code, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyParams {
    /// Session budget in seconds; the configured default when absent
    pub timeout: Option<f64>,
}

/// Handler for running one face verification session
pub(crate) async fn verify_handler(
    State(state): State<ServerState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let Some(verifier) = state.verifier.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "face verification is not configured",
        );
    };

    let timeout = params.timeout.unwrap_or(verifier.config().max_seconds);
    if !timeout.is_finite() || timeout < 0.0 {
        warn!("Rejected verification request with timeout {}", timeout);
        return error_response(StatusCode::BAD_REQUEST, "timeout must be a non-negative number");
    }
    let timeout = timeout.min(MAX_VERIFY_SECONDS);

    info!("Verification requested over HTTP (timeout={}s)", timeout);
    let result = verifier.verify_with_timeout(timeout).await;

    (StatusCode::OK, Json(result)).into_response()
}

fn error_response(code: StatusCode, message: &str) -> Response {
    (code, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Simple HTML page for viewing the MJPEG stream
pub(crate) async fn stream_page_handler() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Facecam Stream</title>
    <style>
        :root { color-scheme: dark; }
        body {
            margin: 0;
            background: #000;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
        }
        img.stream {
            display: block;
            max-width: 100vw;
            max-height: 100vh;
            object-fit: contain;
        }
    </style>
</head>
<body>
    <img class="stream" src="/stream.mjpg" alt="Facecam stream">
</body>
</html>
"#,
    )
}
