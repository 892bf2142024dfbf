use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::server::AppState;

/// Prometheus text exposition. Unauthenticated so scrapers can reach it.
pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    match state.gateway.metrics_handle.as_ref() {
        Some(handle) if handle.is_enabled() => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        _ => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics not enabled",
        )
            .into_response(),
    }
}
